// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt-Loyalty API Server
//!
//! Credits loyalty points for scanned fiscal receipts by resolving them
//! against the fiscal authority's receipt service.

use receipt_loyalty::{
    config::{Config, StorageBackend},
    db::{FirestoreDb, LoyaltyStore, MemoryStore},
    services::FiscalDirectory,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Receipt-Loyalty API");

    let store: Arc<dyn LoyaltyStore> = match config.storage {
        StorageBackend::Firestore => Arc::new(
            FirestoreDb::new(&config.gcp_project_id)
                .await
                .expect("Failed to connect to Firestore"),
        ),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        specifications_url = %config.fiscal_specifications_url,
        timeout_secs = config.fiscal_timeout.as_secs(),
        "Fiscal client configured"
    );

    // Build shared state
    let state = Arc::new(
        AppState::new(config.clone(), store, FiscalDirectory::default())
            .expect("Failed to initialize services"),
    );

    // Build router
    let app = receipt_loyalty::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("receipt_loyalty=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
