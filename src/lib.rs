// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Receipt-Loyalty: points for scanned fiscal receipts
//!
//! This crate provides the backend API that resolves Serbian fiscal receipt
//! QR codes, matches their items against a product catalog and credits
//! tier-adjusted loyalty points.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::LoyaltyStore;
use services::{
    AnalyticsService, FiscalClient, FiscalDirectory, NotificationService, Notifier,
    PointsService, ReceiptProcessor, ReviewService,
};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn LoyaltyStore>,
    pub notifier: Notifier,
    pub receipts: ReceiptProcessor,
    pub reviews: ReviewService,
    pub points: PointsService,
    pub notifications: NotificationService,
    pub analytics: AnalyticsService,
}

impl AppState {
    /// Wire services over `store`. Spawns the notification worker, so this
    /// must run inside a Tokio runtime.
    pub fn new(
        config: Config,
        store: Arc<dyn LoyaltyStore>,
        directory: FiscalDirectory,
    ) -> error::Result<Self> {
        let fiscal = FiscalClient::new(
            config.fiscal_specifications_url.clone(),
            config.fiscal_timeout,
            Arc::new(directory),
        )?;
        let notifier = Notifier::spawn(store.clone());

        Ok(Self {
            receipts: ReceiptProcessor::new(store.clone(), fiscal, notifier.clone()),
            reviews: ReviewService::new(store.clone(), notifier.clone()),
            points: PointsService::new(store.clone()),
            notifications: NotificationService::new(store.clone()),
            analytics: AnalyticsService::new(store.clone()),
            notifier,
            store,
            config,
        })
    }
}
