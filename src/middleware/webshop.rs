// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Partner webshop API key middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Header carrying the webshop's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Webshop identified by its API key.
#[derive(Debug, Clone)]
pub struct Webshop {
    pub name: String,
}

/// Require a configured `x-api-key` for `/api/webshop/*` routes.
pub async fn require_webshop_key(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty());

    let Some(key) = key else {
        tracing::warn!(path = %request.uri().path(), "Blocked webshop request without API key");
        return Err(AppError::ApiKeyRequired);
    };

    let Some(webshop) = state.config.webshop_for_key(key) else {
        tracing::warn!(path = %request.uri().path(), "Blocked webshop request with invalid API key");
        return Err(AppError::InvalidApiKey);
    };

    tracing::debug!(webshop = %webshop.name, "Webshop API key accepted");
    let webshop = Webshop {
        name: webshop.name.clone(),
    };
    request.extensions_mut().insert(webshop);

    Ok(next.run(request).await)
}
