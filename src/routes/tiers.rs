// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public tier information.

use crate::services::tiers::{progress, TierProgress};
use crate::AppState;
use axum::{extract::Query, routing::get, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/tiers/progress", get(get_progress))
}

#[derive(Deserialize)]
struct ProgressQuery {
    #[serde(default, alias = "totalEarned")]
    total_earned: i64,
}

/// Tier progress for an arbitrary lifetime total.
async fn get_progress(Query(query): Query<ProgressQuery>) -> Json<TierProgress> {
    Json(progress(query.total_earned))
}
