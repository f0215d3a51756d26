// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Partner webshop routes: balance checks, point redemption and refunds.

use crate::error::{AppError, Result};
use crate::middleware::webshop::Webshop;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Webshop routes. The API key middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/webshop/points/{user_id}", get(check_points))
        .route("/api/webshop/points/use", post(use_points))
        .route("/api/webshop/points/refund", post(refund_points))
}

#[derive(Serialize)]
pub struct WebshopBalance {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub points_balance: i64,
    pub webshop: String,
}

async fn check_points(
    State(state): State<Arc<AppState>>,
    Extension(webshop): Extension<Webshop>,
    Path(user_id): Path<String>,
) -> Result<Json<WebshopBalance>> {
    let user = state
        .store
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

    Ok(Json(WebshopBalance {
        user_id: user.id,
        name: user.name,
        email: user.email,
        points_balance: user.points_balance,
        webshop: webshop.name,
    }))
}

#[derive(Deserialize, Validate)]
pub struct WebshopUseRequest {
    #[serde(default, alias = "userId")]
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[serde(default)]
    #[validate(range(min = 1, message = "Points must be a positive integer"))]
    pub points: i64,
    #[serde(default, alias = "orderId")]
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub order_id: String,
}

#[derive(Serialize)]
pub struct WebshopUseResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
    pub previous_balance: i64,
    pub points_used: i64,
    pub new_balance: i64,
    pub order_id: String,
    pub webshop: String,
    pub timestamp: DateTime<Utc>,
}

async fn use_points(
    State(state): State<Arc<AppState>>,
    Extension(webshop): Extension<Webshop>,
    Json(req): Json<WebshopUseRequest>,
) -> Result<Json<WebshopUseResponse>> {
    req.validate()?;

    let change = state
        .points
        .use_points(&req.user_id, req.points, Some(req.order_id.clone()))
        .await?;

    tracing::info!(
        webshop = %webshop.name,
        user_id = %change.user_id,
        order_id = %req.order_id,
        points = change.points,
        "Webshop redeemed points"
    );

    Ok(Json(WebshopUseResponse {
        success: true,
        message: format!("{} points deducted", change.points),
        previous_balance: change.new_balance + change.points,
        points_used: change.points,
        new_balance: change.new_balance,
        user_id: change.user_id,
        order_id: req.order_id,
        webshop: webshop.name,
        timestamp: Utc::now(),
    }))
}

#[derive(Deserialize, Validate)]
pub struct WebshopRefundRequest {
    #[serde(default, alias = "userId")]
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[serde(default)]
    #[validate(range(min = 1, message = "Points must be a positive integer"))]
    pub points: i64,
    #[serde(default, alias = "orderId")]
    #[validate(length(min = 1, message = "Order ID is required"))]
    pub order_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct WebshopRefundResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
    pub points_refunded: i64,
    pub new_balance: i64,
    pub order_id: String,
    pub reason: String,
    pub webshop: String,
    pub timestamp: DateTime<Utc>,
}

async fn refund_points(
    State(state): State<Arc<AppState>>,
    Extension(webshop): Extension<Webshop>,
    Json(req): Json<WebshopRefundRequest>,
) -> Result<Json<WebshopRefundResponse>> {
    req.validate()?;

    let reason = req
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| "No reason provided".to_string());
    let change = state
        .points
        .refund_points(&req.user_id, req.points, req.order_id.clone())
        .await?;

    tracing::info!(
        webshop = %webshop.name,
        user_id = %change.user_id,
        order_id = %req.order_id,
        points = change.points,
        reason = %reason,
        "Webshop refunded points"
    );

    Ok(Json(WebshopRefundResponse {
        success: true,
        message: format!("{} points refunded", change.points),
        points_refunded: change.points,
        new_balance: change.new_balance,
        user_id: change.user_id,
        order_id: req.order_id,
        reason,
        webshop: webshop.name,
        timestamp: Utc::now(),
    }))
}
