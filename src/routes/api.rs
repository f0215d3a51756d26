// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{MatchedItem, Product, ReviewRequest, Store, Transaction, UnmatchedItem};
use crate::services::notifications::NotificationList;
use crate::services::points::{Balance, BalanceChange};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/receipt/scan", post(scan_receipt))
        .route("/api/points", get(get_balance))
        .route("/api/points/use", post(use_points))
        .route("/api/points/history", get(get_history))
        .route("/api/notifications", get(get_notifications))
        .route("/api/notifications/unread-count", get(get_unread_count))
        .route("/api/notifications/read-all", put(mark_all_read))
        .route("/api/notifications/{id}/read", put(mark_read))
        .route("/api/products", get(list_products))
        .route("/api/review/request", post(submit_review))
}

// ─── Receipts ────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct ScanRequest {
    #[serde(default, alias = "qrData")]
    #[validate(length(min = 1, message = "QR data is required"))]
    pub qr_data: String,
}

#[derive(Serialize)]
pub struct ScanResponse {
    pub message: String,
    pub transaction: Transaction,
    pub store: Store,
    pub matched_products: Vec<MatchedItem>,
    pub unmatched_products: Vec<UnmatchedItem>,
    pub total_points_earned: i64,
    pub tier_multiplier: f64,
    pub tier_bonus_points: i64,
}

async fn scan_receipt(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ScanRequest>,
) -> Result<(StatusCode, Json<ScanResponse>)> {
    req.validate()?;

    let result = state.receipts.scan(&req.qr_data, &user.user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ScanResponse {
            message: "Receipt scanned successfully".to_string(),
            transaction: result.transaction,
            store: result.store,
            matched_products: result.matched,
            unmatched_products: result.unmatched,
            total_points_earned: result.total_points,
            tier_multiplier: result.multiplier,
            tier_bonus_points: result.tier_bonus_points,
        }),
    ))
}

// ─── Points ──────────────────────────────────────────────────

async fn get_balance(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Balance>> {
    Ok(Json(state.points.balance(&user.user_id).await?))
}

#[derive(Deserialize, Validate)]
pub struct UsePointsRequest {
    #[validate(range(min = 1, message = "Points must be a positive integer"))]
    pub points: i64,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Serialize)]
pub struct PointsResponse {
    pub message: String,
    #[serde(flatten)]
    pub change: BalanceChange,
}

async fn use_points(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<UsePointsRequest>,
) -> Result<Json<PointsResponse>> {
    req.validate()?;

    let change = state
        .points
        .use_points(&user.user_id, req.points, req.reference)
        .await?;

    Ok(Json(PointsResponse {
        message: format!("{} points deducted", change.points),
        change,
    }))
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Transaction>>> {
    Ok(Json(state.points.history(&user.user_id).await?))
}

// ─── Notifications ───────────────────────────────────────────

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn get_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<NotificationList>> {
    Ok(Json(
        state
            .notifications
            .page(&user.user_id, query.page, query.limit)
            .await?,
    ))
}

#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UnreadCountResponse>> {
    let unread_count = state.notifications.unread_count(&user.user_id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.notifications.mark_read(&user.user_id, &id).await?;
    Ok(Json(MessageResponse {
        message: "Notification marked as read".to_string(),
    }))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MessageResponse>> {
    state.notifications.mark_all_read(&user.user_id).await?;
    Ok(Json(MessageResponse {
        message: "All notifications marked as read".to_string(),
    }))
}

// ─── Products ────────────────────────────────────────────────

async fn list_products(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.store.list_products().await?))
}

// ─── Review Requests ─────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct ReviewSubmitRequest {
    #[serde(default, alias = "productName")]
    #[validate(length(min = 1, message = "Product name is required"))]
    pub product_name: String,
    #[serde(default, alias = "productIdentifier")]
    pub product_identifier: Option<String>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub message: String,
    pub review: ReviewRequest,
}

async fn submit_review(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ReviewSubmitRequest>,
) -> Result<(StatusCode, Json<ReviewResponse>)> {
    req.validate()?;

    let submission = state
        .reviews
        .submit(
            &req.product_name,
            req.product_identifier.as_deref(),
            &user.user_id,
        )
        .await?;

    let (status, message) = if submission.created {
        (StatusCode::CREATED, "Review request submitted")
    } else {
        (StatusCode::OK, "Review already requested for this product")
    };

    Ok((
        status,
        Json(ReviewResponse {
            message: message.to_string(),
            review: submission.review,
        }),
    ))
}
