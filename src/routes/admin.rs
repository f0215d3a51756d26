// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: review queue decisions, catalog entries, manual point
//! adjustments and dashboard statistics.

use crate::error::{AppError, Result};
use crate::models::{Product, ReviewRequest};
use crate::routes::api::{PointsResponse, ReviewResponse};
use crate::services::analytics::{
    DashboardStats, ProductStats, StoreStats, UnknownProductStats, UserStats,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Admin routes. Both auth and the admin check are applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/review/queue", get(get_queue))
        .route("/api/review/all", get(get_all_reviews))
        .route("/api/review/{id}/approve", post(approve_review))
        .route("/api/review/{id}/reject", post(reject_review))
        .route("/api/admin/points/add", post(add_points))
        .route("/api/admin/points/refund", post(refund_points))
        .route("/api/admin/products", post(create_product))
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/stats/stores", get(get_store_stats))
        .route("/api/admin/stats/products", get(get_product_stats))
        .route("/api/admin/stats/users", get(get_user_stats))
        .route("/api/admin/stats/unknown-products", get(get_unknown_product_stats))
}

// ─── Review Queue ────────────────────────────────────────────

async fn get_queue(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ReviewRequest>>> {
    Ok(Json(state.reviews.queue().await?))
}

async fn get_all_reviews(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ReviewRequest>>> {
    Ok(Json(state.reviews.all().await?))
}

#[derive(Deserialize, Validate)]
pub struct ApproveRequest {
    #[serde(default, alias = "pointsValue")]
    #[validate(range(min = 1, message = "Points value is required and must be positive"))]
    pub points_value: i64,
    #[serde(default, alias = "adminNotes")]
    pub admin_notes: Option<String>,
}

#[derive(Serialize)]
pub struct ApproveResponse {
    pub message: String,
    pub review: ReviewRequest,
    pub product: Product,
    pub retroactive_updates: usize,
}

async fn approve_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<ApproveResponse>> {
    req.validate()?;

    let approval = state
        .reviews
        .approve(&id, req.points_value, req.admin_notes)
        .await?;

    let message = if approval.retroactive_count > 0 {
        format!(
            "Product approved. Retroactive points awarded to {} transaction(s).",
            approval.retroactive_count
        )
    } else {
        "Product approved.".to_string()
    };

    Ok(Json(ApproveResponse {
        message,
        review: approval.review,
        product: approval.product,
        retroactive_updates: approval.retroactive_count,
    }))
}

#[derive(Deserialize, Default)]
pub struct RejectRequest {
    #[serde(default, alias = "adminNotes")]
    pub admin_notes: Option<String>,
}

async fn reject_review(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ReviewResponse>> {
    // Notes are optional, so an empty body is accepted
    let req: RejectRequest = if body.is_empty() {
        RejectRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?
    };
    let review = state.reviews.reject(&id, req.admin_notes).await?;

    Ok(Json(ReviewResponse {
        message: "Review rejected".to_string(),
        review,
    }))
}

// ─── Catalog ─────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateProductRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    /// Defaults to the name
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default, alias = "pointsValue")]
    #[validate(range(min = 1, message = "Points value is required and must be positive"))]
    pub points_value: i64,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub message: String,
    pub product: Product,
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>)> {
    req.validate()?;

    let name = req.name.trim();
    let identifier = req
        .identifier
        .as_deref()
        .map(str::trim)
        .filter(|i| !i.is_empty())
        .unwrap_or(name);
    let product = Product::known(name, identifier, req.points_value);
    state.store.create_product(&product).await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Product created".to_string(),
            product,
        }),
    ))
}

// ─── Point Adjustments ───────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct AddPointsRequest {
    #[serde(alias = "userId")]
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[validate(range(min = 1, message = "Points must be a positive integer"))]
    pub points: i64,
}

async fn add_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddPointsRequest>,
) -> Result<Json<PointsResponse>> {
    req.validate()?;

    let change = state.points.add_points(&req.user_id, req.points).await?;
    Ok(Json(PointsResponse {
        message: format!("{} points added", change.points),
        change,
    }))
}

#[derive(Deserialize, Validate)]
pub struct RefundPointsRequest {
    #[serde(alias = "userId")]
    #[validate(length(min = 1, message = "User ID is required"))]
    pub user_id: String,
    #[validate(range(min = 1, message = "Points must be a positive integer"))]
    pub points: i64,
    #[validate(length(min = 1, message = "Refund reference is required"))]
    pub reference: String,
}

async fn refund_points(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefundPointsRequest>,
) -> Result<Json<PointsResponse>> {
    req.validate()?;

    let change = state
        .points
        .refund_points(&req.user_id, req.points, req.reference)
        .await?;
    Ok(Json(PointsResponse {
        message: format!("{} points refunded", change.points),
        change,
    }))
}

// ─── Statistics ──────────────────────────────────────────────

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<DashboardStats>> {
    Ok(Json(state.analytics.dashboard().await?))
}

async fn get_store_stats(State(state): State<Arc<AppState>>) -> Result<Json<Vec<StoreStats>>> {
    Ok(Json(state.analytics.store_stats().await?))
}

async fn get_product_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductStats>>> {
    Ok(Json(state.analytics.product_stats().await?))
}

async fn get_user_stats(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserStats>>> {
    Ok(Json(state.analytics.user_stats().await?))
}

async fn get_unknown_product_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UnknownProductStats>> {
    Ok(Json(state.analytics.unknown_product_stats().await?))
}
