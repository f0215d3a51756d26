// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Admin access required")]
    Forbidden,

    #[error("API key required. Set x-api-key header.")]
    ApiKeyRequired,

    #[error("Invalid or inactive API key")]
    InvalidApiKey,

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("This receipt has already been scanned")]
    DuplicateReceipt,

    #[error("Fiscal service error: {0}")]
    Fetch(String),

    #[error("Receipt parse error: {0}")]
    Parse(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient points: balance {current_balance}, requested {requested}")]
    InsufficientBalance { current_balance: i64, requested: i64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the user may simply retry the scan later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Fetch(_) | AppError::Parse(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Prefer the field's own message over the generated summary
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| errors.to_string());
        AppError::Validation(message)
    }
}

/// JSON error response body
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_balance: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    requested: Option<i64>,
    /// Set for upstream failures the client may retry
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_transient() {
            tracing::warn!(error = %self, "Upstream fiscal failure, scan may be retried");
        }

        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden", None),
            AppError::ApiKeyRequired => (
                StatusCode::UNAUTHORIZED,
                "api_key_required",
                Some(self.to_string()),
            ),
            AppError::InvalidApiKey => (
                StatusCode::FORBIDDEN,
                "invalid_api_key",
                Some(self.to_string()),
            ),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone()))
            }
            AppError::DuplicateReceipt => (
                StatusCode::CONFLICT,
                "duplicate_receipt",
                Some(self.to_string()),
            ),
            AppError::Fetch(msg) => (StatusCode::BAD_GATEWAY, "fetch_error", Some(msg.clone())),
            AppError::Parse(msg) => (StatusCode::BAD_GATEWAY, "parse_error", Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::InvalidState(msg) => {
                (StatusCode::CONFLICT, "invalid_state", Some(msg.clone()))
            }
            AppError::InsufficientBalance { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "insufficient_balance",
                Some("Insufficient points".to_string()),
            ),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let (current_balance, requested) = match &self {
            AppError::InsufficientBalance {
                current_balance,
                requested,
            } => (Some(*current_balance), Some(*requested)),
            _ => (None, None),
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            current_balance,
            requested,
            retryable: self.is_transient(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
