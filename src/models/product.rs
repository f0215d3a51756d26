//! Catalog product model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog status; only `Known` products take part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    Known,
    Pending,
    Rejected,
}

/// A product that earns points when it appears on a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    /// Display name
    pub name: String,
    /// Matching key, usually the receipt item text (unique)
    pub identifier: String,
    /// Points per unit
    pub points_value: i64,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// New catalog entry that is immediately matchable.
    pub fn known(name: impl Into<String>, identifier: impl Into<String>, points_value: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            identifier: identifier.into(),
            points_value,
            status: ProductStatus::Known,
            created_at: Utc::now(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.status == ProductStatus::Known
    }
}
