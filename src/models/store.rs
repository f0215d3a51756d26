//! Retail store model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A store, created lazily from the first receipt that names its fiscal ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Store {
    pub id: String,
    pub name: String,
    /// Tax identifier issued by the fiscal authority (unique)
    pub fiscal_id: String,
    /// City; once set it is never overwritten
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Store {
    pub fn new(name: impl Into<String>, fiscal_id: impl Into<String>, location: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            fiscal_id: fiscal_id.into(),
            location,
            created_at: Utc::now(),
        }
    }
}
