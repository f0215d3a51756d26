//! Product review requests for unmatched receipt items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Review lifecycle; `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "PENDING",
            ReviewStatus::Approved => "APPROVED",
            ReviewStatus::Rejected => "REJECTED",
        }
    }
}

/// A request to add a product to the catalog.
///
/// At most one `Pending` request exists per `product_identifier`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub id: String,
    pub product_name: String,
    pub product_identifier: String,
    pub submitted_by_user_id: String,
    pub status: ReviewStatus,
    /// Set on approval
    pub points_value: Option<i64>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewRequest {
    pub fn pending(
        product_name: impl Into<String>,
        product_identifier: impl Into<String>,
        submitted_by_user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            product_name: product_name.into(),
            product_identifier: product_identifier.into(),
            submitted_by_user_id: submitted_by_user_id.into(),
            status: ReviewStatus::Pending,
            points_value: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ReviewStatus::Pending
    }
}

/// Terminal decision applied to a pending review.
#[derive(Debug, Clone)]
pub enum ReviewDecision {
    Approve {
        points_value: i64,
        admin_notes: Option<String>,
    },
    Reject {
        admin_notes: Option<String>,
    },
}

impl ReviewDecision {
    /// Apply the decision to a pending review.
    pub fn apply(&self, review: &mut ReviewRequest) {
        match self {
            ReviewDecision::Approve {
                points_value,
                admin_notes,
            } => {
                review.status = ReviewStatus::Approved;
                review.points_value = Some(*points_value);
                review.admin_notes = admin_notes.clone();
            }
            ReviewDecision::Reject { admin_notes } => {
                review.status = ReviewStatus::Rejected;
                review.admin_notes = admin_notes.clone();
            }
        }
        review.updated_at = Utc::now();
    }
}
