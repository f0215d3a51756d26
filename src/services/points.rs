//! Point balances: reads, spends, manual grants and refunds.

use std::sync::Arc;

use serde::Serialize;

use crate::db::LoyaltyStore;
use crate::error::{AppError, Result};
use crate::models::{Tier, Transaction};
use crate::services::tiers::{progress, TierProgress};

/// Balance summary for one user.
#[derive(Debug, Clone, Serialize)]
pub struct Balance {
    pub user_id: String,
    pub points_balance: i64,
    pub total_points_earned: i64,
    pub tier: Tier,
    pub progress: TierProgress,
}

/// Balance after a spend, grant or refund.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceChange {
    pub user_id: String,
    pub points: i64,
    pub new_balance: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

fn require_positive(points: i64) -> Result<()> {
    if points <= 0 {
        return Err(AppError::Validation(
            "Points must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

pub struct PointsService {
    store: Arc<dyn LoyaltyStore>,
}

impl PointsService {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    pub async fn balance(&self, user_id: &str) -> Result<Balance> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

        Ok(Balance {
            progress: progress(user.total_points_earned),
            user_id: user.id,
            points_balance: user.points_balance,
            total_points_earned: user.total_points_earned,
            tier: user.tier,
        })
    }

    /// Spend points; the balance check and decrement are one atomic step.
    pub async fn use_points(
        &self,
        user_id: &str,
        points: i64,
        reference: Option<String>,
    ) -> Result<BalanceChange> {
        require_positive(points)?;
        let user = self.store.spend_points(user_id, points).await?;

        tracing::info!(
            user_id,
            points,
            balance = user.points_balance,
            reference = reference.as_deref().unwrap_or(""),
            "Points used"
        );
        Ok(BalanceChange {
            user_id: user.id,
            points,
            new_balance: user.points_balance,
            reference,
        })
    }

    /// Grant points outside of a scan. Not an earning event.
    pub async fn add_points(&self, user_id: &str, points: i64) -> Result<BalanceChange> {
        require_positive(points)?;
        let user = self.store.add_points(user_id, points).await?;

        tracing::info!(user_id, points, balance = user.points_balance, "Points added");
        Ok(BalanceChange {
            user_id: user.id,
            points,
            new_balance: user.points_balance,
            reference: None,
        })
    }

    /// Return previously used points, e.g. for a cancelled order.
    pub async fn refund_points(
        &self,
        user_id: &str,
        points: i64,
        reference: String,
    ) -> Result<BalanceChange> {
        require_positive(points)?;
        if reference.trim().is_empty() {
            return Err(AppError::Validation("Refund reference is required".to_string()));
        }
        let user = self.store.add_points(user_id, points).await?;

        tracing::info!(
            user_id,
            points,
            balance = user.points_balance,
            reference = %reference,
            "Points refunded"
        );
        Ok(BalanceChange {
            user_id: user.id,
            points,
            new_balance: user.points_balance,
            reference: Some(reference),
        })
    }

    /// The user's scans, newest first.
    pub async fn history(&self, user_id: &str) -> Result<Vec<Transaction>> {
        self.store.list_transactions_for_user(user_id).await
    }
}
