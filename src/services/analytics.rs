// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin dashboard aggregates over users, stores, products and reviews.
//!
//! Computed on demand from full collection reads.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::try_join;
use serde::Serialize;

use crate::db::LoyaltyStore;
use crate::error::Result;
use crate::models::{ReviewRequest, ReviewStatus, Tier, Transaction};

/// Reviews included in `UnknownProductStats::recent`.
const RECENT_REVIEWS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_users: usize,
    pub total_transactions: usize,
    pub total_products: usize,
    pub pending_reviews: usize,
    pub total_points_issued: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub total_scans: usize,
    pub total_points_generated: i64,
    pub last_scan: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductStats {
    pub name: String,
    pub scan_count: usize,
    pub total_points: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub id: String,
    pub name: String,
    pub email: String,
    pub points_balance: i64,
    pub total_points_earned: i64,
    pub tier: Tier,
    pub total_scans: usize,
    /// Latest scan, or the join date for users who never scanned
    pub last_activity: DateTime<Utc>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnknownProductStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    /// Newest first
    pub recent: Vec<ReviewRequest>,
}

/// Scan count, points and latest scan per key.
#[derive(Default)]
struct Tally {
    scans: usize,
    points: i64,
    last: Option<DateTime<Utc>>,
}

impl Tally {
    fn add(&mut self, txn: &Transaction) {
        self.scans += 1;
        self.points += txn.total_points;
        self.last = self.last.max(Some(txn.scanned_at));
    }
}

fn tally_by<F>(transactions: &[Transaction], key: F) -> HashMap<&str, Tally>
where
    F: Fn(&Transaction) -> &str,
{
    let mut tallies: HashMap<&str, Tally> = HashMap::new();
    for txn in transactions {
        tallies.entry(key(txn)).or_default().add(txn);
    }
    tallies
}

pub struct AnalyticsService {
    store: Arc<dyn LoyaltyStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    pub async fn dashboard(&self) -> Result<DashboardStats> {
        let (users, transactions, products, pending) = try_join!(
            self.store.list_users(),
            self.store.list_transactions(),
            self.store.list_products(),
            self.store.list_reviews(Some(ReviewStatus::Pending)),
        )?;

        Ok(DashboardStats {
            total_users: users.len(),
            total_points_issued: transactions.iter().map(|t| t.total_points).sum(),
            total_transactions: transactions.len(),
            total_products: products.len(),
            pending_reviews: pending.len(),
        })
    }

    /// Every store, busiest first.
    pub async fn store_stats(&self) -> Result<Vec<StoreStats>> {
        let (stores, transactions) =
            try_join!(self.store.list_stores(), self.store.list_transactions())?;
        let tallies = tally_by(&transactions, |t| t.store_id.as_str());

        let mut stats: Vec<StoreStats> = stores
            .into_iter()
            .map(|store| {
                let tally = tallies.get(store.id.as_str());
                StoreStats {
                    total_scans: tally.map_or(0, |t| t.scans),
                    total_points_generated: tally.map_or(0, |t| t.points),
                    last_scan: tally.and_then(|t| t.last),
                    id: store.id,
                    name: store.name,
                    location: store.location,
                }
            })
            .collect();
        stats.sort_by(|a, b| b.total_scans.cmp(&a.total_scans));
        Ok(stats)
    }

    /// Matched items grouped by catalog name, most scanned first.
    pub async fn product_stats(&self) -> Result<Vec<ProductStats>> {
        let transactions = self.store.list_transactions().await?;

        let mut by_name: HashMap<&str, ProductStats> = HashMap::new();
        for item in transactions.iter().flat_map(|t| &t.items.matched) {
            let name = if item.product_name.is_empty() {
                item.name.as_str()
            } else {
                item.product_name.as_str()
            };
            let entry = by_name.entry(name).or_insert_with(|| ProductStats {
                name: name.to_string(),
                scan_count: 0,
                total_points: 0,
            });
            entry.scan_count += 1;
            entry.total_points += item.total_points;
        }

        let mut stats: Vec<ProductStats> = by_name.into_values().collect();
        stats.sort_by(|a, b| {
            b.scan_count
                .cmp(&a.scan_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(stats)
    }

    /// Every user, newest first.
    pub async fn user_stats(&self) -> Result<Vec<UserStats>> {
        let (users, transactions) =
            try_join!(self.store.list_users(), self.store.list_transactions())?;
        let tallies = tally_by(&transactions, |t| t.user_id.as_str());

        Ok(users
            .into_iter()
            .map(|user| {
                let tally = tallies.get(user.id.as_str());
                UserStats {
                    total_scans: tally.map_or(0, |t| t.scans),
                    last_activity: tally.and_then(|t| t.last).unwrap_or(user.created_at),
                    joined_at: user.created_at,
                    id: user.id,
                    name: user.name,
                    email: user.email,
                    points_balance: user.points_balance,
                    total_points_earned: user.total_points_earned,
                    tier: user.tier,
                }
            })
            .collect())
    }

    pub async fn unknown_product_stats(&self) -> Result<UnknownProductStats> {
        let reviews = self.store.list_reviews(None).await?;
        let count = |status: ReviewStatus| reviews.iter().filter(|r| r.status == status).count();

        Ok(UnknownProductStats {
            total: reviews.len(),
            pending: count(ReviewStatus::Pending),
            approved: count(ReviewStatus::Approved),
            rejected: count(ReviewStatus::Rejected),
            recent: reviews.iter().take(RECENT_REVIEWS).cloned().collect(),
        })
    }
}
