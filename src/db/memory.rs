// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local store backed by `DashMap`.
//!
//! Uniqueness constraints use the entry API and balance updates happen under
//! the shard guard, so concurrent callers see the same guarantees as with
//! Firestore. Guards are never held across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::db::{Credit, LoyaltyStore, NotificationPage, RetroactiveAward};
use crate::error::{AppError, Result};
use crate::models::{
    Notification, Product, ReviewDecision, ReviewRequest, ReviewStatus, Store, Transaction, User,
};
use crate::services::tiers::{tier_adjusted_points, tier_for};

#[derive(Default)]
struct Tables {
    users: DashMap<String, User>,
    /// Keyed by fiscal ID
    stores: DashMap<String, Store>,
    /// Keyed by receipt hash
    transactions: DashMap<String, Transaction>,
    /// Keyed by identifier; the sequence number keeps insertion order
    products: DashMap<String, (u64, Product)>,
    product_seq: AtomicU64,
    reviews: DashMap<String, ReviewRequest>,
    /// Identifier -> ID of its pending review
    pending_reviews: DashMap<String, String>,
    notifications: DashMap<String, Notification>,
}

/// In-memory [`LoyaltyStore`]. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `decision` to a pending review while `pending` (the identifier's
    /// pending slot) is held, then free the slot.
    fn decide_locked(
        &self,
        pending: Entry<'_, String, String>,
        review_id: &str,
        decision: ReviewDecision,
    ) -> Result<ReviewRequest> {
        let mut review = self
            .tables
            .reviews
            .get_mut(review_id)
            .ok_or_else(|| review_not_found(review_id))?;
        if !review.is_pending() {
            return Err(already_decided(&review));
        }
        decision.apply(&mut review);
        let decided = review.clone();
        drop(review);

        if let Entry::Occupied(slot) = pending {
            if slot.get() == review_id {
                slot.remove();
            }
        }
        Ok(decided)
    }

    fn review_identifier(&self, review_id: &str) -> Result<String> {
        self.tables
            .reviews
            .get(review_id)
            .map(|r| r.product_identifier.clone())
            .ok_or_else(|| review_not_found(review_id))
    }
}

fn user_not_found(user_id: &str) -> AppError {
    AppError::NotFound(format!("User {}", user_id))
}

fn review_not_found(review_id: &str) -> AppError {
    AppError::NotFound(format!("Review request {}", review_id))
}

fn already_decided(review: &ReviewRequest) -> AppError {
    AppError::InvalidState(format!(
        "Review request is already {}",
        review.status.as_str()
    ))
}

fn identifier_taken(identifier: &str) -> AppError {
    AppError::InvalidState(format!("Product identifier {} already exists", identifier))
}

#[async_trait]
impl LoyaltyStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        Ok(self.tables.users.get(user_id).map(|u| u.clone()))
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.tables.users.iter().map(|u| u.clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn credit_points(&self, user_id: &str, points: i64) -> Result<Credit> {
        let mut user = self
            .tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;

        let previous_tier = user.tier;
        user.points_balance += points;
        user.total_points_earned += points;
        user.tier = tier_for(user.total_points_earned);

        Ok(Credit {
            previous_tier,
            user: user.clone(),
        })
    }

    async fn spend_points(&self, user_id: &str, points: i64) -> Result<User> {
        let mut user = self
            .tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;

        if user.points_balance < points {
            return Err(AppError::InsufficientBalance {
                current_balance: user.points_balance,
                requested: points,
            });
        }
        user.points_balance -= points;
        Ok(user.clone())
    }

    async fn add_points(&self, user_id: &str, points: i64) -> Result<User> {
        let mut user = self
            .tables
            .users
            .get_mut(user_id)
            .ok_or_else(|| user_not_found(user_id))?;
        user.points_balance += points;
        Ok(user.clone())
    }

    async fn get_or_create_store(&self, candidate: Store) -> Result<Store> {
        let store = self
            .tables
            .stores
            .entry(candidate.fiscal_id.clone())
            .or_insert(candidate);
        Ok(store.clone())
    }

    async fn set_store_location_if_missing(
        &self,
        fiscal_id: &str,
        location: &str,
    ) -> Result<Store> {
        let mut store = self
            .tables
            .stores
            .get_mut(fiscal_id)
            .ok_or_else(|| AppError::NotFound(format!("Store {}", fiscal_id)))?;
        if store.location.is_none() {
            store.location = Some(location.to_string());
        }
        Ok(store.clone())
    }

    async fn list_stores(&self) -> Result<Vec<Store>> {
        let mut stores: Vec<Store> = self.tables.stores.iter().map(|s| s.clone()).collect();
        stores.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(stores)
    }

    async fn find_transaction_by_hash(&self, receipt_hash: &str) -> Result<Option<Transaction>> {
        Ok(self.tables.transactions.get(receipt_hash).map(|t| t.clone()))
    }

    async fn create_transaction(&self, transaction: &Transaction) -> Result<()> {
        match self
            .tables
            .transactions
            .entry(transaction.receipt_hash.clone())
        {
            Entry::Occupied(_) => Err(AppError::DuplicateReceipt),
            Entry::Vacant(slot) => {
                slot.insert(transaction.clone());
                Ok(())
            }
        }
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let mut all: Vec<Transaction> =
            self.tables.transactions.iter().map(|t| t.clone()).collect();
        all.sort_by(|a, b| a.scanned_at.cmp(&b.scanned_at));
        Ok(all)
    }

    async fn list_transactions_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        let mut mine: Vec<Transaction> = self
            .tables
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.clone())
            .collect();
        mine.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));
        Ok(mine)
    }

    async fn award_unmatched_item(
        &self,
        receipt_hash: &str,
        item_name: &str,
        product: &Product,
    ) -> Result<Option<RetroactiveAward>> {
        // Lock order: transactions, then users
        let mut txn = self
            .tables
            .transactions
            .get_mut(receipt_hash)
            .ok_or_else(|| AppError::NotFound(format!("Transaction {}", receipt_hash)))?;
        let mut owner = self
            .tables
            .users
            .get_mut(&txn.user_id)
            .ok_or_else(|| user_not_found(&txn.user_id))?;

        let tier = owner.tier;
        let Some(points) = txn.items.reclassify(item_name, product, |quantity| {
            tier_adjusted_points(product.points_value, quantity, tier)
        }) else {
            return Ok(None);
        };
        txn.total_points += points;

        owner.points_balance += points;
        owner.total_points_earned += points;
        owner.tier = tier_for(owner.total_points_earned);

        Ok(Some(RetroactiveAward {
            points,
            credit: Credit {
                previous_tier: tier,
                user: owner.clone(),
            },
        }))
    }

    async fn list_known_products(&self) -> Result<Vec<Product>> {
        let mut known: Vec<(u64, Product)> = self
            .tables
            .products
            .iter()
            .filter(|p| p.1.is_known())
            .map(|p| p.value().clone())
            .collect();
        known.sort_by_key(|(seq, _)| *seq);
        Ok(known.into_iter().map(|(_, p)| p).collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let mut all: Vec<(u64, Product)> =
            self.tables.products.iter().map(|p| p.value().clone()).collect();
        all.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(all.into_iter().map(|(_, p)| p).collect())
    }

    async fn find_product_by_identifier(&self, identifier: &str) -> Result<Option<Product>> {
        Ok(self.tables.products.get(identifier).map(|p| p.1.clone()))
    }

    async fn create_product(&self, product: &Product) -> Result<()> {
        match self.tables.products.entry(product.identifier.clone()) {
            Entry::Occupied(_) => Err(identifier_taken(&product.identifier)),
            Entry::Vacant(slot) => {
                let seq = self.tables.product_seq.fetch_add(1, Ordering::SeqCst);
                slot.insert((seq, product.clone()));
                Ok(())
            }
        }
    }

    async fn get_review(&self, review_id: &str) -> Result<Option<ReviewRequest>> {
        Ok(self.tables.reviews.get(review_id).map(|r| r.clone()))
    }

    async fn submit_review(&self, review: ReviewRequest) -> Result<(ReviewRequest, bool)> {
        // Lock order: pending_reviews, then reviews
        match self
            .tables
            .pending_reviews
            .entry(review.product_identifier.clone())
        {
            Entry::Occupied(slot) => {
                let existing = self
                    .tables
                    .reviews
                    .get(slot.get())
                    .map(|r| r.clone())
                    .ok_or_else(|| {
                        AppError::Database(format!("Dangling pending review {}", slot.get()))
                    })?;
                Ok((existing, false))
            }
            Entry::Vacant(slot) => {
                self.tables.reviews.insert(review.id.clone(), review.clone());
                slot.insert(review.id.clone());
                Ok((review, true))
            }
        }
    }

    async fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRequest>> {
        let mut reviews: Vec<ReviewRequest> = self
            .tables
            .reviews
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| r.clone())
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }

    async fn approve_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
        product: &Product,
    ) -> Result<ReviewRequest> {
        let identifier = self.review_identifier(review_id)?;

        // Lock order: pending_reviews, products, then reviews
        let pending = self.tables.pending_reviews.entry(identifier);
        let slot = match self.tables.products.entry(product.identifier.clone()) {
            Entry::Occupied(_) => return Err(identifier_taken(&product.identifier)),
            Entry::Vacant(slot) => slot,
        };

        let decided = self.decide_locked(
            pending,
            review_id,
            ReviewDecision::Approve {
                points_value: product.points_value,
                admin_notes,
            },
        )?;

        let seq = self.tables.product_seq.fetch_add(1, Ordering::SeqCst);
        slot.insert((seq, product.clone()));
        Ok(decided)
    }

    async fn reject_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
    ) -> Result<ReviewRequest> {
        let identifier = self.review_identifier(review_id)?;

        // Same lock order as submit_review
        let pending = self.tables.pending_reviews.entry(identifier);
        self.decide_locked(pending, review_id, ReviewDecision::Reject { admin_notes })
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.tables
            .notifications
            .insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<NotificationPage> {
        let mut mine: Vec<Notification> = self
            .tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .map(|n| n.clone())
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = mine.len() as u64;
        let notifications = mine
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(NotificationPage {
            notifications,
            total,
        })
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64> {
        Ok(self
            .tables
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as u64)
    }

    async fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<()> {
        match self.tables.notifications.get_mut(notification_id) {
            Some(mut n) if n.user_id == user_id => {
                n.read = true;
                Ok(())
            }
            _ => Err(AppError::NotFound(format!("Notification {}", notification_id))),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64> {
        let mut changed = 0;
        for mut n in self.tables.notifications.iter_mut() {
            if n.user_id == user_id && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
