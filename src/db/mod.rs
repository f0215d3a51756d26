//! Persistence layer.
//!
//! [`LoyaltyStore`] is the port the services talk to. Two adapters implement
//! it: [`FirestoreDb`] for production and [`MemoryStore`] for local
//! development and tests.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;

pub use self::firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{Notification, Product, ReviewRequest, ReviewStatus, Store, Tier, Transaction, User};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const STORES: &str = "stores";
    pub const PRODUCTS: &str = "products";
    /// Uniqueness guards for `Product.identifier` (keyed by encoded identifier)
    pub const PRODUCT_IDENTIFIERS: &str = "product_identifiers";
    /// Keyed by receipt hash
    pub const TRANSACTIONS: &str = "transactions";
    pub const REVIEW_REQUESTS: &str = "review_requests";
    /// One guard per identifier with a pending review (keyed by encoded identifier)
    pub const PENDING_REVIEWS: &str = "pending_reviews";
    pub const NOTIFICATIONS: &str = "notifications";
}

/// Result of crediting earned points to a user.
#[derive(Debug, Clone)]
pub struct Credit {
    /// Tier before the credit was applied
    pub previous_tier: Tier,
    /// User after the credit, with the tier recomputed
    pub user: User,
}

impl Credit {
    pub fn tier_changed(&self) -> bool {
        self.previous_tier != self.user.tier
    }
}

/// Points moved onto a historical transaction by a retroactive award.
#[derive(Debug, Clone)]
pub struct RetroactiveAward {
    /// Tier-adjusted points added to the transaction total and the owner
    pub points: i64,
    pub credit: Credit,
}

/// One page of a user's notifications, newest first.
#[derive(Debug, Clone)]
pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    /// All notifications of the user, across pages
    pub total: u64,
}

/// Storage operations needed by the loyalty services.
///
/// Every balance mutation is applied atomically against the stored value.
#[async_trait]
pub trait LoyaltyStore: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>>;

    async fn upsert_user(&self, user: &User) -> Result<()>;

    /// All users, newest first.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Add earned points to balance and lifetime total, then recompute the tier.
    ///
    /// Fails with `NotFound` for unknown users.
    async fn credit_points(&self, user_id: &str, points: i64) -> Result<Credit>;

    /// Subtract `points` if the stored balance covers it.
    ///
    /// Fails with `InsufficientBalance` otherwise, leaving the balance untouched.
    async fn spend_points(&self, user_id: &str, points: i64) -> Result<User>;

    /// Add to the spendable balance only (manual grants and refunds).
    async fn add_points(&self, user_id: &str, points: i64) -> Result<User>;

    // ─── Stores ──────────────────────────────────────────────────

    /// Return the store with `candidate.fiscal_id`, creating it from
    /// `candidate` if none exists.
    async fn get_or_create_store(&self, candidate: Store) -> Result<Store>;

    /// Set the location of the store with `fiscal_id` unless one is already
    /// recorded.
    async fn set_store_location_if_missing(
        &self,
        fiscal_id: &str,
        location: &str,
    ) -> Result<Store>;

    async fn list_stores(&self) -> Result<Vec<Store>>;

    // ─── Transactions ────────────────────────────────────────────

    async fn find_transaction_by_hash(&self, receipt_hash: &str) -> Result<Option<Transaction>>;

    /// Insert a new transaction.
    ///
    /// Fails with `DuplicateReceipt` if its receipt hash is already stored.
    async fn create_transaction(&self, transaction: &Transaction) -> Result<()>;

    async fn list_transactions(&self) -> Result<Vec<Transaction>>;

    /// Transactions of one user, newest first.
    async fn list_transactions_for_user(&self, user_id: &str) -> Result<Vec<Transaction>>;

    /// Award `product` for the unmatched item `item_name` of a stored
    /// transaction.
    ///
    /// The item moves to matched, and the points (per-unit value times
    /// quantity, adjusted by the owner's current tier) are added to both the
    /// transaction total and the owner's balances in one atomic step.
    /// Returns `None` if the item is no longer unmatched. Fails with
    /// `NotFound` if the transaction or its owner is missing, leaving both
    /// untouched.
    async fn award_unmatched_item(
        &self,
        receipt_hash: &str,
        item_name: &str,
        product: &Product,
    ) -> Result<Option<RetroactiveAward>>;

    // ─── Products ────────────────────────────────────────────────

    /// Catalog products with status `Known`, in creation order.
    async fn list_known_products(&self) -> Result<Vec<Product>>;

    /// Every product regardless of status, newest first.
    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn find_product_by_identifier(&self, identifier: &str) -> Result<Option<Product>>;

    /// Insert a product; fails with `InvalidState` if the identifier is taken.
    async fn create_product(&self, product: &Product) -> Result<()>;

    // ─── Review requests ─────────────────────────────────────────

    async fn get_review(&self, review_id: &str) -> Result<Option<ReviewRequest>>;

    /// Store a pending review unless one is already pending for the same
    /// identifier, in which case that one is returned.
    ///
    /// The flag is `true` when `review` was inserted.
    async fn submit_review(&self, review: ReviewRequest) -> Result<(ReviewRequest, bool)>;

    /// Reviews newest first, optionally filtered by status.
    async fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRequest>>;

    /// Approve a pending review and insert `product` into the catalog as one
    /// step.
    ///
    /// Fails with `NotFound`, or with `InvalidState` if the review is no
    /// longer pending or the product identifier is taken. Nothing changes on
    /// failure.
    async fn approve_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
        product: &Product,
    ) -> Result<ReviewRequest>;

    /// Reject a pending review.
    ///
    /// Fails with `NotFound` or, if the review is no longer pending,
    /// `InvalidState`.
    async fn reject_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
    ) -> Result<ReviewRequest>;

    // ─── Notifications ───────────────────────────────────────────

    async fn insert_notification(&self, notification: &Notification) -> Result<()>;

    /// Up to `limit` notifications of one user after skipping `offset`,
    /// newest first.
    async fn list_notifications(
        &self,
        user_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<NotificationPage>;

    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64>;

    /// Mark one notification of `user_id` as read.
    ///
    /// Fails with `NotFound` if it does not exist or belongs to someone else.
    async fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<()>;

    /// Mark every unread notification of `user_id` as read; returns how many
    /// changed.
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64>;
}
