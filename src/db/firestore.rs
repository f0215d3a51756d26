// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (balances and cached tier)
//! - Stores (keyed by fiscal ID)
//! - Transactions (keyed by receipt hash, so duplicates collide on insert)
//! - Products and review requests (uniqueness enforced with guard documents)
//! - Notifications
//!
//! Read-modify-write operations run inside Firestore transactions, which the
//! client retries on contention.

use async_trait::async_trait;
use firestore::errors::{BackoffError, FirestoreError};
use firestore::FirestoreQueryDirection;
use serde::{Deserialize, Serialize};

use crate::db::{collections, Credit, LoyaltyStore, NotificationPage, RetroactiveAward};
use crate::error::{AppError, Result};
use crate::models::{
    Notification, Product, ReviewDecision, ReviewRequest, ReviewStatus, Store, Transaction, User,
};
use crate::services::tiers::{tier_adjusted_points, tier_for};

// Firestore limits batch/transaction writes to 500 operations.
const BATCH_SIZE: usize = 500;

/// Guard document claiming a unique key for one owning document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UniqueKey {
    key: String,
    owner_id: String,
}

/// Result row of a count aggregation.
#[derive(Debug, Deserialize)]
struct Counted {
    count: i64,
}

/// Outcome of a transaction body that may fail for domain reasons.
///
/// Domain failures commit nothing and are reported after the transaction.
type Checked<T> = std::result::Result<T, AppError>;

fn db_error(e: FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

fn guard_id(key: &str) -> String {
    urlencoding::encode(key).into_owned()
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

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self> {
        // The emulator takes an unauthenticated connection
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client; every operation returns a database error.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Apply `mutate` to a user inside a transaction.
    ///
    /// Nothing is written when `mutate` returns an error.
    async fn mutate_user<R, F>(&self, user_id: &str, mutate: F) -> Result<R>
    where
        F: Fn(&mut User) -> Checked<R> + Clone + Send + Sync + 'static,
        R: Send + 'static,
    {
        let user_id = user_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let user_id = user_id.clone();
                let mutate = mutate.clone();
                Box::pin(async move {
                    let current: Option<User> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj()
                        .one(&user_id)
                        .await?;

                    let Some(mut user) = current else {
                        return Ok(Err(user_not_found(&user_id)));
                    };

                    let result = match mutate(&mut user) {
                        Ok(r) => r,
                        Err(e) => return Ok(Err(e)),
                    };

                    db.fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&user_id)
                        .object(&user)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(result))
                })
            })
            .await
            .map_err(db_error)?
    }

    /// Apply `decision` to a pending review inside a transaction, releasing
    /// its pending guard. With `product`, the product and its identifier
    /// guard are written in the same transaction.
    async fn decide_review(
        &self,
        review_id: &str,
        decision: ReviewDecision,
        product: Option<Product>,
    ) -> Result<ReviewRequest> {
        let review_id = review_id.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let review_id = review_id.clone();
                let decision = decision.clone();
                let product = product.clone();
                Box::pin(async move {
                    let current: Option<ReviewRequest> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::REVIEW_REQUESTS)
                        .obj()
                        .one(&review_id)
                        .await?;

                    let Some(mut review) = current else {
                        return Ok(Err(review_not_found(&review_id)));
                    };
                    if !review.is_pending() {
                        return Ok(Err(already_decided(&review)));
                    }

                    let pending_id = guard_id(&review.product_identifier);
                    let pending: Option<UniqueKey> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PENDING_REVIEWS)
                        .obj()
                        .one(&pending_id)
                        .await?;

                    if let Some(product) = &product {
                        let identifier_id = guard_id(&product.identifier);
                        let taken: Option<UniqueKey> = db
                            .fluent()
                            .select()
                            .by_id_in(collections::PRODUCT_IDENTIFIERS)
                            .obj()
                            .one(&identifier_id)
                            .await?;
                        if taken.is_some() {
                            return Ok(Err(identifier_taken(&product.identifier)));
                        }

                        let guard = UniqueKey {
                            key: product.identifier.clone(),
                            owner_id: product.id.clone(),
                        };
                        db.fluent()
                            .update()
                            .in_col(collections::PRODUCT_IDENTIFIERS)
                            .document_id(&identifier_id)
                            .object(&guard)
                            .add_to_transaction(transaction)?;
                        db.fluent()
                            .update()
                            .in_col(collections::PRODUCTS)
                            .document_id(&product.id)
                            .object(product)
                            .add_to_transaction(transaction)?;
                    }

                    decision.apply(&mut review);
                    db.fluent()
                        .update()
                        .in_col(collections::REVIEW_REQUESTS)
                        .document_id(&review_id)
                        .object(&review)
                        .add_to_transaction(transaction)?;

                    if pending.is_some_and(|g| g.owner_id == review_id) {
                        db.fluent()
                            .delete()
                            .from(collections::PENDING_REVIEWS)
                            .document_id(&pending_id)
                            .add_to_transaction(transaction)?;
                    }

                    Ok::<_, BackoffError<FirestoreError>>(Ok(review))
                })
            })
            .await
            .map_err(db_error)?
    }

    /// Count the notifications of `user_id`, optionally only unread ones.
    async fn count_notifications(&self, user_id: &str, unread_only: bool) -> Result<u64> {
        let counted: Vec<Counted> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(move |q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    unread_only.then(|| q.field("read").eq(false)).flatten(),
                ])
            })
            .aggregate(|a| a.fields([a.field("count").count()]))
            .obj()
            .query()
            .await
            .map_err(db_error)?;

        Ok(counted.first().map_or(0, |c| c.count.max(0) as u64))
    }
}

#[async_trait]
impl LoyaltyStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(db_error)
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn credit_points(&self, user_id: &str, points: i64) -> Result<Credit> {
        let credit = self
            .mutate_user(user_id, move |user| {
                let previous_tier = user.tier;
                user.points_balance += points;
                user.total_points_earned += points;
                user.tier = tier_for(user.total_points_earned);
                Ok(Credit {
                    previous_tier,
                    user: user.clone(),
                })
            })
            .await?;

        tracing::debug!(
            user_id,
            points,
            balance = credit.user.points_balance,
            tier = %credit.user.tier,
            "Points credited"
        );
        Ok(credit)
    }

    async fn spend_points(&self, user_id: &str, points: i64) -> Result<User> {
        self.mutate_user(user_id, move |user| {
            if user.points_balance < points {
                return Err(AppError::InsufficientBalance {
                    current_balance: user.points_balance,
                    requested: points,
                });
            }
            user.points_balance -= points;
            Ok(user.clone())
        })
        .await
    }

    async fn add_points(&self, user_id: &str, points: i64) -> Result<User> {
        self.mutate_user(user_id, move |user| {
            user.points_balance += points;
            Ok(user.clone())
        })
        .await
    }

    // ─── Store Operations ────────────────────────────────────────

    async fn get_or_create_store(&self, candidate: Store) -> Result<Store> {
        let client = self.get_client()?;

        let existing: Option<Store> = client
            .fluent()
            .select()
            .by_id_in(collections::STORES)
            .obj()
            .one(&candidate.fiscal_id)
            .await
            .map_err(db_error)?;
        if let Some(store) = existing {
            return Ok(store);
        }

        let inserted: std::result::Result<Store, FirestoreError> = client
            .fluent()
            .insert()
            .into(collections::STORES)
            .document_id(&candidate.fiscal_id)
            .object(&candidate)
            .execute()
            .await;

        match inserted {
            Ok(store) => {
                tracing::info!(
                    fiscal_id = %store.fiscal_id,
                    name = %store.name,
                    "Store created"
                );
                Ok(store)
            }
            // Lost the race to a concurrent scan of the same store
            Err(FirestoreError::DataConflictError(_)) => client
                .fluent()
                .select()
                .by_id_in(collections::STORES)
                .obj()
                .one(&candidate.fiscal_id)
                .await
                .map_err(db_error)?
                .ok_or_else(|| {
                    AppError::Database(format!("Store {} vanished", candidate.fiscal_id))
                }),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn set_store_location_if_missing(
        &self,
        fiscal_id: &str,
        location: &str,
    ) -> Result<Store> {
        let fiscal_id = fiscal_id.to_string();
        let location = location.to_string();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let fiscal_id = fiscal_id.clone();
                let location = location.clone();
                Box::pin(async move {
                    let current: Option<Store> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::STORES)
                        .obj()
                        .one(&fiscal_id)
                        .await?;

                    let Some(mut store) = current else {
                        return Ok(Err(AppError::NotFound(format!("Store {}", fiscal_id))));
                    };

                    if store.location.is_none() {
                        store.location = Some(location);
                        db.fluent()
                            .update()
                            .in_col(collections::STORES)
                            .document_id(&fiscal_id)
                            .object(&store)
                            .add_to_transaction(transaction)?;
                    }

                    Ok::<_, BackoffError<FirestoreError>>(Ok(store))
                })
            })
            .await
            .map_err(db_error)?
    }

    async fn list_stores(&self) -> Result<Vec<Store>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::STORES)
            .order_by([("created_at", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    // ─── Transaction Operations ──────────────────────────────────

    async fn find_transaction_by_hash(&self, receipt_hash: &str) -> Result<Option<Transaction>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TRANSACTIONS)
            .obj()
            .one(receipt_hash)
            .await
            .map_err(db_error)
    }

    async fn create_transaction(&self, transaction: &Transaction) -> Result<()> {
        let inserted: std::result::Result<Transaction, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::TRANSACTIONS)
            .document_id(&transaction.receipt_hash)
            .object(transaction)
            .execute()
            .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(FirestoreError::DataConflictError(_)) => Err(AppError::DuplicateReceipt),
            Err(e) => Err(db_error(e)),
        }
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TRANSACTIONS)
            .order_by([("scanned_at", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn list_transactions_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TRANSACTIONS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("scanned_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn award_unmatched_item(
        &self,
        receipt_hash: &str,
        item_name: &str,
        product: &Product,
    ) -> Result<Option<RetroactiveAward>> {
        let receipt_hash = receipt_hash.to_string();
        let item_name = item_name.to_string();
        let product = product.clone();

        self.get_client()?
            .run_transaction(|db, transaction| {
                let receipt_hash = receipt_hash.clone();
                let item_name = item_name.clone();
                let product = product.clone();
                Box::pin(async move {
                    let current: Option<Transaction> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::TRANSACTIONS)
                        .obj()
                        .one(&receipt_hash)
                        .await?;
                    let Some(mut txn) = current else {
                        return Ok(Err(AppError::NotFound(format!(
                            "Transaction {}",
                            receipt_hash
                        ))));
                    };

                    let owner: Option<User> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::USERS)
                        .obj()
                        .one(&txn.user_id)
                        .await?;
                    let Some(mut owner) = owner else {
                        return Ok(Err(user_not_found(&txn.user_id)));
                    };

                    let tier = owner.tier;
                    let Some(points) = txn.items.reclassify(&item_name, &product, |quantity| {
                        tier_adjusted_points(product.points_value, quantity, tier)
                    }) else {
                        return Ok(Ok(None));
                    };
                    txn.total_points += points;
                    owner.points_balance += points;
                    owner.total_points_earned += points;
                    owner.tier = tier_for(owner.total_points_earned);

                    db.fluent()
                        .update()
                        .in_col(collections::TRANSACTIONS)
                        .document_id(&receipt_hash)
                        .object(&txn)
                        .add_to_transaction(transaction)?;
                    db.fluent()
                        .update()
                        .in_col(collections::USERS)
                        .document_id(&owner.id)
                        .object(&owner)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok(Some(RetroactiveAward {
                        points,
                        credit: Credit {
                            previous_tier: tier,
                            user: owner,
                        },
                    })))
                })
            })
            .await
            .map_err(db_error)?
    }

    // ─── Product Operations ──────────────────────────────────────

    async fn list_known_products(&self) -> Result<Vec<Product>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PRODUCTS)
            .filter(|q| q.for_all([q.field("status").eq("KNOWN")]))
            .order_by([("created_at", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PRODUCTS)
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_error)
    }

    async fn find_product_by_identifier(&self, identifier: &str) -> Result<Option<Product>> {
        let products: Vec<Product> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PRODUCTS)
            .filter(|q| q.for_all([q.field("identifier").eq(identifier)]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(db_error)?;
        Ok(products.into_iter().next())
    }

    async fn create_product(&self, product: &Product) -> Result<()> {
        let client = self.get_client()?;

        let guard = UniqueKey {
            key: product.identifier.clone(),
            owner_id: product.id.clone(),
        };
        let claimed: std::result::Result<UniqueKey, FirestoreError> = client
            .fluent()
            .insert()
            .into(collections::PRODUCT_IDENTIFIERS)
            .document_id(guard_id(&product.identifier))
            .object(&guard)
            .execute()
            .await;

        match claimed {
            Ok(_) => {}
            Err(FirestoreError::DataConflictError(_)) => {
                return Err(identifier_taken(&product.identifier))
            }
            Err(e) => return Err(db_error(e)),
        }

        let _: () = client
            .fluent()
            .update()
            .in_col(collections::PRODUCTS)
            .document_id(&product.id)
            .object(product)
            .execute()
            .await
            .map_err(db_error)?;

        tracing::info!(
            product_id = %product.id,
            identifier = %product.identifier,
            "Product created"
        );
        Ok(())
    }

    // ─── Review Request Operations ───────────────────────────────

    async fn get_review(&self, review_id: &str) -> Result<Option<ReviewRequest>> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REVIEW_REQUESTS)
            .obj()
            .one(review_id)
            .await
            .map_err(db_error)
    }

    async fn submit_review(&self, review: ReviewRequest) -> Result<(ReviewRequest, bool)> {
        self.get_client()?
            .run_transaction(|db, transaction| {
                let review = review.clone();
                Box::pin(async move {
                    let pending_id = guard_id(&review.product_identifier);
                    let pending: Option<UniqueKey> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PENDING_REVIEWS)
                        .obj()
                        .one(&pending_id)
                        .await?;

                    if let Some(guard) = pending {
                        let existing: Option<ReviewRequest> = db
                            .fluent()
                            .select()
                            .by_id_in(collections::REVIEW_REQUESTS)
                            .obj()
                            .one(&guard.owner_id)
                            .await?;
                        return Ok(existing.map(|r| (r, false)).ok_or_else(|| {
                            AppError::Database(format!(
                                "Dangling pending review {}",
                                guard.owner_id
                            ))
                        }));
                    }

                    let guard = UniqueKey {
                        key: review.product_identifier.clone(),
                        owner_id: review.id.clone(),
                    };
                    db.fluent()
                        .update()
                        .in_col(collections::PENDING_REVIEWS)
                        .document_id(&pending_id)
                        .object(&guard)
                        .add_to_transaction(transaction)?;
                    db.fluent()
                        .update()
                        .in_col(collections::REVIEW_REQUESTS)
                        .document_id(&review.id)
                        .object(&review)
                        .add_to_transaction(transaction)?;

                    Ok::<_, BackoffError<FirestoreError>>(Ok((review, true)))
                })
            })
            .await
            .map_err(db_error)?
    }

    async fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRequest>> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::REVIEW_REQUESTS)
            .order_by([("created_at", FirestoreQueryDirection::Descending)]);

        let reviews = match status {
            Some(status) => {
                query
                    .filter(move |q| q.for_all([q.field("status").eq(status.as_str())]))
                    .obj::<ReviewRequest>()
                    .query()
                    .await
            }
            None => query.obj::<ReviewRequest>().query().await,
        };
        reviews.map_err(db_error)
    }

    async fn approve_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
        product: &Product,
    ) -> Result<ReviewRequest> {
        let decision = ReviewDecision::Approve {
            points_value: product.points_value,
            admin_notes,
        };
        let review = self
            .decide_review(review_id, decision, Some(product.clone()))
            .await?;

        tracing::info!(
            product_id = %product.id,
            identifier = %product.identifier,
            "Product created"
        );
        Ok(review)
    }

    async fn reject_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
    ) -> Result<ReviewRequest> {
        self.decide_review(review_id, ReviewDecision::Reject { admin_notes }, None)
            .await
    }

    // ─── Notification Operations ─────────────────────────────────

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::NOTIFICATIONS)
            .document_id(&notification.id)
            .object(notification)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<NotificationPage> {
        let notifications: Vec<Notification> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(db_error)?;
        let total = self.count_notifications(user_id, false).await?;

        Ok(NotificationPage {
            notifications,
            total,
        })
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64> {
        self.count_notifications(user_id, true).await
    }

    async fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<()> {
        let client = self.get_client()?;

        let current: Option<Notification> = client
            .fluent()
            .select()
            .by_id_in(collections::NOTIFICATIONS)
            .obj()
            .one(notification_id)
            .await
            .map_err(db_error)?;

        // Someone else's notification is indistinguishable from a missing one
        let mut notification = match current {
            Some(n) if n.user_id == user_id => n,
            _ => {
                return Err(AppError::NotFound(format!(
                    "Notification {}",
                    notification_id
                )))
            }
        };
        if notification.read {
            return Ok(());
        }
        notification.read = true;

        let _: () = client
            .fluent()
            .update()
            .in_col(collections::NOTIFICATIONS)
            .document_id(notification_id)
            .object(&notification)
            .execute()
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64> {
        let client = self.get_client()?;

        let unread: Vec<Notification> = client
            .fluent()
            .select()
            .from(collections::NOTIFICATIONS)
            .filter(|q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("read").eq(false),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(db_error)?;

        for chunk in unread.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for notification in chunk {
                let mut notification = notification.clone();
                notification.read = true;
                client
                    .fluent()
                    .update()
                    .in_col(collections::NOTIFICATIONS)
                    .document_id(&notification.id)
                    .object(&notification)
                    .add_to_transaction(&mut transaction)
                    .map_err(db_error)?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit notification update: {}", e))
            })?;
        }

        Ok(unread.len() as u64)
    }
}
