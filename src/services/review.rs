// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Product review queue and retroactive point awards.
//!
//! Approving a review adds the product to the catalog and then credits every
//! historical receipt that listed it as unmatched.

use std::sync::Arc;

use serde::Serialize;

use crate::db::LoyaltyStore;
use crate::error::{AppError, Result};
use crate::models::{Product, ReviewRequest, ReviewStatus, UnmatchedItem};
use crate::services::notify::Notifier;

/// Result of approving a review.
#[derive(Debug, Clone, Serialize)]
pub struct Approval {
    pub review: ReviewRequest,
    pub product: Product,
    /// Number of transactions that received retroactive points
    pub retroactive_count: usize,
}

/// Result of submitting a review request.
#[derive(Debug, Clone, Serialize)]
pub struct Submission {
    pub review: ReviewRequest,
    /// `false` when an existing pending request was returned
    pub created: bool,
}

/// Whether an unmatched receipt item refers to the reviewed product.
///
/// Deliberately loose: equality with the name or identifier, or containment
/// either way with the name, all case-insensitive.
pub fn loosely_matches(item_name: &str, review: &ReviewRequest) -> bool {
    if item_name.is_empty() {
        return false;
    }
    let item = item_name.to_lowercase();
    let name = review.product_name.to_lowercase();
    let identifier = review.product_identifier.to_lowercase();
    item == name || item == identifier || item.contains(&name) || name.contains(&item)
}

fn first_loose_match<'a>(
    unmatched: &'a [UnmatchedItem],
    review: &ReviewRequest,
) -> Option<&'a UnmatchedItem> {
    unmatched.iter().find(|u| loosely_matches(&u.name, review))
}

pub struct ReviewService {
    store: Arc<dyn LoyaltyStore>,
    notifier: Notifier,
}

impl ReviewService {
    pub fn new(store: Arc<dyn LoyaltyStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Ask for a product to be added to the catalog.
    pub async fn submit(
        &self,
        product_name: &str,
        product_identifier: Option<&str>,
        user_id: &str,
    ) -> Result<Submission> {
        let product_name = product_name.trim();
        if product_name.is_empty() {
            return Err(AppError::Validation("Product name is required".to_string()));
        }
        let identifier = product_identifier
            .map(str::trim)
            .filter(|i| !i.is_empty())
            .unwrap_or(product_name);

        let (review, created) = self
            .store
            .submit_review(ReviewRequest::pending(product_name, identifier, user_id))
            .await?;

        tracing::info!(
            review_id = %review.id,
            user_id,
            created,
            "Review request submitted"
        );
        Ok(Submission { review, created })
    }

    /// Pending reviews, newest first.
    pub async fn queue(&self) -> Result<Vec<ReviewRequest>> {
        self.store.list_reviews(Some(ReviewStatus::Pending)).await
    }

    /// All reviews, newest first.
    pub async fn all(&self) -> Result<Vec<ReviewRequest>> {
        self.store.list_reviews(None).await
    }

    /// Approve a pending review and award points retroactively.
    pub async fn approve(
        &self,
        review_id: &str,
        points_value: i64,
        admin_notes: Option<String>,
    ) -> Result<Approval> {
        if points_value <= 0 {
            return Err(AppError::Validation(
                "Points value is required and must be positive".to_string(),
            ));
        }

        let pending = self
            .store
            .get_review(review_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Review request {}", review_id)))?;
        if !pending.is_pending() {
            return Err(AppError::InvalidState("Review already processed".to_string()));
        }
        if self
            .store
            .find_product_by_identifier(&pending.product_identifier)
            .await?
            .is_some()
        {
            return Err(AppError::InvalidState(format!(
                "Product identifier {} already exists",
                pending.product_identifier
            )));
        }

        // The decision and the catalog entry commit together, and only one
        // concurrent decision can win
        let product = Product::known(
            pending.product_name.clone(),
            pending.product_identifier.clone(),
            points_value,
        );
        let review = self
            .store
            .approve_review(review_id, admin_notes, &product)
            .await?;
        self.notifier
            .review_approved(&review.submitted_by_user_id, &product);

        let retroactive_count = self.award_retroactively(&review, &product).await?;

        tracing::info!(
            review_id,
            product_id = %product.id,
            retroactive_count,
            "Review approved"
        );

        Ok(Approval {
            review,
            product,
            retroactive_count,
        })
    }

    /// Credit every historical transaction whose unmatched items include the
    /// newly approved product (first loose match per transaction).
    ///
    /// Each award is atomic. A failed award is logged and skipped so one bad
    /// transaction does not hold back the rest.
    async fn award_retroactively(&self, review: &ReviewRequest, product: &Product) -> Result<usize> {
        let mut count = 0;

        for txn in self.store.list_transactions().await? {
            let Some(item) = first_loose_match(&txn.items.unmatched, review) else {
                continue;
            };

            let award = match self
                .store
                .award_unmatched_item(&txn.receipt_hash, &item.name, product)
                .await
            {
                Ok(Some(award)) => award,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        receipt_hash = %txn.receipt_hash,
                        user_id = %txn.user_id,
                        error = %e,
                        "Retroactive award failed, skipping transaction"
                    );
                    continue;
                }
            };

            self.notifier
                .retroactive_points(&txn.user_id, award.points, &review.product_name);
            if award.credit.tier_changed() {
                self.notifier.tier_upgrade(
                    &txn.user_id,
                    award.credit.previous_tier,
                    award.credit.user.tier,
                );
            }

            tracing::info!(
                user_id = %txn.user_id,
                receipt_hash = %txn.receipt_hash,
                points = award.points,
                "Retroactive points awarded"
            );
            count += 1;
        }

        Ok(count)
    }

    /// Reject a pending review. Nothing else changes.
    pub async fn reject(&self, review_id: &str, admin_notes: Option<String>) -> Result<ReviewRequest> {
        let review = self
            .store
            .reject_review(review_id, admin_notes)
            .await?;

        self.notifier.review_rejected(
            &review.submitted_by_user_id,
            &review.product_name,
            review.admin_notes.as_deref(),
        );
        tracing::info!(review_id, "Review rejected");
        Ok(review)
    }
}
