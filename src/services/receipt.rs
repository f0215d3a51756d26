// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Receipt scan processing.
//!
//! Handles the core workflow:
//! 1. Reject receipts that were already scanned
//! 2. Fetch the receipt from the fiscal service
//! 3. Resolve the store, backfilling its location
//! 4. Match items against the catalog
//! 5. Apply the user's tier multiplier
//! 6. Persist the transaction (the receipt hash is unique in storage)
//! 7. Credit points and notify
//! 8. Queue unmatched items for review

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::db::LoyaltyStore;
use crate::error::{AppError, Result};
use crate::models::{
    MatchedItem, ReceiptItems, ReviewRequest, Store, Transaction, UnmatchedItem,
};
use crate::services::fiscal::FiscalClient;
use crate::services::matcher::match_items;
use crate::services::notify::Notifier;
use crate::services::tiers::{apply_multiplier, multiplier_for};

/// Store name used when the receipt page names no known chain.
pub const UNKNOWN_STORE_NAME: &str = "Unknown Store";

/// Content address of a QR payload (hex SHA-256).
pub fn receipt_hash(qr_data: &str) -> String {
    hex::encode(Sha256::digest(qr_data.as_bytes()))
}

/// Outcome of a successful scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub transaction: Transaction,
    pub store: Store,
    pub matched: Vec<MatchedItem>,
    pub unmatched: Vec<UnmatchedItem>,
    /// Tier-adjusted points credited
    pub total_points: i64,
    pub multiplier: f64,
    pub tier_bonus_points: i64,
}

/// Turns scanned QR payloads into transactions and points.
pub struct ReceiptProcessor {
    store: Arc<dyn LoyaltyStore>,
    fiscal: FiscalClient,
    notifier: Notifier,
}

impl ReceiptProcessor {
    pub fn new(store: Arc<dyn LoyaltyStore>, fiscal: FiscalClient, notifier: Notifier) -> Self {
        Self {
            store,
            fiscal,
            notifier,
        }
    }

    /// Process one scan for `user_id`.
    pub async fn scan(&self, qr_data: &str, user_id: &str) -> Result<ScanResult> {
        if qr_data.trim().is_empty() {
            return Err(AppError::Validation("QR data is required".to_string()));
        }

        // 1. Fast-path duplicate check; storage uniqueness is authoritative
        let hash = receipt_hash(qr_data);
        if self.store.find_transaction_by_hash(&hash).await?.is_some() {
            tracing::info!(user_id, receipt_hash = %hash, "Duplicate receipt rejected");
            return Err(AppError::DuplicateReceipt);
        }

        // 2. Fetch from the fiscal service
        let receipt = self.fiscal.fetch(qr_data).await?;
        tracing::info!(
            user_id,
            receipt_hash = %hash,
            fiscal_id = %receipt.store_fiscal_id,
            items = receipt.items.len(),
            "Receipt fetched"
        );

        // 3. Resolve the store
        let store_name = if receipt.store_name.is_empty() {
            UNKNOWN_STORE_NAME.to_string()
        } else {
            receipt.store_name.clone()
        };
        let mut store = self
            .store
            .get_or_create_store(Store::new(
                store_name,
                receipt.store_fiscal_id.clone(),
                receipt.store_location.clone(),
            ))
            .await?;
        if let (None, Some(location)) = (&store.location, &receipt.store_location) {
            store = self
                .store
                .set_store_location_if_missing(&store.fiscal_id, location)
                .await?;
        }

        // 4. Match against the current catalog
        let catalog = self.store.list_known_products().await?;
        let outcome = match_items(receipt.items, &catalog);

        // 5. Tier multiplier
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
        let multiplier = multiplier_for(user.tier);
        let total_points = apply_multiplier(outcome.total_points, multiplier);
        let tier_bonus_points = total_points - outcome.total_points;

        // 6. Persist
        let transaction = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            store_id: store.id.clone(),
            receipt_hash: hash.clone(),
            total_points,
            items: ReceiptItems {
                matched: outcome.matched.clone(),
                unmatched: outcome.unmatched.clone(),
            },
            scanned_at: Utc::now(),
        };
        self.store.create_transaction(&transaction).await?;

        // 7. Credit and notify
        if total_points > 0 {
            let credit = self.store.credit_points(user_id, total_points).await?;
            self.notifier
                .points_earned(user_id, total_points, &store.name, tier_bonus_points);
            if credit.tier_changed() {
                tracing::info!(
                    user_id,
                    from = %credit.previous_tier,
                    to = %credit.user.tier,
                    "Tier upgraded"
                );
                self.notifier
                    .tier_upgrade(user_id, credit.previous_tier, credit.user.tier);
            }
        }

        // 8. Queue unmatched items for review
        for item in outcome.unmatched.iter().filter(|item| !item.name.is_empty()) {
            let request = ReviewRequest::pending(&item.name, &item.name, user_id);
            match self.store.submit_review(request).await {
                Ok((review, true)) => {
                    tracing::debug!(review_id = %review.id, item = %item.name, "Review requested")
                }
                Ok((_, false)) => {}
                // The scan is already committed; a missing review is recoverable
                Err(e) => tracing::warn!(
                    error = %e,
                    item = %item.name,
                    "Failed to queue review request"
                ),
            }
        }

        tracing::info!(
            user_id,
            receipt_hash = %hash,
            matched = outcome.matched.len(),
            unmatched = outcome.unmatched.len(),
            total_points,
            "Receipt processed"
        );

        Ok(ScanResult {
            transaction,
            store,
            matched: outcome.matched,
            unmatched: outcome.unmatched,
            total_points,
            multiplier,
            tier_bonus_points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_hash_is_content_addressed() {
        let a = receipt_hash("https://suf.purs.gov.rs/v/?vl=abc");
        assert_eq!(a, receipt_hash("https://suf.purs.gov.rs/v/?vl=abc"));
        assert_ne!(a, receipt_hash("https://suf.purs.gov.rs/v/?vl=abd"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_receipt_hash_known_value() {
        assert_eq!(
            receipt_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
