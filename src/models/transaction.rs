// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Receipt scan records and their item snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Product;

/// A line item as reported by the fiscal service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    /// Units bought; fractional for weighed goods
    pub quantity: f64,
    pub unit_price: f64,
    /// Line total
    pub price: f64,
    #[serde(default)]
    pub gtin: String,
    #[serde(default)]
    pub label: String,
}

impl ReceiptItem {
    /// Item with quantity 1 and no product codes.
    pub fn new(name: impl Into<String>, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            quantity: 1.0,
            unit_price,
            price: unit_price,
            gtin: String::new(),
            label: String::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self.price = self.unit_price * quantity;
        self
    }
}

/// A receipt item linked to a catalog product at match time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedItem {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub price: f64,
    #[serde(default)]
    pub gtin: String,
    #[serde(default)]
    pub label: String,
    pub product_id: String,
    pub product_name: String,
    /// Per-unit points copied from the product
    pub points_value: i64,
    pub total_points: i64,
}

/// A receipt item with no catalog match (yet).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedItem {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub price: f64,
    #[serde(default)]
    pub gtin: String,
    #[serde(default)]
    pub label: String,
    /// Always `None`; kept so both item kinds share one shape
    pub product_id: Option<String>,
    pub points_value: i64,
}

impl MatchedItem {
    /// Link `item` to `product`, earning `points_value * quantity` (rounded).
    pub fn from_item(item: ReceiptItem, product: &Product) -> Self {
        let total_points = (product.points_value as f64 * item.quantity).round() as i64;
        Self {
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            price: item.price,
            gtin: item.gtin,
            label: item.label,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            points_value: product.points_value,
            total_points,
        }
    }
}

impl UnmatchedItem {
    pub fn from_item(item: ReceiptItem) -> Self {
        Self {
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            price: item.price,
            gtin: item.gtin,
            label: item.label,
            product_id: None,
            points_value: 0,
        }
    }

    /// Reclassify as matched with an already computed point total.
    pub fn into_matched(self, product: &Product, total_points: i64) -> MatchedItem {
        MatchedItem {
            name: self.name,
            quantity: self.quantity,
            unit_price: self.unit_price,
            price: self.price,
            gtin: self.gtin,
            label: self.label,
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            points_value: product.points_value,
            total_points,
        }
    }
}

/// Item snapshot of a receipt, split by match outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptItems {
    #[serde(default)]
    pub matched: Vec<MatchedItem>,
    #[serde(default)]
    pub unmatched: Vec<UnmatchedItem>,
}

impl ReceiptItems {
    /// Move the first unmatched item named exactly `item_name` to `matched`,
    /// pricing it with `points_for(quantity)`.
    ///
    /// Returns the points credited, or `None` if no such item remains.
    pub fn reclassify(
        &mut self,
        item_name: &str,
        product: &Product,
        points_for: impl FnOnce(f64) -> i64,
    ) -> Option<i64> {
        let pos = self.unmatched.iter().position(|u| u.name == item_name)?;
        let item = self.unmatched.remove(pos);
        let total_points = points_for(item.quantity);
        self.matched.push(item.into_matched(product, total_points));
        Some(total_points)
    }
}

/// A receipt scan event stored in Firestore.
///
/// Document ID is the receipt hash, which makes duplicate scans collide at
/// the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub store_id: String,
    /// SHA-256 of the raw QR payload (unique)
    pub receipt_hash: String,
    /// Tier-adjusted points credited for this receipt
    pub total_points: i64,
    pub items: ReceiptItems,
    pub scanned_at: DateTime<Utc>,
}
