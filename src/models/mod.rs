// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod notification;
pub mod product;
pub mod review;
pub mod store;
pub mod transaction;
pub mod user;

pub use notification::{Notification, NotificationKind};
pub use product::{Product, ProductStatus};
pub use review::{ReviewDecision, ReviewRequest, ReviewStatus};
pub use store::Store;
pub use transaction::{MatchedItem, ReceiptItem, ReceiptItems, Transaction, UnmatchedItem};
pub use user::{Role, Tier, User};
