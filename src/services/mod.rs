// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod analytics;
pub mod fiscal;
pub mod matcher;
pub mod normalize;
pub mod notifications;
pub mod notify;
pub mod points;
pub mod receipt;
pub mod review;
pub mod tiers;

pub use analytics::AnalyticsService;
pub use fiscal::{FiscalClient, FiscalDirectory, ReceiptData};
pub use matcher::{MatchOutcome, ProductMatcher};
pub use notifications::NotificationService;
pub use notify::Notifier;
pub use points::PointsService;
pub use receipt::{ReceiptProcessor, ScanResult};
pub use review::ReviewService;
