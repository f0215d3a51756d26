// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reading and acknowledging a user's notifications.

use std::sync::Arc;

use serde::Serialize;

use crate::db::LoyaltyStore;
use crate::error::Result;
use crate::models::Notification;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of notifications, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u64,
}

pub struct NotificationService {
    store: Arc<dyn LoyaltyStore>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn LoyaltyStore>) -> Self {
        Self { store }
    }

    /// Page numbers start at 1. Out-of-range values are clamped.
    pub async fn page(
        &self,
        user_id: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<NotificationList> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).saturating_mul(limit);

        let result = self
            .store
            .list_notifications(user_id, offset, limit)
            .await?;

        Ok(NotificationList {
            notifications: result.notifications,
            total_pages: result.total.div_ceil(u64::from(limit)),
            total: result.total,
            page,
        })
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<u64> {
        self.store.count_unread_notifications(user_id).await
    }

    /// Fails with `NotFound` for another user's notification.
    pub async fn mark_read(&self, user_id: &str, notification_id: &str) -> Result<()> {
        self.store
            .mark_notification_read(user_id, notification_id)
            .await
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let updated = self.store.mark_all_notifications_read(user_id).await?;
        tracing::debug!(user_id, updated, "Notifications marked read");
        Ok(updated)
    }
}
