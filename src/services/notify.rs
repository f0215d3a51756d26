// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fire-and-forget user notifications.
//!
//! [`Notifier::notify`] only enqueues; a background worker persists each
//! notification through the store. Callers never wait on delivery and never
//! see its failures.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::db::LoyaltyStore;
use crate::models::{Notification, NotificationKind, Product, Tier};
use crate::services::tiers::multiplier_for;

enum Message {
    Deliver(Notification),
    Flush(oneshot::Sender<()>),
}

/// Handle to the notification queue. Clones share one worker.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Message>,
}

impl Notifier {
    /// Spawn the delivery worker. Must be called within a Tokio runtime.
    pub fn spawn(store: Arc<dyn LoyaltyStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(store, rx));
        Self { tx }
    }

    /// Queue a notification for delivery.
    pub fn notify(&self, notification: Notification) {
        let user_id = notification.user_id.clone();
        if self.tx.send(Message::Deliver(notification)).is_err() {
            tracing::warn!(user_id = %user_id, "Notification queue closed, dropping notification");
        }
    }

    /// Wait until everything queued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn points_earned(&self, user_id: &str, points: i64, store_name: &str, tier_bonus: i64) {
        let bonus = if tier_bonus > 0 {
            format!(" (includes {} tier bonus)", tier_bonus)
        } else {
            String::new()
        };
        self.notify(Notification::new(
            user_id,
            NotificationKind::PointsEarned,
            "Points Earned!",
            format!("You earned {} points at {}!{}", points, store_name, bonus),
            Some(serde_json::json!({
                "points": points,
                "storeName": store_name,
                "tierBonus": tier_bonus,
            })),
        ));
    }

    pub fn tier_upgrade(&self, user_id: &str, old_tier: Tier, new_tier: Tier) {
        let multiplier = multiplier_for(new_tier);
        self.notify(Notification::new(
            user_id,
            NotificationKind::TierUpgrade,
            "Tier Upgrade!",
            format!(
                "Congratulations! You've been promoted to {} tier! You now earn {}x points on every scan.",
                new_tier, multiplier
            ),
            Some(serde_json::json!({
                "oldTier": old_tier,
                "newTier": new_tier,
                "multiplier": multiplier,
            })),
        ));
    }

    pub fn review_approved(&self, user_id: &str, product: &Product) {
        self.notify(Notification::new(
            user_id,
            NotificationKind::ReviewApproved,
            "Product Approved!",
            format!(
                "\"{}\" has been approved and is now worth {} points per item.",
                product.name, product.points_value
            ),
            Some(serde_json::json!({
                "productId": product.id,
                "pointsValue": product.points_value,
            })),
        ));
    }

    pub fn review_rejected(&self, user_id: &str, product_name: &str, admin_notes: Option<&str>) {
        let note = admin_notes
            .filter(|n| !n.is_empty())
            .map(|n| format!(" Note: {}", n))
            .unwrap_or_default();
        self.notify(Notification::new(
            user_id,
            NotificationKind::ReviewRejected,
            "Product Review Update",
            format!("\"{}\" was not approved.{}", product_name, note),
            Some(serde_json::json!({
                "productName": product_name,
                "adminNotes": admin_notes,
            })),
        ));
    }

    pub fn retroactive_points(&self, user_id: &str, points: i64, product_name: &str) {
        self.notify(Notification::new(
            user_id,
            NotificationKind::PointsEarned,
            "Retroactive Points Earned!",
            format!(
                "You earned {} points for \"{}\" from a previous receipt.",
                points, product_name
            ),
            Some(serde_json::json!({
                "points": points,
                "productName": product_name,
            })),
        ));
    }
}

async fn run_worker(store: Arc<dyn LoyaltyStore>, mut rx: mpsc::UnboundedReceiver<Message>) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Deliver(notification) => {
                if let Err(e) = store.insert_notification(&notification).await {
                    tracing::warn!(
                        error = %e,
                        user_id = %notification.user_id,
                        kind = ?notification.kind,
                        "Failed to deliver notification"
                    );
                }
            }
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Notification worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FirestoreDb, MemoryStore};

    #[tokio::test]
    async fn test_notifications_are_persisted_after_flush() {
        let store = Arc::new(MemoryStore::new());
        let notifier = Notifier::spawn(store.clone());

        notifier.points_earned("u1", 15, "Maxi", 5);
        notifier.tier_upgrade("u1", Tier::Bronze, Tier::Silver);
        notifier.flush().await;

        let delivered = store
            .list_notifications("u1", 0, 100)
            .await
            .unwrap()
            .notifications;
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().any(|n| n.title == "Tier Upgrade!"));
        assert!(delivered
            .iter()
            .any(|n| n.message == "You earned 15 points at Maxi! (includes 5 tier bonus)"));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_swallowed() {
        // Offline Firestore fails every write
        let notifier = Notifier::spawn(Arc::new(FirestoreDb::new_mock()));
        notifier.review_rejected("u1", "Kafa", None);
        notifier.flush().await;
        notifier.review_approved("u1", &Product::known("Kafa", "KAFA", 10));
        notifier.flush().await;
    }
}
