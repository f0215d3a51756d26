// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Review queue decisions and retroactive awards.

use receipt_loyalty::db::{LoyaltyStore, MemoryStore};
use receipt_loyalty::error::AppError;
use receipt_loyalty::models::{ReviewStatus, Tier};
use receipt_loyalty::services::receipt::receipt_hash;
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::{
    create_test_app, create_test_app_over, item, notifications_of, FakeReceipt, FlakyStore,
    TestApp,
};

/// Pending review for `name`, whoever submitted it.
async fn pending_review_id(app: &TestApp, name: &str) -> String {
    app.state
        .reviews
        .queue()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.product_name == name)
        .map(|r| r.id)
        .expect("pending review")
}

#[tokio::test]
async fn test_approval_awards_history_at_current_tier() {
    let app = create_test_app().await;
    app.seed_user("u1", 0, 0).await;
    let qr = app.fiscal.add(
        "INV-R1",
        FakeReceipt::maxi(vec![item("Kafa Grand 200g", 1.0, 320.0)]),
    );
    let scan = app.state.receipts.scan(&qr, "u1").await.unwrap();
    assert_eq!(scan.total_points, 0);

    // Promoted to Gold after the scan
    let mut user = app.user("u1").await;
    user.total_points_earned = 2500;
    user.tier = Tier::Gold;
    app.store.upsert_user(&user).await.unwrap();

    let review_id = pending_review_id(&app, "Kafa Grand 200g").await;
    let approval = app
        .state
        .reviews
        .approve(&review_id, 10, Some("Popular item".to_string()))
        .await
        .unwrap();

    assert_eq!(approval.retroactive_count, 1);
    assert_eq!(approval.review.status, ReviewStatus::Approved);
    assert_eq!(approval.review.points_value, Some(10));
    assert_eq!(approval.review.admin_notes.as_deref(), Some("Popular item"));
    assert_eq!(approval.product.identifier, "Kafa Grand 200g");
    assert_eq!(approval.product.points_value, 10);

    let txn = app
        .store
        .find_transaction_by_hash(&receipt_hash(&qr))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(txn.total_points, 15);
    assert!(txn.items.unmatched.is_empty());
    assert_eq!(txn.items.matched.len(), 1);
    assert_eq!(txn.items.matched[0].total_points, 15);
    assert_eq!(txn.items.matched[0].product_id, approval.product.id);

    let user = app.user("u1").await;
    assert_eq!(user.points_balance, 15);
    assert_eq!(user.total_points_earned, 2515);

    app.settle().await;
    let titles: Vec<_> = notifications_of(&app.store, "u1")
        .await
        .into_iter()
        .map(|n| n.title)
        .collect();
    assert!(titles.contains(&"Product Approved!".to_string()));
    assert!(titles.contains(&"Retroactive Points Earned!".to_string()));
}

#[tokio::test]
async fn test_loose_match_awards_first_item_per_transaction() {
    let app = create_test_app().await;
    app.seed_user("u1", 0, 0).await;
    app.seed_user("u2", 0, 0).await;

    let t1 = app.fiscal.add(
        "INV-R2",
        FakeReceipt::maxi(vec![
            item("Hleb", 1.0, 60.0),
            item("KAFA GRAND 200G", 1.0, 320.0),
            item("Kafa Nova", 1.0, 280.0),
        ]),
    );
    let t2 = app.fiscal.add(
        "INV-R3",
        FakeReceipt::maxi(vec![item("Nescafe Kafa Classic", 1.0, 410.0)]),
    );
    let t3 = app
        .fiscal
        .add("INV-R4", FakeReceipt::maxi(vec![item("Hleb", 1.0, 60.0)]));
    app.state.receipts.scan(&t1, "u1").await.unwrap();
    app.state.receipts.scan(&t2, "u2").await.unwrap();
    app.state.receipts.scan(&t3, "u2").await.unwrap();

    let submission = app.state.reviews.submit("Kafa", None, "u1").await.unwrap();
    assert!(submission.created);
    let approval = app
        .state
        .reviews
        .approve(&submission.review.id, 4, None)
        .await
        .unwrap();

    assert_eq!(approval.retroactive_count, 2);

    let first = app
        .store
        .find_transaction_by_hash(&receipt_hash(&t1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.total_points, 4);
    assert_eq!(first.items.matched.len(), 1);
    assert_eq!(first.items.matched[0].name, "KAFA GRAND 200G");
    let left: Vec<_> = first.items.unmatched.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(left, vec!["Hleb", "Kafa Nova"]);

    let untouched = app
        .store
        .find_transaction_by_hash(&receipt_hash(&t3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.total_points, 0);
    assert_eq!(untouched.items.unmatched.len(), 1);

    assert_eq!(app.user("u1").await.points_balance, 4);
    assert_eq!(app.user("u2").await.points_balance, 4);
}

#[tokio::test]
async fn test_retroactive_award_recomputes_tier() {
    let app = create_test_app().await;
    app.seed_user("u1", 495, 0).await;
    let qr = app.fiscal.add(
        "INV-R5",
        FakeReceipt::maxi(vec![item("Kafa Grand 200g", 2.0, 320.0)]),
    );
    app.state.receipts.scan(&qr, "u1").await.unwrap();

    let review_id = pending_review_id(&app, "Kafa Grand 200g").await;
    app.state.reviews.approve(&review_id, 5, None).await.unwrap();

    let user = app.user("u1").await;
    assert_eq!(user.total_points_earned, 505);
    assert_eq!(user.tier, Tier::Silver);
}

#[tokio::test]
async fn test_approved_product_matches_later_scans() {
    let app = create_test_app().await;
    app.seed_user("u1", 0, 0).await;
    let first = app.fiscal.add(
        "INV-R6",
        FakeReceipt::maxi(vec![item("Kafa Grand 200g", 1.0, 320.0)]),
    );
    app.state.receipts.scan(&first, "u1").await.unwrap();

    let review_id = pending_review_id(&app, "Kafa Grand 200g").await;
    let approval = app.state.reviews.approve(&review_id, 10, None).await.unwrap();

    let later = app.fiscal.add(
        "INV-R7",
        FakeReceipt::maxi(vec![item("Kafa Grand 200g", 1.0, 320.0)]),
    );
    let scan = app.state.receipts.scan(&later, "u1").await.unwrap();
    assert_eq!(scan.total_points, 10);
    assert_eq!(scan.matched[0].product_id, approval.product.id);
    assert!(app.state.reviews.queue().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_decisions_are_final() {
    let app = create_test_app().await;
    let submission = app.state.reviews.submit("Kafa", None, "u1").await.unwrap();
    let id = submission.review.id;

    app.state.reviews.approve(&id, 5, None).await.unwrap();

    let again = app.state.reviews.approve(&id, 5, None).await.unwrap_err();
    assert!(matches!(again, AppError::InvalidState(_)));
    let reject = app.state.reviews.reject(&id, None).await.unwrap_err();
    assert!(matches!(reject, AppError::InvalidState(_)));

    let all = app.state.reviews.all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, ReviewStatus::Approved);
}

#[tokio::test]
async fn test_reject_notifies_and_changes_nothing_else() {
    let app = create_test_app().await;
    app.seed_user("u1", 0, 0).await;
    let qr = app
        .fiscal
        .add("INV-R8", FakeReceipt::maxi(vec![item("Jogurt Balans", 1.0, 90.0)]));
    app.state.receipts.scan(&qr, "u1").await.unwrap();

    let review_id = pending_review_id(&app, "Jogurt Balans").await;
    let review = app
        .state
        .reviews
        .reject(&review_id, Some("Not a partner product".to_string()))
        .await
        .unwrap();

    assert_eq!(review.status, ReviewStatus::Rejected);
    assert!(app
        .store
        .find_product_by_identifier("Jogurt Balans")
        .await
        .unwrap()
        .is_none());
    let txn = app
        .store
        .find_transaction_by_hash(&receipt_hash(&qr))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(txn.items.unmatched.len(), 1);
    assert_eq!(app.user("u1").await.points_balance, 0);

    app.settle().await;
    let notifications = notifications_of(&app.store, "u1").await;
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Product Review Update");
    assert!(notifications[0].message.contains("Not a partner product"));

    // Once rejected, the product can be requested again
    let resubmitted = app
        .state
        .reviews
        .submit("Jogurt Balans", None, "u1")
        .await
        .unwrap();
    assert!(resubmitted.created);
}

#[tokio::test]
async fn test_approve_validation_and_missing_review() {
    let app = create_test_app().await;
    let submission = app.state.reviews.submit("Kafa", None, "u1").await.unwrap();

    let err = app
        .state
        .reviews
        .approve(&submission.review.id, 0, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = app.state.reviews.approve("nope", 5, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = app.state.reviews.reject("nope", None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert_eq!(app.state.reviews.queue().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_approve_existing_identifier_keeps_review_pending() {
    let app = create_test_app().await;
    let submission = app.state.reviews.submit("Hleb", None, "u1").await.unwrap();
    app.seed_product("Hleb", 3).await;

    let err = app
        .state
        .reviews
        .approve(&submission.review.id, 5, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidState(_)));
    let review = app
        .store
        .get_review(&submission.review.id)
        .await
        .unwrap()
        .unwrap();
    assert!(review.is_pending());
    let product = app
        .store
        .find_product_by_identifier("Hleb")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.points_value, 3);
}

#[tokio::test]
async fn test_failed_award_skips_only_that_transaction() {
    let store = MemoryStore::new();
    let flaky = FlakyStore::new(store.clone()).failing_awards_for("u2");
    let app = create_test_app_over(Duration::from_secs(1), store, Arc::new(flaky)).await;
    let mut hashes = Vec::new();
    for (n, user) in ["u1", "u2", "u3"].into_iter().enumerate() {
        app.seed_user(user, 0, 0).await;
        let qr = app.fiscal.add(
            &format!("INV-F{}", n),
            FakeReceipt::maxi(vec![item("Kafa Grand 200g", 1.0, 320.0)]),
        );
        app.state.receipts.scan(&qr, user).await.unwrap();
        hashes.push(receipt_hash(&qr));
    }

    let review_id = pending_review_id(&app, "Kafa Grand 200g").await;
    let approval = app.state.reviews.approve(&review_id, 10, None).await.unwrap();
    assert_eq!(approval.retroactive_count, 2);

    // The failed award left its transaction and owner as they were
    let skipped = app
        .store
        .find_transaction_by_hash(&hashes[1])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(skipped.total_points, 0);
    assert_eq!(skipped.items.unmatched.len(), 1);
    assert!(skipped.items.matched.is_empty());
    assert_eq!(app.user("u2").await.points_balance, 0);
    assert_eq!(app.user("u2").await.total_points_earned, 0);

    for (hash, user) in [(&hashes[0], "u1"), (&hashes[2], "u3")] {
        let txn = app.store.find_transaction_by_hash(hash).await.unwrap().unwrap();
        assert_eq!(txn.total_points, 10);
        assert!(txn.items.unmatched.is_empty());
        assert_eq!(app.user(user).await.points_balance, 10);
    }
}

#[tokio::test]
async fn test_missing_owner_is_skipped() {
    let app = create_test_app().await;
    app.seed_user("u1", 0, 0).await;
    let qr = app.fiscal.add(
        "INV-R9",
        FakeReceipt::maxi(vec![item("Kafa Grand 200g", 1.0, 320.0)]),
    );
    app.state.receipts.scan(&qr, "u1").await.unwrap();

    // Same receipt contents, owned by a user who no longer exists
    let mut orphan = app
        .store
        .find_transaction_by_hash(&receipt_hash(&qr))
        .await
        .unwrap()
        .unwrap();
    orphan.receipt_hash = "orphan-hash".to_string();
    orphan.user_id = "ghost".to_string();
    app.store.create_transaction(&orphan).await.unwrap();

    let review_id = pending_review_id(&app, "Kafa Grand 200g").await;
    let approval = app.state.reviews.approve(&review_id, 10, None).await.unwrap();
    assert_eq!(approval.retroactive_count, 1);

    let orphan = app
        .store
        .find_transaction_by_hash("orphan-hash")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orphan.total_points, 0);
    assert_eq!(orphan.items.unmatched.len(), 1);
    assert_eq!(app.user("u1").await.points_balance, 10);
}

#[tokio::test]
async fn test_submit_defaults_and_dedupe() {
    let app = create_test_app().await;

    let err = app.state.reviews.submit("   ", None, "u1").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let first = app
        .state
        .reviews
        .submit(" Kafa Grand ", Some(""), "u1")
        .await
        .unwrap();
    assert!(first.created);
    assert_eq!(first.review.product_name, "Kafa Grand");
    assert_eq!(first.review.product_identifier, "Kafa Grand");

    let second = app
        .state
        .reviews
        .submit("Kafa Grand", None, "u2")
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.review.id, first.review.id);

    let coded = app
        .state
        .reviews
        .submit("Kafa Grand", Some("8600123456789"), "u2")
        .await
        .unwrap();
    assert!(coded.created);
    assert_eq!(coded.review.product_identifier, "8600123456789");
}
