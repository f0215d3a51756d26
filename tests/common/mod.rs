// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use dashmap::DashMap;
use receipt_loyalty::config::Config;
use receipt_loyalty::db::{
    Credit, FirestoreDb, LoyaltyStore, MemoryStore, NotificationPage, RetroactiveAward,
};
use receipt_loyalty::error::{AppError, Result};
use receipt_loyalty::middleware::auth::create_jwt;
use receipt_loyalty::models::{
    Notification, Product, ReviewRequest, ReviewStatus, Role, Store, Transaction, User,
};
use receipt_loyalty::routes::create_router;
use receipt_loyalty::services::tiers::tier_for;
use receipt_loyalty::services::FiscalDirectory;
use receipt_loyalty::AppState;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Unique suffix for ids, so emulator runs don't collide.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

// ═══════════════════════════════════════════════════════════════════════════
// FAKE FISCAL SERVICE
// ═══════════════════════════════════════════════════════════════════════════

/// How the fake specifications endpoint answers for one invoice.
#[allow(dead_code)]
#[derive(Clone)]
pub enum Items {
    /// `success: true` with these raw item objects
    Json(Vec<serde_json::Value>),
    /// `success: false`
    Failure,
    /// HTTP 500
    ServerError,
    /// 200 with a body that is not JSON
    Garbage,
}

/// One receipt known to the fake service.
#[derive(Clone)]
pub struct FakeReceipt {
    /// Free text placed on the viewer page (chain name, PIB, address)
    pub page_body: String,
    pub items: Items,
    /// Delay before the viewer page is served
    pub page_delay: Option<Duration>,
    /// Omit the invoice number and token from the page
    pub broken_page: bool,
}

#[allow(dead_code)]
impl FakeReceipt {
    /// MAXI store in Beograd with the given items.
    pub fn maxi(items: Vec<serde_json::Value>) -> Self {
        Self::with_body("MAXI d.o.o. PIB: 100200300 Bulevar 1, Beograd", items)
    }

    pub fn with_body(page_body: &str, items: Vec<serde_json::Value>) -> Self {
        Self {
            page_body: page_body.to_string(),
            items: Items::Json(items),
            page_delay: None,
            broken_page: false,
        }
    }

    pub fn items(mut self, items: Items) -> Self {
        self.items = items;
        self
    }
}

/// Raw item in the specifications endpoint's JSON shape.
#[allow(dead_code)]
pub fn item(name: &str, quantity: f64, unit_price: f64) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "quantity": quantity,
        "unitPrice": unit_price,
        "total": quantity * unit_price,
    })
}

/// In-process stand-in for the fiscal authority.
///
/// `GET /v/{invoice}` serves the viewer page, `POST /specifications` the items.
#[derive(Clone)]
pub struct FakeFiscal {
    pub base_url: String,
    receipts: Arc<DashMap<String, FakeReceipt>>,
}

#[allow(dead_code)]
impl FakeFiscal {
    pub async fn start() -> Self {
        let receipts: Arc<DashMap<String, FakeReceipt>> = Arc::new(DashMap::new());

        let app = Router::new()
            .route("/v/{invoice}", get(viewer_page))
            .route("/specifications", post(specifications))
            .with_state(receipts.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake fiscal service");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake fiscal service");
        });

        Self {
            base_url: format!("http://{}", addr),
            receipts,
        }
    }

    /// Register a receipt and return the QR payload that points at it.
    pub fn add(&self, invoice: &str, receipt: FakeReceipt) -> String {
        self.receipts.insert(invoice.to_string(), receipt);
        self.qr(invoice)
    }

    /// QR payload for `invoice`, registered or not.
    pub fn qr(&self, invoice: &str) -> String {
        format!("{}/v/{}", self.base_url, invoice)
    }

    pub fn specifications_url(&self) -> String {
        format!("{}/specifications", self.base_url)
    }
}

type Receipts = Arc<DashMap<String, FakeReceipt>>;

async fn viewer_page(State(receipts): State<Receipts>, Path(invoice): Path<String>) -> Response {
    let Some(receipt) = receipts.get(&invoice).map(|r| r.clone()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(delay) = receipt.page_delay {
        tokio::time::sleep(delay).await;
    }
    let script = if receipt.broken_page {
        String::new()
    } else {
        format!(
            "viewModel.InvoiceNumber('{}'); viewModel.Token('tok-{}');",
            invoice, invoice
        )
    };
    Html(format!(
        "<html><body><div>{}</div><script>{}</script></body></html>",
        receipt.page_body, script
    ))
    .into_response()
}

#[derive(Deserialize)]
struct SpecificationsForm {
    #[serde(rename = "invoiceNumber")]
    invoice_number: String,
    token: String,
}

async fn specifications(
    State(receipts): State<Receipts>,
    Form(form): Form<SpecificationsForm>,
) -> Response {
    let receipt = receipts.get(&form.invoice_number).map(|r| r.clone());
    let items = match receipt {
        Some(r) if form.token == format!("tok-{}", form.invoice_number) => r.items,
        _ => Items::Failure,
    };
    match items {
        Items::Json(items) => {
            axum::Json(serde_json::json!({ "success": true, "items": items })).into_response()
        }
        Items::Failure => axum::Json(serde_json::json!({ "success": false })).into_response(),
        Items::ServerError => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Items::Garbage => "<html>maintenance</html>".into_response(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// APP + FIXTURES
// ═══════════════════════════════════════════════════════════════════════════

/// App wired to an in-memory store and a fake fiscal service.
pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub fiscal: FakeFiscal,
}

/// Create a test app with a one second fiscal timeout.
#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    create_test_app_with_timeout(Duration::from_secs(1)).await
}

#[allow(dead_code)]
pub async fn create_test_app_with_timeout(timeout: Duration) -> TestApp {
    let store = MemoryStore::new();
    create_test_app_over(timeout, store.clone(), Arc::new(store)).await
}

/// Create a test app whose services go through `shared`, a wrapper around
/// `store`. `TestApp::store` reads the underlying data directly.
#[allow(dead_code)]
pub async fn create_test_app_over(
    timeout: Duration,
    store: MemoryStore,
    shared: Arc<dyn LoyaltyStore>,
) -> TestApp {
    let fiscal = FakeFiscal::start().await;
    let config = Config {
        fiscal_specifications_url: fiscal.specifications_url(),
        fiscal_timeout: timeout,
        ..Config::default()
    };

    let state = Arc::new(
        AppState::new(config, shared, FiscalDirectory::default()).expect("app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        fiscal,
    }
}

#[allow(dead_code)]
impl TestApp {
    /// Seed a user whose lifetime total is `total_earned` (tier derived).
    pub async fn seed_user(&self, id: &str, total_earned: i64, balance: i64) -> User {
        let mut user = User::new(id, format!("Test {}", id), format!("{}@example.com", id));
        user.total_points_earned = total_earned;
        user.points_balance = balance;
        user.tier = tier_for(total_earned);
        self.store.upsert_user(&user).await.expect("seed user");
        user
    }

    pub async fn seed_product(&self, name: &str, points: i64) -> Product {
        let product = Product::known(name, name, points);
        self.store
            .create_product(&product)
            .await
            .expect("seed product");
        product
    }

    pub async fn user(&self, id: &str) -> User {
        self.store
            .get_user(id)
            .await
            .expect("get user")
            .expect("user exists")
    }

    /// Wait for queued notifications to be stored.
    pub async fn settle(&self) {
        self.state.notifier.flush().await;
    }

    pub fn token(&self, user_id: &str) -> String {
        create_test_jwt(user_id, Role::User, &self.state.config.jwt_signing_key)
    }

    pub fn admin_token(&self, user_id: &str) -> String {
        create_test_jwt(user_id, Role::Admin, &self.state.config.jwt_signing_key)
    }
}

/// Create a session token for tests.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, role: Role, signing_key: &[u8]) -> String {
    create_jwt(user_id, role, signing_key).expect("create jwt")
}

// ═══════════════════════════════════════════════════════════════════════════
// FAULTY STORE
// ═══════════════════════════════════════════════════════════════════════════

/// `MemoryStore` wrapper that fails retroactive awards for one user and
/// records how many review submissions overlap.
pub struct FlakyStore {
    inner: MemoryStore,
    fail_awards_for: Option<String>,
    review_delay: Duration,
    reviews_in_flight: AtomicUsize,
    max_reviews_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_awards_for: None,
            review_delay: Duration::ZERO,
            reviews_in_flight: AtomicUsize::new(0),
            max_reviews_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every award on a transaction owned by `user_id` fails.
    pub fn failing_awards_for(mut self, user_id: &str) -> Self {
        self.fail_awards_for = Some(user_id.to_string());
        self
    }

    /// Hold each review submission open for `delay`.
    pub fn slow_reviews(mut self, delay: Duration) -> Self {
        self.review_delay = delay;
        self
    }

    pub fn max_reviews_in_flight(&self) -> usize {
        self.max_reviews_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoyaltyStore for FlakyStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.inner.get_user(user_id).await
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        self.inner.upsert_user(user).await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        self.inner.list_users().await
    }

    async fn credit_points(&self, user_id: &str, points: i64) -> Result<Credit> {
        self.inner.credit_points(user_id, points).await
    }

    async fn spend_points(&self, user_id: &str, points: i64) -> Result<User> {
        self.inner.spend_points(user_id, points).await
    }

    async fn add_points(&self, user_id: &str, points: i64) -> Result<User> {
        self.inner.add_points(user_id, points).await
    }

    async fn get_or_create_store(&self, candidate: Store) -> Result<Store> {
        self.inner.get_or_create_store(candidate).await
    }

    async fn set_store_location_if_missing(
        &self,
        fiscal_id: &str,
        location: &str,
    ) -> Result<Store> {
        self.inner
            .set_store_location_if_missing(fiscal_id, location)
            .await
    }

    async fn list_stores(&self) -> Result<Vec<Store>> {
        self.inner.list_stores().await
    }

    async fn find_transaction_by_hash(&self, receipt_hash: &str) -> Result<Option<Transaction>> {
        self.inner.find_transaction_by_hash(receipt_hash).await
    }

    async fn create_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.inner.create_transaction(transaction).await
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.inner.list_transactions().await
    }

    async fn list_transactions_for_user(&self, user_id: &str) -> Result<Vec<Transaction>> {
        self.inner.list_transactions_for_user(user_id).await
    }

    async fn award_unmatched_item(
        &self,
        receipt_hash: &str,
        item_name: &str,
        product: &Product,
    ) -> Result<Option<RetroactiveAward>> {
        if let Some(user_id) = &self.fail_awards_for {
            let owner = self
                .inner
                .find_transaction_by_hash(receipt_hash)
                .await?
                .map(|t| t.user_id);
            if owner.as_ref() == Some(user_id) {
                return Err(AppError::Database("transient".to_string()));
            }
        }
        self.inner
            .award_unmatched_item(receipt_hash, item_name, product)
            .await
    }

    async fn list_known_products(&self) -> Result<Vec<Product>> {
        self.inner.list_known_products().await
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        self.inner.list_products().await
    }

    async fn find_product_by_identifier(&self, identifier: &str) -> Result<Option<Product>> {
        self.inner.find_product_by_identifier(identifier).await
    }

    async fn create_product(&self, product: &Product) -> Result<()> {
        self.inner.create_product(product).await
    }

    async fn get_review(&self, review_id: &str) -> Result<Option<ReviewRequest>> {
        self.inner.get_review(review_id).await
    }

    async fn submit_review(&self, review: ReviewRequest) -> Result<(ReviewRequest, bool)> {
        let now = self.reviews_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_reviews_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.review_delay).await;
        let result = self.inner.submit_review(review).await;
        self.reviews_in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn list_reviews(&self, status: Option<ReviewStatus>) -> Result<Vec<ReviewRequest>> {
        self.inner.list_reviews(status).await
    }

    async fn approve_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
        product: &Product,
    ) -> Result<ReviewRequest> {
        self.inner
            .approve_review(review_id, admin_notes, product)
            .await
    }

    async fn reject_review(
        &self,
        review_id: &str,
        admin_notes: Option<String>,
    ) -> Result<ReviewRequest> {
        self.inner.reject_review(review_id, admin_notes).await
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        self.inner.insert_notification(notification).await
    }

    async fn list_notifications(
        &self,
        user_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<NotificationPage> {
        self.inner.list_notifications(user_id, offset, limit).await
    }

    async fn count_unread_notifications(&self, user_id: &str) -> Result<u64> {
        self.inner.count_unread_notifications(user_id).await
    }

    async fn mark_notification_read(&self, user_id: &str, notification_id: &str) -> Result<()> {
        self.inner
            .mark_notification_read(user_id, notification_id)
            .await
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64> {
        self.inner.mark_all_notifications_read(user_id).await
    }
}

/// All notifications of `user_id`, newest first.
#[allow(dead_code)]
pub async fn notifications_of(store: &MemoryStore, user_id: &str) -> Vec<Notification> {
    store
        .list_notifications(user_id, 0, u32::MAX)
        .await
        .expect("list notifications")
        .notifications
}
