//! Common test utilities for voucher-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use voucher_core::{Notification, UserId};
use voucher_service::{
    create_router, issue_token, AppState, NotificationSink, NotifyError, ServiceConfig,
};
use voucher_store::{MemoryStore, Store};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const JWT_ISSUER: &str = "voucher-ledger-test";
pub const ADMIN_KEY: &str = "test-admin-key";

/// Sink that keeps every notification in memory.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Sink whose receiver always answers 503.
#[derive(Default)]
pub struct FailingSink {
    attempts: AtomicUsize,
}

impl FailingSink {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait until at least `count` deliveries were attempted.
    pub async fn wait_for_attempts(&self, count: usize) -> usize {
        for _ in 0..50 {
            if self.attempts() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.attempts()
    }
}

#[async_trait]
impl NotificationSink for FailingSink {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Rejected(503))
    }
}

/// Ids of a seeded Mitra Cabang → Cabang → Link chain.
#[derive(Debug, Clone, Copy)]
pub struct Tree {
    pub mitra: UserId,
    pub cabang: UserId,
    pub link: UserId,
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Direct handle on the backing store.
    pub store: Arc<MemoryStore>,
    /// Notifications emitted by handlers, when no other notifier is installed.
    pub sink: Arc<RecordingSink>,
}

impl TestHarness {
    /// Create a new test harness with an empty in-memory store.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a harness whose handlers notify through `notifier`.
    pub fn with_notifier(notifier: Arc<dyn NotificationSink>) -> Self {
        Self::build(Some(notifier))
    }

    fn build(notifier: Option<Arc<dyn NotificationSink>>) -> Self {
        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            jwt_secret: Some(JWT_SECRET.into()),
            jwt_issuer: JWT_ISSUER.into(),
            admin_api_key: Some(ADMIN_KEY.into()),
            cors_origins: vec!["*".into()],
            ..ServiceConfig::default()
        };

        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(RecordingSink::default());
        let notifier = notifier.unwrap_or_else(|| Arc::clone(&sink) as Arc<dyn NotificationSink>);

        let state =
            AppState::new(Arc::clone(&store) as Arc<dyn Store>, config).with_notifier(notifier);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            sink,
        }
    }

    /// Admin key header.
    pub fn admin() -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-admin-key"),
            HeaderValue::from_static(ADMIN_KEY),
        )
    }

    /// Bearer header for `user_id`.
    pub fn bearer(user_id: &UserId) -> (HeaderName, HeaderValue) {
        let token = issue_token(JWT_SECRET, JWT_ISSUER, user_id, 3600).expect("issue token");
        (
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).expect("header value"),
        )
    }

    /// Register a user through the API and return its id.
    pub async fn register(&self, role: &str, parent: Option<&UserId>, username: &str) -> UserId {
        let (name, value) = Self::admin();
        let response = self
            .server
            .post("/v1/users")
            .add_header(name, value)
            .json(&json!({
                "role": role,
                "parent_id": parent.map(ToString::to_string),
                "full_name": username.to_uppercase(),
                "username": username,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let body: Value = response.json();
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Seed a chain priced at 10000 / 1000 / 500 / 300 for voucher type `A`
    /// with `stock` vouchers at the Link.
    pub async fn seed_tree(&self, stock: i64) -> Tree {
        let mitra = self.register("mitra_cabang", None, "mitra").await;
        let cabang = self.register("cabang", Some(&mitra), "cabang").await;
        let link = self.register("link", Some(&cabang), "link").await;

        let (name, value) = Self::admin();
        self.server
            .put("/v1/prices")
            .add_header(name, value)
            .json(&json!({
                "cabang_id": cabang.to_string(),
                "voucher_type": "A",
                "unit_price": 10_000,
                "unit_fee_link": 1_000,
                "unit_fee_cabang": 500,
                "unit_komisi_mitra": 300,
            }))
            .await
            .assert_status_ok();

        if stock > 0 {
            let (name, value) = Self::admin();
            self.server
                .post("/v1/stock/distribute")
                .add_header(name, value)
                .json(&json!({
                    "voucher_type": "A",
                    "link_id": link.to_string(),
                    "amount": stock,
                }))
                .await
                .assert_status_ok();
        }

        Tree {
            mitra,
            cabang,
            link,
        }
    }

    /// Record a sale as the Link itself.
    pub async fn sell(&self, link: &UserId, quantity: i64) -> axum_test::TestResponse {
        let (name, value) = Self::bearer(link);
        self.server
            .post("/v1/sales")
            .add_header(name, value)
            .json(&json!({
                "voucher_type": "A",
                "quantity": quantity,
                "link_id": link.to_string(),
            }))
            .await
    }

    /// Wait until at least `count` notifications were delivered.
    pub async fn wait_for_notifications(&self, count: usize) -> Vec<Notification> {
        for _ in 0..50 {
            let sent = self.sink.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sink.sent()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
