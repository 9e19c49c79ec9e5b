//! Deposit and reset integration tests.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{FailingSink, TestHarness};
use serde_json::{json, Value};

use voucher_core::{NotificationKind, UserId};

async fn deposit(
    harness: &TestHarness,
    kategori: &str,
    user_id: &UserId,
    jumlah: i64,
) -> axum_test::TestResponse {
    let (name, value) = TestHarness::admin();
    harness
        .server
        .post("/v1/deposits")
        .add_header(name, value)
        .json(&json!({
            "kategori": kategori,
            "user_id": user_id.to_string(),
            "jumlah": jumlah,
            "keterangan": "transfer",
        }))
        .await
}

#[tokio::test]
async fn link_deposit_resets_only_that_link() {
    let harness = TestHarness::new();
    let tree = harness.seed_tree(100).await;
    let other = harness.register("link", Some(&tree.cabang), "link2").await;
    let (name, value) = TestHarness::admin();
    harness
        .server
        .post("/v1/stock/distribute")
        .add_header(name, value)
        .json(&json!({ "voucher_type": "A", "link_id": other.to_string(), "amount": 5 }))
        .await
        .assert_status_ok();

    harness.sell(&tree.link, 3).await.assert_status(StatusCode::CREATED);
    harness.sell(&other, 2).await.assert_status(StatusCode::CREATED);

    let response = deposit(&harness, "link", &tree.link, 3_000).await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["rows_reset"], 1);
    assert_eq!(body["kategori"], "link");

    let (name, value) = TestHarness::admin();
    let balance: Value = harness
        .server
        .get(&format!("/v1/balance/link/{}", tree.link))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(balance["unclaimed"], 0);

    let (name, value) = TestHarness::admin();
    let balance: Value = harness
        .server
        .get(&format!("/v1/balance/link/{other}"))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(balance["unclaimed"], 2_000);

    // The Cabang's share of the reset link's sale is untouched.
    let (name, value) = TestHarness::admin();
    let balance: Value = harness
        .server
        .get(&format!("/v1/balance/cabang/{}", tree.cabang))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(balance["unclaimed"], 2_500);
}

#[tokio::test]
async fn second_deposit_is_recorded_and_balance_stays_zero() {
    let harness = TestHarness::new();
    let tree = harness.seed_tree(10).await;
    harness.sell(&tree.link, 1).await.assert_status(StatusCode::CREATED);

    deposit(&harness, "cabang", &tree.cabang, 500)
        .await
        .assert_status(StatusCode::CREATED);
    deposit(&harness, "cabang", &tree.cabang, 500)
        .await
        .assert_status(StatusCode::CREATED);

    let (name, value) = TestHarness::bearer(&tree.cabang);
    let deposits: Value = harness
        .server
        .get(&format!("/v1/deposits/{}", tree.cabang))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(deposits.as_array().unwrap().len(), 2);

    let (name, value) = TestHarness::bearer(&tree.cabang);
    let balance: Value = harness
        .server
        .get(&format!("/v1/balance/cabang/{}", tree.cabang))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(balance["unclaimed"], 0);
}

#[tokio::test]
async fn deposit_to_wrong_tier_is_bad_request() {
    let harness = TestHarness::new();
    let tree = harness.seed_tree(0).await;

    let response = deposit(&harness, "link", &tree.cabang, 100).await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn non_positive_deposit_is_bad_request() {
    let harness = TestHarness::new();
    let tree = harness.seed_tree(0).await;

    deposit(&harness, "link", &tree.link, 0)
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn members_cannot_record_deposits() {
    let harness = TestHarness::new();
    let tree = harness.seed_tree(0).await;

    let (name, value) = TestHarness::bearer(&tree.link);
    let response = harness
        .server
        .post("/v1/deposits")
        .add_header(name, value)
        .json(&json!({
            "kategori": "link",
            "user_id": tree.link.to_string(),
            "jumlah": 100,
        }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deposit_notifies_the_recipient() {
    let harness = TestHarness::new();
    let tree = harness.seed_tree(0).await;

    deposit(&harness, "link", &tree.link, 1_000)
        .await
        .assert_status(StatusCode::CREATED);

    let sent = harness.wait_for_notifications(1).await;
    let notice = sent
        .iter()
        .find(|n| n.kind == NotificationKind::Deposit)
        .expect("deposit notification");
    assert_eq!(notice.user_id, tree.link);
}

#[tokio::test]
async fn rejected_notification_does_not_fail_the_deposit() {
    let sink = Arc::new(FailingSink::default());
    let harness = TestHarness::with_notifier(Arc::clone(&sink) as _);
    let tree = harness.seed_tree(10).await;
    harness.sell(&tree.link, 2).await.assert_status(StatusCode::CREATED);

    let response = deposit(&harness, "link", &tree.link, 2_000).await;
    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["rows_reset"], 1);

    // One attempt for the seeded stock, one for the deposit.
    assert_eq!(sink.wait_for_attempts(2).await, 2);

    let (name, value) = TestHarness::admin();
    let balance: Value = harness
        .server
        .get(&format!("/v1/balance/link/{}", tree.link))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(balance["unclaimed"], 0);

    let (name, value) = TestHarness::bearer(&tree.link);
    let deposits: Value = harness
        .server
        .get(&format!("/v1/deposits/{}", tree.link))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(deposits.as_array().unwrap().len(), 1);
    assert!(harness.sink.sent().is_empty());
}
