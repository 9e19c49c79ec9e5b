//! Notification webhook tests.

use serde_json::Value;
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voucher_core::{Notification, NotificationKind, UserId};
use voucher_service::crypto::hmac_sha256_hex;
use voucher_service::notify::SIGNATURE_HEADER;
use voucher_service::{NotificationSink, NotifyError, WebhookSink};

fn notification() -> Notification {
    Notification {
        user_id: UserId::generate(),
        title: "Deposit diterima".into(),
        message: "Deposit sebesar Rp 1000 telah dicatat".into(),
        kind: NotificationKind::Deposit,
        link_url: None,
    }
}

#[tokio::test]
async fn webhook_posts_signed_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header_exists(SIGNATURE_HEADER))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let sink = WebhookSink::new(format!("{}/hook", server.uri()), Some("s3cret".into())).unwrap();
    let notice = notification();
    sink.send(&notice).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let body = String::from_utf8(request.body.clone()).unwrap();
    let signature = request
        .headers
        .get(SIGNATURE_HEADER)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(signature, hmac_sha256_hex("s3cret", &body).unwrap());

    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["type"], "deposit");
    assert_eq!(json["user_id"], notice.user_id.to_string());
    assert!(json.get("link_url").is_none());
}

#[tokio::test]
async fn webhook_without_secret_is_unsigned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let sink = WebhookSink::new(server.uri(), None).unwrap();
    sink.send(&notification()).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get(SIGNATURE_HEADER).is_none());
}

#[tokio::test]
async fn webhook_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let sink = WebhookSink::new(server.uri(), None).unwrap();
    let err = sink.send(&notification()).await.unwrap_err();

    assert!(matches!(err, NotifyError::Rejected(503)));
}
