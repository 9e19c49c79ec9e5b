//! Notification delivery.
//!
//! Delivery is best-effort: [`crate::AppState::notify`] spawns the send and
//! only logs failures. A sink makes a single attempt.

use std::time::Duration;

use async_trait::async_trait;

use voucher_core::Notification;

use crate::crypto::hmac_sha256_hex;

/// Timeout for one webhook delivery.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Errors from a notification sink.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The HTTP request failed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The receiver answered with a non-success status.
    #[error("receiver rejected notification with status {0}")]
    Rejected(u16),

    /// The notification could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The payload could not be signed.
    #[error("signing error: {0}")]
    Signing(String),
}

/// Destination for user notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns an error if delivery fails. Callers log and drop it.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Sink that only writes notifications to the log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            user_id = %notification.user_id,
            kind = ?notification.kind,
            title = %notification.title,
            "Notification"
        );
        Ok(())
    }
}

/// Sink that POSTs notifications as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookSink {
    /// Create a sink for `url`, signing bodies with `secret` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, secret: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            secret,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = serde_json::to_string(notification)?;

        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            let signature =
                hmac_sha256_hex(secret, &body).map_err(|e| NotifyError::Signing(e.to_string()))?;
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request.body(body).send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        tracing::debug!(
            user_id = %notification.user_id,
            kind = ?notification.kind,
            "Notification delivered"
        );
        Ok(())
    }
}
