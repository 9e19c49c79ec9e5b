//! Application state.

use std::sync::Arc;

use voucher_core::Notification;
use voucher_store::Store;

use crate::config::ServiceConfig;
use crate::notify::{LogSink, NotificationSink, WebhookSink};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Where notifications go.
    pub notifier: Arc<dyn NotificationSink>,
}

impl AppState {
    /// Create a new application state. Notifications go to the configured
    /// webhook, or to the log when none is set.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let notifier: Arc<dyn NotificationSink> = match &config.notify_webhook_url {
            Some(url) => match WebhookSink::new(url, config.notify_webhook_secret.clone()) {
                Ok(sink) => {
                    tracing::info!(url = %url, "Notification webhook enabled");
                    Arc::new(sink)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create notification webhook client");
                    Arc::new(LogSink)
                }
            },
            None => {
                tracing::warn!("Notification webhook not configured - notifications are only logged");
                Arc::new(LogSink)
            }
        };

        Self {
            store,
            config,
            notifier,
        }
    }

    /// Replace the notification sink.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Send a notification in the background. The caller never waits and a
    /// failed delivery is only logged.
    pub fn notify(&self, notification: Notification) {
        let sink = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = sink.send(&notification).await {
                tracing::warn!(
                    user_id = %notification.user_id,
                    kind = ?notification.kind,
                    error = %e,
                    "Failed to deliver notification"
                );
            }
        });
    }
}
