//! Outbound report delivery
//!
//! Fire-and-forget: a failed delivery is logged and never blocks or
//! fails the engine.

use async_trait::async_trait;
use std::time::Duration;

const SEND_TIMEOUT_SECS: u64 = 10;

/// Destination for human-readable reports
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str);
}

/// Notifier that writes reports to the service log
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subject: &str, body: &str) {
        tracing::info!("--- {} ---", subject);
        for line in body.lines() {
            tracing::info!("{}", line);
        }
        tracing::info!("--- end of {} ---", subject);
    }
}

/// Notifier that POSTs reports to a webhook as JSON
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Option<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .ok()?;
        Some(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, subject: &str, body: &str) {
        let payload = serde_json::json!({ "subject": subject, "text": body });
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(subject, "Report delivered to webhook");
            }
            Ok(response) => {
                tracing::warn!(
                    subject,
                    status = response.status().as_u16(),
                    "Webhook rejected report"
                );
            }
            Err(err) => {
                tracing::warn!(subject, error = %err, "Failed to deliver report to webhook");
            }
        }
    }
}
