use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Body accepted by Slack-style incoming webhooks.
#[derive(Serialize, Clone, Debug)]
pub struct WebhookPayload<'a> {
    pub text: &'a str,
}

/// Delivers one rendered notification. Implementations make a single
/// attempt and never retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, text: &str) -> Result<(), Error> {
        let res = reqwest::Client::new()
            .post(&self.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(&WebhookPayload { text })
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("Webhook delivery failed: {} ({})", status, body);
        }
        tracing::debug!("Webhook accepted notification ({} bytes)", text.len());
        Ok(())
    }
}
