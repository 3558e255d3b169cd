use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

/// Best-effort internal channel notifications. Call sites go through
/// [`notify_best_effort`]; a failed post is logged and forgotten.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, text: &str) -> Result<()>;
}

/// Swallows and logs any notifier error so a flaky webhook can never affect
/// a job's outcome.
pub async fn notify_best_effort(notifier: &dyn Notifier, text: &str) {
    if let Err(err) = notifier.post(text).await {
        warn!(error = %err, "failed to post notification");
    }
}

/// Slack incoming-webhook notifier.
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(http: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            http,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post(&self, text: &str) -> Result<()> {
        self.http
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .context("slack webhook request failed")?
            .error_for_status()
            .context("slack webhook rejected the message")?;
        Ok(())
    }
}

/// No-op notifier used when no webhook is configured.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn post(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}
