use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::links::LoginLinkService;
use crate::clients::drafter::EmailDraft;

/// Final outbound message. `auth_link` is present only for web-form signups;
/// the implementation decides how to weave it into the body.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: String,
    pub draft: EmailDraft,
    pub auth_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// Delivery capability: mint one-time auth links and send the final email.
/// Issuing a link redundantly is harmless (each call mints a fresh token);
/// sending is guarded upstream by the job's `email_sent` flag.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn auth_link(&self, email: &str) -> Result<String>;

    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt>;
}

/// Resend-style transactional mail API.
pub struct ResendMailer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
    links: LoginLinkService,
}

impl ResendMailer {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        links: LoginLinkService,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            from: from.into(),
            links,
        }
    }
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn auth_link(&self, email: &str) -> Result<String> {
        self.links.login_url(email)
    }

    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt> {
        let mut body = email.draft.body.clone();
        if let Some(link) = &email.auth_link {
            body.push_str(&format!(
                "\n\nSign in to see what we found about your company: {link}"
            ));
        }

        let url = format!("{}/emails", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": [format!("{} <{}>", email.to_name, email.to)],
                "subject": email.draft.subject,
                "text": body,
            }))
            .send()
            .await
            .context("email send request failed")?
            .error_for_status()
            .context("email send rejected by provider")?;

        let body: SendResponse = response.json().await.context("invalid send response")?;
        Ok(SendReceipt {
            message_id: body.id,
        })
    }
}
