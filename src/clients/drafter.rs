use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clients::scraper::WebsiteData;
use crate::tenants::DraftStyle;

/// A drafted outreach email, persisted on the job before delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub prospect_name: String,
    pub prospect_email: String,
    pub domain: String,
    pub website: WebsiteData,
    pub style: DraftStyle,
}

/// Drafting capability. Implementations may fail; the pipeline catches any
/// error and substitutes [`fallback_draft`], so generation never sinks a job.
#[async_trait]
pub trait EmailDrafter: Send + Sync {
    async fn draft(&self, request: &DraftRequest) -> Result<EmailDraft>;
}

/// Deterministic draft used whenever the LLM is unavailable or returns
/// something unusable. Interpolates only the prospect's name and domain.
pub fn fallback_draft(prospect_name: &str, domain: &str) -> EmailDraft {
    EmailDraft {
        subject: format!("Quick question about {domain}"),
        body: format!(
            "Hi {prospect_name},\n\n\
             I came across {domain} and was impressed by what you're \
             building. I'd love to show you how we help teams like yours \
             turn website visitors into customers.\n\n\
             Would you be open to a quick chat this week?\n\n\
             Best regards"
        ),
    }
}

/// OpenAI chat-completions drafter. Asks for a strict JSON object so the
/// response parses straight into [`EmailDraft`].
pub struct OpenAiDrafter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiDrafter {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

pub(crate) fn build_prompt(request: &DraftRequest) -> String {
    let DraftRequest {
        prospect_name,
        domain,
        website,
        style,
        ..
    } = request;

    let mut prompt = format!(
        "You are writing on behalf of {tenant}: {description}\n\
         Write a personalized outreach email to {prospect_name}, who works \
         at {company} ({domain}).\n",
        tenant = style.tenant_name,
        description = style.tenant_description,
        company = website.company_name,
    );

    if !website.summary.is_empty() {
        prompt.push_str(&format!("About the company: {}\n", website.summary));
    }
    if !website.services.is_empty() {
        prompt.push_str(&format!("Services: {}\n", website.services.join(", ")));
    }
    if !website.products.is_empty() {
        prompt.push_str(&format!("Products: {}\n", website.products.join(", ")));
    }
    if let Some(template) = &style.template {
        prompt.push_str(&format!("Follow this template:\n{template}\n"));
    }

    prompt.push_str(&format!(
        "Tone: {}. Style: {}. Keep the body under {} words.\n\
         Respond with a JSON object with exactly two string fields: \
         \"subject\" and \"body\".",
        style.tone, style.style, style.max_words,
    ));
    prompt
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl EmailDrafter for OpenAiDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<EmailDraft> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [{"role": "user", "content": build_prompt(request)}],
                "response_format": {"type": "json_object"},
            }))
            .send()
            .await
            .context("draft request failed")?
            .error_for_status()
            .context("draft request rejected by provider")?;

        let body: ChatResponse = response.json().await.context("invalid draft response")?;
        let content = body
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| anyhow!("draft response contained no choices"))?;

        let draft: EmailDraft =
            serde_json::from_str(content).context("draft content was not valid JSON")?;
        if draft.subject.trim().is_empty() || draft.body.trim().is_empty() {
            return Err(anyhow!("draft was missing a subject or body"));
        }
        Ok(draft)
    }
}
