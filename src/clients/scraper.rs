use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of polling an in-flight scrape.
#[derive(Debug, Clone)]
pub enum ScrapePoll {
    Processing,
    Completed(Value),
    /// The provider itself reported the scrape as failed. Terminal for the
    /// job; does not consume retry budget.
    Failed(String),
}

/// Asynchronous website-extraction capability: start a scrape for a domain,
/// poll it later by provider job id.
#[async_trait]
pub trait WebsiteScraper: Send + Sync {
    async fn start(&self, domain: &str) -> Result<String>;

    async fn poll(&self, scrape_job_id: &str) -> Result<ScrapePoll>;
}

/// Normalized snapshot of a prospect's website. This is the only shape the
/// pipeline ever sees; provider responses are mapped into it at the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteData {
    pub company_name: String,
    pub summary: String,
    pub page_text: String,
    pub services: Vec<String>,
    pub products: Vec<String>,
}

impl WebsiteData {
    /// Maps a raw provider payload into the fixed internal shape. Providers
    /// disagree on key casing and omit fields freely; missing text fields
    /// become empty strings and missing lists become empty vecs, so
    /// downstream templating never has to branch on absence.
    pub fn from_raw(domain: &str, raw: &Value) -> Self {
        let company_name = string_field(raw, &["company_name", "companyName", "name", "title"])
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default_company_name(domain));
        let summary = string_field(raw, &["summary", "description"]).unwrap_or_default();
        let page_text =
            string_field(raw, &["page_text", "pageText", "content", "markdown", "text"])
                .unwrap_or_default();
        let services = list_field(raw, &["services"]);
        let products = list_field(raw, &["products"]);

        Self {
            company_name,
            summary,
            page_text,
            services,
            products,
        }
    }

    /// Fallback snapshot when no scrape result is available at all.
    pub fn empty(domain: &str) -> Self {
        Self::from_raw(domain, &Value::Null)
    }
}

fn string_field(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| raw.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn list_field(raw: &Value, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|key| raw.get(key))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => map
                        .get("name")
                        .or_else(|| map.get("title"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// "acme.com" -> "Acme". Used when the scraper returns no company name.
fn default_company_name(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => domain.to_string(),
    }
}

/// Firecrawl-style asynchronous extract API: POST to start, GET to poll.
pub struct FirecrawlScraper {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FirecrawlScraper {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Deserialize)]
struct StartResponse {
    id: String,
}

#[derive(Deserialize)]
struct PollResponse {
    status: String,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl WebsiteScraper for FirecrawlScraper {
    async fn start(&self, domain: &str) -> Result<String> {
        let url = format!("{}/v1/extract", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "urls": [format!("https://{domain}")],
                "prompt": "Extract the company name, a short summary of what \
                           the company does, the main page text, and lists of \
                           services and products offered.",
            }))
            .send()
            .await
            .context("scrape start request failed")?
            .error_for_status()
            .context("scrape start rejected by provider")?;

        let body: StartResponse = response
            .json()
            .await
            .context("invalid scrape start response")?;
        Ok(body.id)
    }

    async fn poll(&self, scrape_job_id: &str) -> Result<ScrapePoll> {
        let url = format!("{}/v1/extract/{scrape_job_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("scrape poll request failed")?
            .error_for_status()
            .context("scrape poll rejected by provider")?;

        let body: PollResponse = response.json().await.context("invalid scrape poll response")?;
        match body.status.as_str() {
            "processing" | "pending" | "scraping" => Ok(ScrapePoll::Processing),
            "completed" => Ok(ScrapePoll::Completed(body.data.unwrap_or(Value::Null))),
            "failed" | "error" | "cancelled" => Ok(ScrapePoll::Failed(
                body.error.unwrap_or_else(|| "scrape failed".to_string()),
            )),
            other => Err(anyhow!("unknown scrape status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::WebsiteData;
    use serde_json::json;

    #[test]
    fn normalizes_snake_case_payload() {
        let raw = json!({
            "company_name": "Acme Inc",
            "summary": "Roadrunner deterrence",
            "page_text": "We sell anvils.",
            "services": ["consulting"],
            "products": ["anvil", "rocket skates"],
        });
        let data = WebsiteData::from_raw("acme.com", &raw);
        assert_eq!(data.company_name, "Acme Inc");
        assert_eq!(data.summary, "Roadrunner deterrence");
        assert_eq!(data.products, vec!["anvil", "rocket skates"]);
    }

    #[test]
    fn normalizes_camel_case_payload() {
        let raw = json!({
            "companyName": "Acme Inc",
            "pageText": "We sell anvils.",
        });
        let data = WebsiteData::from_raw("acme.com", &raw);
        assert_eq!(data.company_name, "Acme Inc");
        assert_eq!(data.page_text, "We sell anvils.");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let data = WebsiteData::from_raw("acme.com", &json!({"company_name": "Acme Inc"}));
        assert_eq!(data.summary, "");
        assert_eq!(data.page_text, "");
        assert!(data.services.is_empty());
        assert!(data.products.is_empty());
    }

    #[test]
    fn company_name_falls_back_to_domain_label() {
        let data = WebsiteData::from_raw("acme.com", &json!({}));
        assert_eq!(data.company_name, "Acme");

        let blank = WebsiteData::from_raw("widgets.io", &json!({"company_name": "  "}));
        assert_eq!(blank.company_name, "Widgets");
    }

    #[test]
    fn object_lists_use_name_field() {
        let raw = json!({
            "services": [{"name": "consulting"}, {"title": "support"}, 42],
        });
        let data = WebsiteData::from_raw("acme.com", &raw);
        assert_eq!(data.services, vec!["consulting", "support"]);
    }
}
