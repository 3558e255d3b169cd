//! Tenant resolution for draft styling.
//!
//! A job is attributed to a tenant either directly (`company_id`) or via the
//! partner API key that created it. Lookup failures degrade silently to the
//! default identity; a missing tenant must never sink a job.

use async_trait::async_trait;
use diesel::prelude::*;
use tracing::warn;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::Company;
use crate::schema::{api_keys, companies};

pub const DEFAULT_MAX_WORDS: i32 = 150;

/// Tenant identity and style hints handed to the drafter.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftStyle {
    pub tenant_name: String,
    pub tenant_description: String,
    pub tone: String,
    pub style: String,
    pub max_words: i32,
    pub template: Option<String>,
}

impl Default for DraftStyle {
    fn default() -> Self {
        Self {
            tenant_name: "Leadflow".to_string(),
            tenant_description: "Leadflow helps companies understand and engage \
                                 the businesses visiting their website."
                .to_string(),
            tone: "friendly and professional".to_string(),
            style: "short and direct".to_string(),
            max_words: DEFAULT_MAX_WORDS,
            template: None,
        }
    }
}

impl DraftStyle {
    fn from_company(company: Company) -> Self {
        let defaults = Self::default();
        Self {
            tenant_name: company.name,
            tenant_description: company.description.unwrap_or(defaults.tenant_description),
            tone: company.email_tone.unwrap_or(defaults.tone),
            style: company.email_style.unwrap_or(defaults.style),
            max_words: company.max_words.unwrap_or(DEFAULT_MAX_WORDS),
            template: company.prompt_template,
        }
    }
}

/// Resolves the style for a job's tenant attribution. Infallible by design.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn resolve(&self, company_id: Option<Uuid>, api_key_id: Option<Uuid>) -> DraftStyle;
}

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn lookup(&self, company_id: Option<Uuid>, api_key_id: Option<Uuid>) -> Option<Company> {
        let mut conn = match self.pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                warn!(error = %err, "tenant lookup skipped, falling back to default style");
                return None;
            }
        };

        let resolved_company_id = company_id.or_else(|| {
            api_key_id.and_then(|key_id| {
                api_keys::table
                    .find(key_id)
                    .select(api_keys::company_id)
                    .first::<Option<Uuid>>(&mut conn)
                    .ok()
                    .flatten()
            })
        })?;

        match companies::table
            .find(resolved_company_id)
            .first::<Company>(&mut conn)
            .optional()
        {
            Ok(company) => company,
            Err(err) => {
                warn!(company_id = %resolved_company_id, error = %err,
                      "tenant lookup failed, falling back to default style");
                None
            }
        }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn resolve(&self, company_id: Option<Uuid>, api_key_id: Option<Uuid>) -> DraftStyle {
        self.lookup(company_id, api_key_id)
            .map(DraftStyle::from_company)
            .unwrap_or_default()
    }
}
