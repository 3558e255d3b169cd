//! Business-domain gate for inbound signups.
//!
//! Signups from free mail providers are dropped before a job row is ever
//! created; everything downstream can assume a company domain.

use thiserror::Error;

/// Domains belonging to personal/free mail providers. Matched exactly,
/// case-insensitively, against the part after `@`.
const FREE_PROVIDERS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "ymail.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "proton.me",
    "protonmail.com",
    "pm.me",
    "gmx.com",
    "mail.com",
    "yandex.com",
    "zoho.com",
    "fastmail.com",
    "hey.com",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("invalid email address: {0}")]
    InvalidEmail(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub domain: String,
    pub is_free_provider: bool,
}

/// Extracts the domain from `email` and flags known free providers.
///
/// Pure and deterministic; the only failure is a structurally invalid
/// address (no `@`, or nothing after it).
pub fn classify(email: &str) -> Result<Classification, ClassifyError> {
    let (_, domain) = email
        .rsplit_once('@')
        .ok_or_else(|| ClassifyError::InvalidEmail(email.to_string()))?;

    let domain = domain.trim().to_ascii_lowercase();
    if domain.is_empty() {
        return Err(ClassifyError::InvalidEmail(email.to_string()));
    }

    let is_free_provider = FREE_PROVIDERS.contains(&domain.as_str());
    Ok(Classification {
        domain,
        is_free_provider,
    })
}
