//! One-time auth links for web-form prospects.
//!
//! The delivered email carries a signed login URL; visiting it exchanges the
//! token for a session token. Tokens are audience-scoped so a login token
//! can never be replayed as a session and vice versa.

use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

const LOGIN_AUDIENCE: &str = "leadflow-login-link";
const SESSION_AUDIENCE: &str = "leadflow-session";

#[derive(Clone)]
pub struct LoginLinkService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    public_base_url: String,
    login_expiry: Duration,
    session_expiry: Duration,
}

impl LoginLinkService {
    pub fn new(
        secret: &str,
        issuer: impl Into<String>,
        public_base_url: impl Into<String>,
        login_expiry_minutes: i64,
        session_expiry_minutes: i64,
    ) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            public_base_url: public_base_url.into(),
            login_expiry: Duration::minutes(login_expiry_minutes),
            session_expiry: Duration::minutes(session_expiry_minutes),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.public_base_url.clone(),
            config.login_link_expiry_minutes,
            config.session_expiry_minutes,
        )
    }

    /// Full sign-in URL for the outbound email. Each call mints a fresh
    /// token, so issuing redundantly is safe.
    pub fn login_url(&self, email: &str) -> Result<String> {
        let token = self.issue_login_token(email)?;
        Ok(format!(
            "{}/api/auth/verify?token={token}",
            self.public_base_url.trim_end_matches('/')
        ))
    }

    pub fn issue_login_token(&self, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = LinkClaims {
            sub: email.to_string(),
            iss: self.issuer.clone(),
            aud: LOGIN_AUDIENCE.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.login_expiry).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_login_token(&self, token: &str) -> Result<LinkClaims> {
        self.verify(token, LOGIN_AUDIENCE)
    }

    pub fn issue_session_token(&self, email: &str) -> Result<String> {
        let now = Utc::now();
        let claims = LinkClaims {
            sub: email.to_string(),
            iss: self.issuer.clone(),
            aud: SESSION_AUDIENCE.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.session_expiry).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_session_token(&self, token: &str) -> Result<LinkClaims> {
        self.verify(token, SESSION_AUDIENCE)
    }

    fn verify(&self, token: &str, audience: &str) -> Result<LinkClaims> {
        let mut validation = Validation::default();
        validation.set_audience(&[audience]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<LinkClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}
