//! User identities and partner API keys.
//!
//! Web-form signups get a user row (so the auth link has an account to land
//! on); partner submissions authenticate with an API key whose SHA-256
//! digest is the stored credential.

use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::{ApiKey, NewApiKey, NewUser, User};
use crate::schema::{api_keys, users};

/// Hex SHA-256 digest of a raw API key; the only form ever stored.
pub fn hash_api_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Mints a new random API key. The raw value is shown once to the operator;
/// only its hash is persisted.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("lf_{}", hex::encode(bytes))
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user by email, creating one when absent. Idempotent.
    async fn find_or_create(&self, email: &str, name: &str) -> Result<User>;
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_or_create(&self, email: &str, name: &str) -> Result<User> {
        let mut conn = self.pool.get().context("database pool error")?;

        if let Some(existing) = users::table
            .filter(users::email.eq(email))
            .first::<User>(&mut conn)
            .optional()?
        {
            return Ok(existing);
        }

        let new_user = NewUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
        };
        diesel::insert_into(users::table)
            .values(&new_user)
            .execute(&mut conn)?;

        let user = users::table.find(new_user.id).first(&mut conn)?;
        Ok(user)
    }
}

#[async_trait]
pub trait ApiKeyDirectory: Send + Sync {
    /// Authenticates a raw partner key; returns the key row when it matches
    /// an active credential.
    async fn authenticate(&self, raw_key: &str) -> Result<Option<ApiKey>>;
}

pub struct PgApiKeyDirectory {
    pool: PgPool,
}

impl PgApiKeyDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyDirectory for PgApiKeyDirectory {
    async fn authenticate(&self, raw_key: &str) -> Result<Option<ApiKey>> {
        let mut conn = self.pool.get().context("database pool error")?;
        let key = api_keys::table
            .filter(api_keys::key_hash.eq(hash_api_key(raw_key)))
            .filter(api_keys::active.eq(true))
            .first::<ApiKey>(&mut conn)
            .optional()?;
        Ok(key)
    }
}

/// Inserts a freshly minted key for the `apikeys` operator utility.
pub fn insert_api_key(
    conn: &mut PgConnection,
    raw_key: &str,
    label: &str,
    company_id: Option<Uuid>,
) -> Result<ApiKey> {
    let new_key = NewApiKey {
        id: Uuid::new_v4(),
        company_id,
        key_hash: hash_api_key(raw_key),
        label: label.to_string(),
        active: true,
    };
    diesel::insert_into(api_keys::table)
        .values(&new_key)
        .execute(conn)?;

    let key = api_keys::table.find(new_key.id).first(conn)?;
    Ok(key)
}
