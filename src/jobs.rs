//! The job store: system of record for the enrichment pipeline.
//!
//! A job row is the work item. Every state transition goes through a
//! conditional update keyed on the expected prior state, so overlapping
//! schedulers or an operator retry racing a tick cannot double-apply a
//! transition.

use async_trait::async_trait;
use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use thiserror::Error;
use uuid::Uuid;

use crate::clients::drafter::EmailDraft;
use crate::clients::scraper::WebsiteData;
use crate::db::PgPool;
use crate::models::{Job, JobStatus, NewJob};
use crate::schema::jobs;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
    #[error("job {id} is not in state {expected}")]
    InvalidTransition { id: Uuid, expected: JobStatus },
    #[error("email already sent for job {0}")]
    AlreadySent(Uuid),
    #[error("job {0} is already terminal")]
    Terminal(Uuid),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("database pool error: {0}")]
    Pool(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Fields captured at signup time; everything else starts at its default.
#[derive(Debug, Clone)]
pub struct NewJobRequest {
    pub email: String,
    pub name: String,
    pub domain: String,
    pub company_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub from_website: bool,
    pub user_id: Option<Uuid>,
}

/// Persistence contract for jobs. The orchestrator and scheduler only ever
/// talk to this trait, so tests substitute an in-memory implementation.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, request: NewJobRequest) -> JobStoreResult<Job>;

    async fn get(&self, id: Uuid) -> JobStoreResult<Option<Job>>;

    /// Jobs still waiting on the pipeline: `pending` and `scraping`, oldest
    /// created first for FIFO fairness.
    async fn get_pending(&self, limit: i64) -> JobStoreResult<Vec<Job>>;

    /// Jobs in `status`, most recently updated first.
    async fn get_by_status(&self, status: JobStatus, limit: i64) -> JobStoreResult<Vec<Job>>;

    /// Sweep query: jobs in `status` filtered by the delivery flag, oldest
    /// created first. Used to find drafts that never made it out the door.
    async fn get_by_status_and_email_sent(
        &self,
        status: JobStatus,
        email_sent: bool,
        limit: i64,
    ) -> JobStoreResult<Vec<Job>>;

    /// pending -> scraping, recording the provider's scrape job id.
    async fn mark_scraping(&self, id: Uuid, scrape_job_id: &str) -> JobStoreResult<Job>;

    /// scraping -> generating_email. Persists the normalized scrape result;
    /// only valid while the result is still unset.
    async fn mark_generating(&self, id: Uuid, result: &WebsiteData) -> JobStoreResult<Job>;

    /// generating_email -> completed. Flips `email_sent` false -> true and
    /// stamps `completed_at`; fails with [`JobStoreError::AlreadySent`] if
    /// the flag was already set.
    async fn mark_completed(&self, id: Uuid, draft: &EmailDraft) -> JobStoreResult<Job>;

    /// Any non-terminal state -> failed, recording the reason. A job that
    /// already reached `completed` or `failed` stays put and the call
    /// returns [`JobStoreError::Terminal`].
    async fn mark_failed(&self, id: Uuid, error_message: &str) -> JobStoreResult<Job>;

    /// Bumps `retry_count` and records the error without touching `status`,
    /// so the next tick picks the job up again. Rejected with
    /// [`JobStoreError::Terminal`] once the job is completed or failed.
    async fn record_retry(&self, id: Uuid, error_message: &str) -> JobStoreResult<Job>;

    /// Operator action: failed -> pending, clearing retry bookkeeping.
    async fn reset_for_retry(&self, id: Uuid) -> JobStoreResult<Job>;
}

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn conn(
        &self,
    ) -> JobStoreResult<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>>
    {
        self.pool
            .get()
            .map_err(|err| JobStoreError::Pool(err.to_string()))
    }

    fn reload(conn: &mut PgConnection, id: Uuid) -> JobStoreResult<Job> {
        jobs::table
            .find(id)
            .first(conn)
            .optional()?
            .ok_or(JobStoreError::NotFound(id))
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, request: NewJobRequest) -> JobStoreResult<Job> {
        let mut conn = self.conn()?;
        let new_job = NewJob {
            id: Uuid::new_v4(),
            email: request.email,
            name: request.name,
            domain: request.domain,
            status: JobStatus::Pending.as_str().to_string(),
            company_id: request.company_id,
            api_key_id: request.api_key_id,
            from_website: request.from_website,
            user_id: request.user_id,
        };

        diesel::insert_into(jobs::table)
            .values(&new_job)
            .execute(&mut conn)?;

        Self::reload(&mut conn, new_job.id)
    }

    async fn get(&self, id: Uuid) -> JobStoreResult<Option<Job>> {
        let mut conn = self.conn()?;
        Ok(jobs::table.find(id).first(&mut conn).optional()?)
    }

    async fn get_pending(&self, limit: i64) -> JobStoreResult<Vec<Job>> {
        let mut conn = self.conn()?;
        let rows = jobs::table
            .filter(jobs::status.eq_any([
                JobStatus::Pending.as_str(),
                JobStatus::Scraping.as_str(),
            ]))
            .order(jobs::created_at.asc())
            .limit(limit)
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn get_by_status(&self, status: JobStatus, limit: i64) -> JobStoreResult<Vec<Job>> {
        let mut conn = self.conn()?;
        let rows = jobs::table
            .filter(jobs::status.eq(status.as_str()))
            .order(jobs::updated_at.desc())
            .limit(limit)
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn get_by_status_and_email_sent(
        &self,
        status: JobStatus,
        email_sent: bool,
        limit: i64,
    ) -> JobStoreResult<Vec<Job>> {
        let mut conn = self.conn()?;
        let rows = jobs::table
            .filter(jobs::status.eq(status.as_str()))
            .filter(jobs::email_sent.eq(email_sent))
            .order(jobs::created_at.asc())
            .limit(limit)
            .load(&mut conn)?;
        Ok(rows)
    }

    async fn mark_scraping(&self, id: Uuid, scrape_job_id: &str) -> JobStoreResult<Job> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let updated = diesel::update(
            jobs::table
                .find(id)
                .filter(jobs::status.eq(JobStatus::Pending.as_str())),
        )
        .set((
            jobs::status.eq(JobStatus::Scraping.as_str()),
            jobs::scrape_job_id.eq(scrape_job_id),
            jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        if updated == 0 {
            return match Self::reload(&mut conn, id) {
                Ok(_) => Err(JobStoreError::InvalidTransition {
                    id,
                    expected: JobStatus::Pending,
                }),
                Err(err) => Err(err),
            };
        }
        Self::reload(&mut conn, id)
    }

    async fn mark_generating(&self, id: Uuid, result: &WebsiteData) -> JobStoreResult<Job> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let payload = serde_json::to_value(result)?;
        let updated = diesel::update(
            jobs::table
                .find(id)
                .filter(jobs::status.eq(JobStatus::Scraping.as_str()))
                .filter(jobs::scrape_result.is_null()),
        )
        .set((
            jobs::status.eq(JobStatus::GeneratingEmail.as_str()),
            jobs::scrape_result.eq(payload),
            jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        if updated == 0 {
            return match Self::reload(&mut conn, id) {
                Ok(_) => Err(JobStoreError::InvalidTransition {
                    id,
                    expected: JobStatus::Scraping,
                }),
                Err(err) => Err(err),
            };
        }
        Self::reload(&mut conn, id)
    }

    async fn mark_completed(&self, id: Uuid, draft: &EmailDraft) -> JobStoreResult<Job> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let payload = serde_json::to_value(draft)?;
        let updated = diesel::update(
            jobs::table
                .find(id)
                .filter(jobs::status.eq(JobStatus::GeneratingEmail.as_str()))
                .filter(jobs::email_sent.eq(false)),
        )
        .set((
            jobs::status.eq(JobStatus::Completed.as_str()),
            jobs::email_draft.eq(payload),
            jobs::email_sent.eq(true),
            jobs::error_message.eq::<Option<String>>(None),
            jobs::completed_at.eq(now),
            jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        if updated == 0 {
            let current = Self::reload(&mut conn, id)?;
            if current.email_sent {
                return Err(JobStoreError::AlreadySent(id));
            }
            return Err(JobStoreError::InvalidTransition {
                id,
                expected: JobStatus::GeneratingEmail,
            });
        }
        Self::reload(&mut conn, id)
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> JobStoreResult<Job> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let updated = diesel::update(jobs::table.find(id).filter(jobs::status.ne_all([
            JobStatus::Completed.as_str(),
            JobStatus::Failed.as_str(),
        ])))
        .set((
            jobs::status.eq(JobStatus::Failed.as_str()),
            jobs::error_message.eq(error_message),
            jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        if updated == 0 {
            Self::reload(&mut conn, id)?;
            return Err(JobStoreError::Terminal(id));
        }
        Self::reload(&mut conn, id)
    }

    async fn record_retry(&self, id: Uuid, error_message: &str) -> JobStoreResult<Job> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let updated = diesel::update(jobs::table.find(id).filter(jobs::status.ne_all([
            JobStatus::Completed.as_str(),
            JobStatus::Failed.as_str(),
        ])))
        .set((
            jobs::retry_count.eq(jobs::retry_count + 1),
            jobs::error_message.eq(error_message),
            jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        if updated == 0 {
            Self::reload(&mut conn, id)?;
            return Err(JobStoreError::Terminal(id));
        }
        Self::reload(&mut conn, id)
    }

    async fn reset_for_retry(&self, id: Uuid) -> JobStoreResult<Job> {
        let mut conn = self.conn()?;
        let now = Utc::now().naive_utc();
        let updated = diesel::update(
            jobs::table
                .find(id)
                .filter(jobs::status.eq(JobStatus::Failed.as_str())),
        )
        .set((
            jobs::status.eq(JobStatus::Pending.as_str()),
            jobs::retry_count.eq(0),
            jobs::error_message.eq::<Option<String>>(None),
            jobs::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        if updated == 0 {
            return match Self::reload(&mut conn, id) {
                Ok(_) => Err(JobStoreError::InvalidTransition {
                    id,
                    expected: JobStatus::Failed,
                }),
                Err(err) => Err(err),
            };
        }
        Self::reload(&mut conn, id)
    }
}
