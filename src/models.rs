use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::*;

/// Lifecycle of an enrichment job.
///
/// Transitions are monotonic along
/// `pending -> scraping -> generating_email -> completed | failed`;
/// the only way back is an operator-triggered reset of a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Scraping,
    GeneratingEmail,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scraping => "scraping",
            JobStatus::GeneratingEmail => "generating_email",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(JobStatus::Pending),
            "scraping" => Ok(JobStatus::Scraping),
            "generating_email" => Ok(JobStatus::GeneratingEmail),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub domain: String,
    pub status: String,
    pub scrape_job_id: Option<String>,
    pub scrape_result: Option<serde_json::Value>,
    pub email_draft: Option<serde_json::Value>,
    pub email_sent: bool,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub company_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub from_website: bool,
    pub user_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Job {
    /// Parsed view of the stored status column. Rows only ever hold values
    /// written through [`JobStatus::as_str`], so an unknown value is a bug.
    pub fn job_status(&self) -> Result<JobStatus, String> {
        self.status.parse()
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub domain: String,
    pub status: String,
    pub company_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub from_website: bool,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = companies)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub email_tone: Option<String>,
    pub email_style: Option<String>,
    pub max_words: Option<i32>,
    pub prompt_template: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = api_keys)]
#[diesel(belongs_to(Company))]
pub struct ApiKey {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub key_hash: String,
    pub label: String,
    pub active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = api_keys)]
pub struct NewApiKey {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub key_hash: String,
    pub label: String,
    pub active: bool,
}
