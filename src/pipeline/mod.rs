//! The enrichment pipeline: signup intake and the job state machine.
//!
//! `Orchestrator::advance` drives a single job one step along
//! `pending -> scraping -> generating_email -> completed | failed` by calling
//! the collaborator whose turn it is and persisting the resulting transition.
//! There is no queue beyond the job rows themselves; the scheduler
//! (`pipeline::scheduler`) re-discovers all in-flight work from the store on
//! every tick, which is what makes the pipeline crash-safe.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clients::drafter::{fallback_draft, DraftRequest, EmailDraft, EmailDrafter};
use crate::clients::mailer::{Mailer, OutboundEmail};
use crate::clients::notifier::{notify_best_effort, Notifier};
use crate::clients::scraper::{ScrapePoll, WebsiteData, WebsiteScraper};
use crate::domains::{classify, ClassifyError};
use crate::jobs::{JobStore, JobStoreError, NewJobRequest};
use crate::models::{Job, JobStatus};
use crate::tenants::TenantDirectory;
use crate::accounts::UserDirectory;

pub mod scheduler;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    InvalidSignup(#[from] ClassifyError),
    #[error("account provisioning failed: {0}")]
    Account(anyhow::Error),
    #[error("scrape start failed: {0}")]
    ScrapeStart(anyhow::Error),
    #[error("scrape poll failed: {0}")]
    ScrapePoll(anyhow::Error),
    #[error("job {0} is in scraping state without a scrape job id")]
    MissingScrapeJob(Uuid),
    #[error("email delivery failed: {0}")]
    Delivery(anyhow::Error),
    #[error("job has corrupt status: {0}")]
    CorruptStatus(String),
    #[error(transparent)]
    Store(#[from] JobStoreError),
}

/// What a single `advance` call did to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    ScrapeStarted,
    StillScraping,
    Completed,
    Failed { reason: String },
    /// The job was already terminal; nothing was called, nothing changed.
    Noop,
}

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub company_id: Option<Uuid>,
    pub api_key_id: Option<Uuid>,
    pub from_website: bool,
}

#[derive(Debug)]
pub enum SignupOutcome {
    /// Free-provider address: no job row is created.
    Skipped { domain: String },
    Created(Job),
}

/// Read-only projection served to polling UIs.
#[derive(Debug, Serialize)]
pub struct JobStatusView {
    pub id: Uuid,
    pub status: String,
    pub email: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_draft: Option<EmailDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    tenants: Arc<dyn TenantDirectory>,
    users: Arc<dyn UserDirectory>,
    scraper: Arc<dyn WebsiteScraper>,
    drafter: Arc<dyn EmailDrafter>,
    mailer: Arc<dyn Mailer>,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        tenants: Arc<dyn TenantDirectory>,
        users: Arc<dyn UserDirectory>,
        scraper: Arc<dyn WebsiteScraper>,
        drafter: Arc<dyn EmailDrafter>,
        mailer: Arc<dyn Mailer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            tenants,
            users,
            scraper,
            drafter,
            mailer,
            notifier,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Inbound entry point: gate on the email's domain, provision a user for
    /// web-form signups, and create the pending job.
    pub async fn process_signup(
        &self,
        request: SignupRequest,
    ) -> Result<SignupOutcome, PipelineError> {
        let classification = classify(&request.email)?;
        if classification.is_free_provider {
            info!(domain = %classification.domain, "skipping signup from free mail provider");
            return Ok(SignupOutcome::Skipped {
                domain: classification.domain,
            });
        }

        let user_id = if request.from_website {
            let user = self
                .users
                .find_or_create(&request.email, &request.name)
                .await
                .map_err(PipelineError::Account)?;
            Some(user.id)
        } else {
            None
        };

        let job = self
            .store
            .create(NewJobRequest {
                email: request.email,
                name: request.name,
                domain: classification.domain,
                company_id: request.company_id,
                api_key_id: request.api_key_id,
                from_website: request.from_website,
                user_id,
            })
            .await?;

        info!(job_id = %job.id, domain = %job.domain, "created enrichment job");
        notify_best_effort(
            self.notifier.as_ref(),
            &format!("New signup: {} <{}> ({})", job.name, job.email, job.domain),
        )
        .await;

        Ok(SignupOutcome::Created(job))
    }

    /// Drives `job` one step. Collaborator failures surface as errors for the
    /// scheduler's retry bookkeeping; failures *reported* by a collaborator
    /// (the scrape provider saying "failed") terminalize the job directly.
    pub async fn advance(&self, job: &Job) -> Result<StepOutcome, PipelineError> {
        let status = job.job_status().map_err(PipelineError::CorruptStatus)?;
        match status {
            JobStatus::Pending => self.start_scrape(job).await,
            JobStatus::Scraping => self.check_scrape(job).await,
            JobStatus::GeneratingEmail => self.draft_and_send(job).await,
            JobStatus::Completed | JobStatus::Failed => Ok(StepOutcome::Noop),
        }
    }

    /// Operator action: failed -> pending with retry bookkeeping cleared.
    pub async fn retry_job(&self, id: Uuid) -> Result<Job, PipelineError> {
        let job = self.store.reset_for_retry(id).await?;
        info!(job_id = %job.id, "job reset for retry");
        Ok(job)
    }

    pub async fn get_status(&self, id: Uuid) -> Result<Option<JobStatusView>, PipelineError> {
        let Some(job) = self.store.get(id).await? else {
            return Ok(None);
        };
        let email_draft = job
            .email_draft
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok());
        Ok(Some(JobStatusView {
            id: job.id,
            status: job.status,
            email: job.email,
            domain: job.domain,
            email_draft,
            error_message: job.error_message,
        }))
    }

    async fn start_scrape(&self, job: &Job) -> Result<StepOutcome, PipelineError> {
        let scrape_job_id = self
            .scraper
            .start(&job.domain)
            .await
            .map_err(PipelineError::ScrapeStart)?;
        self.store.mark_scraping(job.id, &scrape_job_id).await?;
        info!(job_id = %job.id, %scrape_job_id, "scrape started");
        Ok(StepOutcome::ScrapeStarted)
    }

    async fn check_scrape(&self, job: &Job) -> Result<StepOutcome, PipelineError> {
        let scrape_job_id = job
            .scrape_job_id
            .as_deref()
            .ok_or(PipelineError::MissingScrapeJob(job.id))?;

        match self
            .scraper
            .poll(scrape_job_id)
            .await
            .map_err(PipelineError::ScrapePoll)?
        {
            ScrapePoll::Processing => Ok(StepOutcome::StillScraping),
            ScrapePoll::Failed(reason) => {
                self.store.mark_failed(job.id, &reason).await?;
                warn!(job_id = %job.id, %reason, "scrape reported failure");
                notify_best_effort(
                    self.notifier.as_ref(),
                    &format!("Enrichment failed for {}: {reason}", job.email),
                )
                .await;
                Ok(StepOutcome::Failed { reason })
            }
            ScrapePoll::Completed(raw) => {
                let website = WebsiteData::from_raw(&job.domain, &raw);
                let updated = self.store.mark_generating(job.id, &website).await?;
                info!(job_id = %job.id, company = %website.company_name, "scrape completed");
                // The draft step runs in the same call so a finished scrape
                // reaches `completed` without waiting for another tick.
                self.draft_and_send(&updated).await
            }
        }
    }

    async fn draft_and_send(&self, job: &Job) -> Result<StepOutcome, PipelineError> {
        // The caller's snapshot may predate another pass that already
        // delivered; the send guard must read the store, not the snapshot.
        let job = self
            .store
            .get(job.id)
            .await?
            .ok_or(JobStoreError::NotFound(job.id))?;

        // email_sent only ever flips false -> true; once set, delivery must
        // never run again no matter how many times this step is replayed.
        if job.email_sent {
            return Ok(StepOutcome::Completed);
        }
        if job.job_status().map_err(PipelineError::CorruptStatus)? != JobStatus::GeneratingEmail {
            return Ok(StepOutcome::Noop);
        }

        let website = job
            .scrape_result
            .as_ref()
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_else(|| WebsiteData::empty(&job.domain));

        let style = self.tenants.resolve(job.company_id, job.api_key_id).await;
        let request = DraftRequest {
            prospect_name: job.name.clone(),
            prospect_email: job.email.clone(),
            domain: job.domain.clone(),
            website,
            style,
        };

        let draft = match self.drafter.draft(&request).await {
            Ok(draft) => draft,
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "draft generation failed, using fallback");
                fallback_draft(&job.name, &job.domain)
            }
        };

        let auth_link = if job.from_website {
            Some(
                self.mailer
                    .auth_link(&job.email)
                    .await
                    .map_err(PipelineError::Delivery)?,
            )
        } else {
            None
        };

        let receipt = self
            .mailer
            .send(&OutboundEmail {
                to: job.email.clone(),
                to_name: job.name.clone(),
                draft: draft.clone(),
                auth_link,
            })
            .await
            .map_err(PipelineError::Delivery)?;

        match self.store.mark_completed(job.id, &draft).await {
            Ok(_) => {}
            Err(JobStoreError::AlreadySent(_)) => {
                warn!(job_id = %job.id, "email flag was already set after send; duplicate delivery suspected");
            }
            Err(err) => return Err(err.into()),
        }

        info!(job_id = %job.id, message_id = ?receipt.message_id, "outreach email sent");
        notify_best_effort(
            self.notifier.as_ref(),
            &format!("Outreach email sent to {} <{}>", job.name, job.email),
        )
        .await;

        Ok(StepOutcome::Completed)
    }
}
