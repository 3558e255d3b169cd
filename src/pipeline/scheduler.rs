//! The periodic retry loop.
//!
//! A tick pulls a bounded FIFO batch of non-terminal jobs and advances each
//! one, isolating failures per job. Retry state lives on the job row, not in
//! memory, so restarting the scheduler loses nothing.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{Orchestrator, StepOutcome};
use crate::clients::notifier::{notify_best_effort, Notifier};
use crate::jobs::{JobStore, JobStoreError};
use crate::models::{Job, JobStatus};

/// Handled failures per job before it is marked terminally failed.
pub const MAX_ATTEMPTS: i32 = 3;

#[derive(Debug, Clone, Serialize)]
pub struct TickResult {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn JobStore>,
    notifier: Arc<dyn Notifier>,
    batch_size: i64,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        batch_size: i64,
    ) -> Self {
        Self {
            orchestrator,
            store,
            notifier,
            batch_size,
        }
    }

    /// One scheduler pass: advance up to `batch_size` pending/scraping jobs,
    /// oldest first. Safe to call with no pending work.
    pub async fn tick(&self) -> Vec<TickResult> {
        let batch = match self.store.get_pending(self.batch_size).await {
            Ok(batch) => batch,
            Err(err) => {
                error!(error = %err, "failed to load pending jobs");
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(batch.len());
        for job in batch {
            results.push(self.advance_one(job).await);
        }
        results
    }

    /// Safety net for jobs stranded in `generating_email` with no email out
    /// the door (a crash between draft and send). Re-advancing reuses the
    /// persisted scrape result; the scrape is never re-run. Bounded like the
    /// tick, so a mass stranding drains over successive passes.
    pub async fn sweep_unsent(&self) -> Vec<TickResult> {
        let stranded = match self
            .store
            .get_by_status_and_email_sent(JobStatus::GeneratingEmail, false, self.batch_size)
            .await
        {
            Ok(jobs) => jobs,
            Err(err) => {
                error!(error = %err, "unsent sweep query failed");
                return Vec::new();
            }
        };

        if !stranded.is_empty() {
            info!(count = stranded.len(), "re-attempting delivery for stranded jobs");
        }

        let mut results = Vec::with_capacity(stranded.len());
        for job in stranded {
            results.push(self.advance_one(job).await);
        }
        results
    }

    /// Runs tick + sweep forever at `interval`. Intended for the scheduler
    /// binary; each pass is independent, so killing the loop is always safe.
    pub async fn run(&self, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "scheduler started");
        loop {
            let results = self.tick().await;
            if !results.is_empty() {
                info!(processed = results.len(), "tick complete");
            }
            self.sweep_unsent().await;
            tokio::time::sleep(interval).await;
        }
    }

    async fn advance_one(&self, job: Job) -> TickResult {
        match self.orchestrator.advance(&job).await {
            Ok(outcome) => TickResult {
                job_id: job.id,
                status: status_after(&job, &outcome),
                message: describe(&outcome),
            },
            Err(err) => self.handle_failure(job, err.to_string()).await,
        }
    }

    /// A thrown advance consumes retry budget; the job's status is left
    /// untouched until the ceiling is hit, so the next tick retries it.
    async fn handle_failure(&self, job: Job, message: String) -> TickResult {
        warn!(job_id = %job.id, error = %message, "job advance failed");

        let updated = match self.store.record_retry(job.id, &message).await {
            Ok(updated) => updated,
            Err(JobStoreError::Terminal(_)) => {
                // The job reached a terminal state between the advance and
                // the retry bookkeeping; whatever finished it wins.
                info!(job_id = %job.id, "job finished elsewhere, retry not recorded");
                return TickResult {
                    job_id: job.id,
                    status: job.status,
                    message: "job finished elsewhere, retry skipped".to_string(),
                };
            }
            Err(store_err) => {
                error!(job_id = %job.id, error = %store_err, "failed to record retry");
                return TickResult {
                    job_id: job.id,
                    status: job.status,
                    message: format!("advance failed, retry bookkeeping failed: {store_err}"),
                };
            }
        };

        if updated.retry_count >= MAX_ATTEMPTS {
            match self.store.mark_failed(job.id, &message).await {
                Ok(_) => {}
                Err(JobStoreError::Terminal(_)) => {
                    info!(job_id = %job.id, "job finished elsewhere, not marking failed");
                    return TickResult {
                        job_id: job.id,
                        status: job.status,
                        message: "job finished elsewhere, retry skipped".to_string(),
                    };
                }
                Err(store_err) => {
                    error!(job_id = %job.id, error = %store_err, "failed to mark job failed");
                }
            }
            notify_best_effort(
                self.notifier.as_ref(),
                &format!(
                    "Job for {} failed permanently after {} attempts: {message}",
                    job.email, updated.retry_count
                ),
            )
            .await;
            TickResult {
                job_id: job.id,
                status: JobStatus::Failed.as_str().to_string(),
                message: format!("failed after {} attempts: {message}", updated.retry_count),
            }
        } else {
            TickResult {
                job_id: job.id,
                status: job.status,
                message: format!(
                    "attempt {} failed, will retry: {message}",
                    updated.retry_count
                ),
            }
        }
    }
}

fn status_after(job: &Job, outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::ScrapeStarted | StepOutcome::StillScraping => {
            JobStatus::Scraping.as_str().to_string()
        }
        StepOutcome::Completed => JobStatus::Completed.as_str().to_string(),
        StepOutcome::Failed { .. } => JobStatus::Failed.as_str().to_string(),
        StepOutcome::Noop => job.status.clone(),
    }
}

fn describe(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::ScrapeStarted => "scrape started".to_string(),
        StepOutcome::StillScraping => "scrape still processing".to_string(),
        StepOutcome::Completed => "completed, email sent".to_string(),
        StepOutcome::Failed { reason } => format!("failed: {reason}"),
        StepOutcome::Noop => "no action (terminal)".to_string(),
    }
}
