use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use leadflow::accounts::UserDirectory;
use leadflow::clients::drafter::{DraftRequest, EmailDraft, EmailDrafter};
use leadflow::clients::mailer::{Mailer, OutboundEmail, SendReceipt};
use leadflow::clients::notifier::Notifier;
use leadflow::clients::scraper::{ScrapePoll, WebsiteData, WebsiteScraper};
use leadflow::jobs::{JobStore, JobStoreError, JobStoreResult, NewJobRequest};
use leadflow::models::{Job, JobStatus, User};
use leadflow::pipeline::scheduler::Scheduler;
use leadflow::pipeline::{Orchestrator, SignupOutcome, SignupRequest};
use leadflow::tenants::{DraftStyle, TenantDirectory};

/// In-memory job store mirroring the Postgres implementation's conditional
/// transition semantics, so pipeline tests run without a database.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    seq: AtomicUsize,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> JobStoreResult<Job>
    where
        F: FnOnce(&mut Job) -> JobStoreResult<()>,
    {
        let mut jobs = self.jobs.lock().await;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        apply(job)?;
        job.updated_at = Utc::now().naive_utc();
        Ok(job.clone())
    }
}

fn is_terminal(job: &Job) -> bool {
    job.status == JobStatus::Completed.as_str() || job.status == JobStatus::Failed.as_str()
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, request: NewJobRequest) -> JobStoreResult<Job> {
        // Monotonic created_at so FIFO ordering is deterministic even when
        // two jobs are created within the same clock tick.
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) as i64;
        let now = Utc::now().naive_utc() + Duration::milliseconds(seq);
        let job = Job {
            id: Uuid::new_v4(),
            email: request.email,
            name: request.name,
            domain: request.domain,
            status: JobStatus::Pending.as_str().to_string(),
            scrape_job_id: None,
            scrape_result: None,
            email_draft: None,
            email_sent: false,
            retry_count: 0,
            error_message: None,
            company_id: request.company_id,
            api_key_id: request.api_key_id,
            from_website: request.from_website,
            user_id: request.user_id,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        self.jobs.lock().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> JobStoreResult<Option<Job>> {
        Ok(self.jobs.lock().await.get(&id).cloned())
    }

    async fn get_pending(&self, limit: i64) -> JobStoreResult<Vec<Job>> {
        let jobs = self.jobs.lock().await;
        let mut pending: Vec<Job> = jobs
            .values()
            .filter(|job| {
                job.status == JobStatus::Pending.as_str()
                    || job.status == JobStatus::Scraping.as_str()
            })
            .cloned()
            .collect();
        pending.sort_by_key(|job| job.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn get_by_status(&self, status: JobStatus, limit: i64) -> JobStoreResult<Vec<Job>> {
        let jobs = self.jobs.lock().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|job| job.status == status.as_str())
            .cloned()
            .collect();
        matching.sort_by_key(|job| std::cmp::Reverse(job.updated_at));
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn get_by_status_and_email_sent(
        &self,
        status: JobStatus,
        email_sent: bool,
        limit: i64,
    ) -> JobStoreResult<Vec<Job>> {
        let jobs = self.jobs.lock().await;
        let mut matching: Vec<Job> = jobs
            .values()
            .filter(|job| job.status == status.as_str() && job.email_sent == email_sent)
            .cloned()
            .collect();
        matching.sort_by_key(|job| job.created_at);
        matching.truncate(limit as usize);
        Ok(matching)
    }

    async fn mark_scraping(&self, id: Uuid, scrape_job_id: &str) -> JobStoreResult<Job> {
        let scrape_job_id = scrape_job_id.to_string();
        self.update(id, |job| {
            if job.status != JobStatus::Pending.as_str() {
                return Err(JobStoreError::InvalidTransition {
                    id,
                    expected: JobStatus::Pending,
                });
            }
            job.status = JobStatus::Scraping.as_str().to_string();
            job.scrape_job_id = Some(scrape_job_id);
            Ok(())
        })
        .await
    }

    async fn mark_generating(&self, id: Uuid, result: &WebsiteData) -> JobStoreResult<Job> {
        let payload = serde_json::to_value(result)?;
        self.update(id, |job| {
            if job.status != JobStatus::Scraping.as_str() || job.scrape_result.is_some() {
                return Err(JobStoreError::InvalidTransition {
                    id,
                    expected: JobStatus::Scraping,
                });
            }
            job.status = JobStatus::GeneratingEmail.as_str().to_string();
            job.scrape_result = Some(payload);
            Ok(())
        })
        .await
    }

    async fn mark_completed(&self, id: Uuid, draft: &EmailDraft) -> JobStoreResult<Job> {
        let payload = serde_json::to_value(draft)?;
        self.update(id, |job| {
            if job.email_sent {
                return Err(JobStoreError::AlreadySent(id));
            }
            if job.status != JobStatus::GeneratingEmail.as_str() {
                return Err(JobStoreError::InvalidTransition {
                    id,
                    expected: JobStatus::GeneratingEmail,
                });
            }
            job.status = JobStatus::Completed.as_str().to_string();
            job.email_draft = Some(payload);
            job.email_sent = true;
            job.error_message = None;
            job.completed_at = Some(Utc::now().naive_utc());
            Ok(())
        })
        .await
    }

    async fn mark_failed(&self, id: Uuid, error_message: &str) -> JobStoreResult<Job> {
        let error_message = error_message.to_string();
        self.update(id, |job| {
            if is_terminal(job) {
                return Err(JobStoreError::Terminal(id));
            }
            job.status = JobStatus::Failed.as_str().to_string();
            job.error_message = Some(error_message);
            Ok(())
        })
        .await
    }

    async fn record_retry(&self, id: Uuid, error_message: &str) -> JobStoreResult<Job> {
        let error_message = error_message.to_string();
        self.update(id, |job| {
            if is_terminal(job) {
                return Err(JobStoreError::Terminal(id));
            }
            job.retry_count += 1;
            job.error_message = Some(error_message);
            Ok(())
        })
        .await
    }

    async fn reset_for_retry(&self, id: Uuid) -> JobStoreResult<Job> {
        self.update(id, |job| {
            if job.status != JobStatus::Failed.as_str() {
                return Err(JobStoreError::InvalidTransition {
                    id,
                    expected: JobStatus::Failed,
                });
            }
            job.status = JobStatus::Pending.as_str().to_string();
            job.retry_count = 0;
            job.error_message = None;
            Ok(())
        })
        .await
    }
}

#[derive(Default)]
pub struct FakeScraper {
    pub fail_start: AtomicBool,
    /// Domain whose scrape start should fail, when set (for isolation tests).
    pub fail_start_domain: Mutex<Option<String>>,
    pub polls: Mutex<VecDeque<ScrapePoll>>,
    pub start_calls: AtomicUsize,
    pub poll_calls: AtomicUsize,
}

impl FakeScraper {
    pub async fn script_polls(&self, polls: impl IntoIterator<Item = ScrapePoll>) {
        self.polls.lock().await.extend(polls);
    }
}

#[async_trait]
impl WebsiteScraper for FakeScraper {
    async fn start(&self, domain: &str) -> Result<String> {
        let call = self.start_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(anyhow!("scrape provider unavailable"));
        }
        if self.fail_start_domain.lock().await.as_deref() == Some(domain) {
            return Err(anyhow!("scrape provider unavailable for {domain}"));
        }
        Ok(format!("scrape-{call}"))
    }

    async fn poll(&self, _scrape_job_id: &str) -> Result<ScrapePoll> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .polls
            .lock()
            .await
            .pop_front()
            .unwrap_or(ScrapePoll::Processing))
    }
}

#[derive(Default)]
pub struct FakeDrafter {
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmailDrafter for FakeDrafter {
    async fn draft(&self, request: &DraftRequest) -> Result<EmailDraft> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("llm quota exhausted"));
        }
        Ok(EmailDraft {
            subject: format!("Hello {}", request.website.company_name),
            body: format!(
                "Hi {}, we noticed {} and would love to talk.",
                request.prospect_name, request.domain
            ),
        })
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub fail_send: AtomicBool,
    pub sent: Mutex<Vec<OutboundEmail>>,
    pub link_calls: AtomicUsize,
    pub send_calls: AtomicUsize,
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn auth_link(&self, email: &str) -> Result<String> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("https://app.test/api/auth/verify?token=for-{email}"))
    }

    async fn send(&self, email: &OutboundEmail) -> Result<SendReceipt> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(anyhow!("mail provider returned 503"));
        }
        self.sent.lock().await.push(email.clone());
        Ok(SendReceipt {
            message_id: Some(format!("msg-{}", self.send_calls.load(Ordering::SeqCst))),
        })
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub fail: AtomicBool,
    pub messages: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeNotifier {
    pub async fn messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn post(&self, text: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(anyhow!("webhook gone"));
        }
        self.messages.lock().await.push(text.to_string());
        Ok(())
    }
}

pub struct StaticTenants {
    pub style: DraftStyle,
}

impl Default for StaticTenants {
    fn default() -> Self {
        Self {
            style: DraftStyle::default(),
        }
    }
}

#[async_trait]
impl TenantDirectory for StaticTenants {
    async fn resolve(&self, _company_id: Option<Uuid>, _api_key_id: Option<Uuid>) -> DraftStyle {
        self.style.clone()
    }
}

#[derive(Default)]
pub struct FakeUsers {
    pub created: Mutex<Vec<String>>,
}

#[async_trait]
impl UserDirectory for FakeUsers {
    async fn find_or_create(&self, email: &str, name: &str) -> Result<User> {
        self.created.lock().await.push(email.to_string());
        Ok(User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            created_at: Utc::now().naive_utc(),
        })
    }
}

/// Everything a pipeline test needs, wired over the in-memory fakes.
#[allow(dead_code)]
pub struct TestPipeline {
    pub store: Arc<MemoryJobStore>,
    pub scraper: Arc<FakeScraper>,
    pub drafter: Arc<FakeDrafter>,
    pub mailer: Arc<FakeMailer>,
    pub notifier: Arc<FakeNotifier>,
    pub users: Arc<FakeUsers>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Scheduler,
}

#[allow(dead_code)]
impl TestPipeline {
    pub fn new() -> Self {
        Self::with_batch_size(5)
    }

    pub fn with_batch_size(batch_size: i64) -> Self {
        let store = Arc::new(MemoryJobStore::new());
        let scraper = Arc::new(FakeScraper::default());
        let drafter = Arc::new(FakeDrafter::default());
        let mailer = Arc::new(FakeMailer::default());
        let notifier = Arc::new(FakeNotifier::default());
        let users = Arc::new(FakeUsers::default());

        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            Arc::new(StaticTenants::default()),
            users.clone(),
            scraper.clone(),
            drafter.clone(),
            mailer.clone(),
            notifier.clone(),
        ));
        let scheduler = Scheduler::new(
            orchestrator.clone(),
            store.clone(),
            notifier.clone(),
            batch_size,
        );

        Self {
            store,
            scraper,
            drafter,
            mailer,
            notifier,
            users,
            orchestrator,
            scheduler,
        }
    }

    pub async fn signup(&self, email: &str, name: &str, from_website: bool) -> SignupOutcome {
        self.orchestrator
            .process_signup(SignupRequest {
                email: email.to_string(),
                name: name.to_string(),
                company_id: None,
                api_key_id: None,
                from_website,
            })
            .await
            .expect("signup failed")
    }

    /// Signup that must create a job; returns it.
    pub async fn signup_job(&self, email: &str, name: &str, from_website: bool) -> Job {
        match self.signup(email, name, from_website).await {
            SignupOutcome::Created(job) => job,
            SignupOutcome::Skipped { domain } => {
                panic!("signup unexpectedly skipped for {domain}")
            }
        }
    }

    pub async fn status_count(&self, status: JobStatus) -> usize {
        self.store
            .get_by_status(status, 100)
            .await
            .expect("store error")
            .len()
    }

    pub async fn job(&self, id: Uuid) -> Job {
        self.store
            .get(id)
            .await
            .expect("store error")
            .expect("job missing")
    }
}
