//! Wires the production collaborators together. Used by the server and
//! scheduler binaries; tests build their own orchestrator from fakes.

use std::sync::Arc;
use std::time::Duration;

use crate::accounts::{ApiKeyDirectory, PgApiKeyDirectory, PgUserDirectory};
use crate::auth::links::LoginLinkService;
use crate::clients::drafter::OpenAiDrafter;
use crate::clients::mailer::ResendMailer;
use crate::clients::notifier::{Notifier, NullNotifier, SlackNotifier};
use crate::clients::scraper::FirecrawlScraper;
use crate::config::AppConfig;
use crate::db::PgPool;
use crate::jobs::{JobStore, PgJobStore};
use crate::pipeline::scheduler::Scheduler;
use crate::pipeline::Orchestrator;
use crate::tenants::PgTenantDirectory;

pub struct Wiring {
    pub store: Arc<dyn JobStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
    pub api_keys: Arc<dyn ApiKeyDirectory>,
    pub links: LoginLinkService,
}

pub fn wire(config: &AppConfig, pool: PgPool) -> anyhow::Result<Wiring> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;

    let links = LoginLinkService::from_config(config);
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone()));
    let notifier: Arc<dyn Notifier> = match &config.slack_webhook_url {
        Some(webhook) => Arc::new(SlackNotifier::new(http.clone(), webhook.clone())),
        None => Arc::new(NullNotifier),
    };

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        Arc::new(PgTenantDirectory::new(pool.clone())),
        Arc::new(PgUserDirectory::new(pool.clone())),
        Arc::new(FirecrawlScraper::new(
            http.clone(),
            config.scraper_api_url.clone(),
            config.scraper_api_key.clone(),
        )),
        Arc::new(OpenAiDrafter::new(
            http.clone(),
            config.llm_api_url.clone(),
            config.llm_api_key.clone(),
            config.llm_model.clone(),
        )),
        Arc::new(ResendMailer::new(
            http.clone(),
            config.mail_api_url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
            links.clone(),
        )),
        notifier.clone(),
    ));

    let scheduler = Arc::new(Scheduler::new(
        orchestrator.clone(),
        store.clone(),
        notifier,
        config.scheduler_batch_size,
    ));

    Ok(Wiring {
        store,
        orchestrator,
        scheduler,
        api_keys: Arc::new(PgApiKeyDirectory::new(pool)),
        links,
    })
}
