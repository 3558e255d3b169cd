use std::sync::Arc;

use crate::accounts::ApiKeyDirectory;
use crate::auth::links::LoginLinkService;
use crate::config::AppConfig;
use crate::jobs::JobStore;
use crate::pipeline::scheduler::Scheduler;
use crate::pipeline::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn JobStore>,
    pub orchestrator: Arc<Orchestrator>,
    pub scheduler: Arc<Scheduler>,
    pub api_keys: Arc<dyn ApiKeyDirectory>,
    pub links: LoginLinkService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn JobStore>,
        orchestrator: Arc<Orchestrator>,
        scheduler: Arc<Scheduler>,
        api_keys: Arc<dyn ApiKeyDirectory>,
        links: LoginLinkService,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            orchestrator,
            scheduler,
            api_keys,
            links,
        }
    }
}
