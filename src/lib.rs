pub mod accounts;
pub mod auth;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod db;
pub mod domains;
pub mod error;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod routes;
pub mod schema;
pub mod state;
pub mod tenants;

pub use pipeline::scheduler::{Scheduler, TickResult, MAX_ATTEMPTS};
pub use pipeline::{Orchestrator, PipelineError, SignupOutcome, SignupRequest, StepOutcome};
