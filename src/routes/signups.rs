use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::Job;
use crate::pipeline::{SignupOutcome, SignupRequest};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub name: String,
}

#[derive(Serialize)]
pub struct JobCreatedResponse {
    pub job_id: Uuid,
    pub status: String,
    pub domain: String,
}

impl From<Job> for JobCreatedResponse {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            domain: job.domain,
        }
    }
}

/// Public web-form signup. Web-form prospects get a user account and an auth
/// link in the outreach email.
pub async fn create_signup(
    State(state): State<AppState>,
    Json(body): Json<SignupBody>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let outcome = state
        .orchestrator
        .process_signup(SignupRequest {
            email: body.email,
            name: body.name,
            company_id: None,
            api_key_id: None,
            from_website: true,
        })
        .await?;

    respond(outcome)
}

/// Partner API signup, authenticated by `X-Api-Key`. Attribution from the
/// key selects the tenant's draft style.
pub async fn partner_signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SignupBody>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    let raw_key = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(AppError::unauthorized)?;

    let api_key = state
        .api_keys
        .authenticate(raw_key)
        .await?
        .ok_or_else(AppError::unauthorized)?;

    let outcome = state
        .orchestrator
        .process_signup(SignupRequest {
            email: body.email,
            name: body.name,
            company_id: api_key.company_id,
            api_key_id: Some(api_key.id),
            from_website: false,
        })
        .await?;

    respond(outcome)
}

fn respond(outcome: SignupOutcome) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    match outcome {
        SignupOutcome::Skipped { domain } => Ok((
            StatusCode::OK,
            Json(json!({ "status": "skipped", "domain": domain })),
        )),
        SignupOutcome::Created(job) => {
            let response = JobCreatedResponse::from(job);
            Ok((StatusCode::CREATED, Json(serde_json::to_value(response)?)))
        }
    }
}
