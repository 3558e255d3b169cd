use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::pipeline::JobStatusView;
use crate::routes::signups::JobCreatedResponse;
use crate::state::AppState;

/// Coarse status projection for polling UIs.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JobStatusView>> {
    let view = state
        .orchestrator
        .get_status(id)
        .await?
        .ok_or_else(AppError::not_found)?;
    Ok(Json(view))
}

/// Operator action: reset a failed job to pending.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<JobCreatedResponse>> {
    let job = state.orchestrator.retry_job(id).await?;
    Ok(Json(JobCreatedResponse::from(job)))
}

/// Manual scheduler trigger, the same pass the scheduler binary runs
/// periodically. Returns per-job results; empty when there is no work.
pub async fn run_tick(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let processed = state.scheduler.tick().await;
    Ok(Json(json!({ "processed": processed })))
}
