use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VerifyParams {
    pub token: String,
}

/// Exchanges a one-time login-link token (from the outreach email) for a
/// session token.
pub async fn verify_login_link(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> AppResult<Json<serde_json::Value>> {
    let claims = state
        .links
        .verify_login_token(&params.token)
        .map_err(|_| AppError::unauthorized())?;

    let session = state.links.issue_session_token(&claims.sub)?;
    Ok(Json(json!({ "email": claims.sub, "token": session })))
}
