//! Community matchup suggestions

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use scrumble_common::time;

use crate::db::{submissions, SubmissionInput};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /submit
pub async fn submit_matchup(
    State(state): State<AppState>,
    body: Result<Json<SubmissionInput>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(input) = body?;
    if let Some(field) = input.missing_field() {
        return Err(ApiError::BadRequest(format!("Missing required field: {}", field)));
    }

    let id = submissions::insert(&state.db, &input, time::now()).await?;
    info!(submission_id = %id, category = %input.category.trim(), "Submission stored");
    Ok(Json(json!({ "ok": true, "id": id })))
}
