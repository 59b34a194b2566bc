//! Admin endpoints (behind [`crate::api::admin_middleware`])

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use scrumble_common::time;

use crate::db::{matchups, submissions, EntryInput, MatchupInput, MatchupWriteError};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /admin/matchup body
///
/// Entries given inline are created or updated. Otherwise the matchup's
/// `left_entry_id`/`right_entry_id` must name entries that already exist.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateMatchupBody {
    pub matchup: MatchupInput,
    pub left: Option<EntryInput>,
    pub right: Option<EntryInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActivateBody {
    pub matchup_id: String,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// POST /admin/matchup
pub async fn create_matchup(
    State(state): State<AppState>,
    body: Result<Json<CreateMatchupBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let matchup = body.matchup;

    let left_id = non_empty(matchup.left_entry_id.as_deref())
        .or_else(|| non_empty(body.left.as_ref().map(|e| e.id.as_str())));
    let right_id = non_empty(matchup.right_entry_id.as_deref())
        .or_else(|| non_empty(body.right.as_ref().map(|e| e.id.as_str())));

    let (left_id, right_id) = match (left_id, right_id) {
        (Some(l), Some(r))
            if !matchup.id.trim().is_empty()
                && !matchup.title.trim().is_empty()
                && !matchup.category.trim().is_empty() =>
        {
            (l, r)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "id, title, category, left_entry_id, right_entry_id are required".to_string(),
            ))
        }
    };

    let inline: Vec<&EntryInput> = body.left.iter().chain(body.right.iter()).collect();
    if inline
        .iter()
        .any(|e| e.id.trim().is_empty() || e.name.trim().is_empty())
    {
        return Err(ApiError::BadRequest("Entry id and name are required".to_string()));
    }

    matchups::save_matchup(&state.db, &matchup, &left_id, &right_id, &inline, time::now())
        .await
        .map_err(|e| match e {
            MatchupWriteError::MissingEntry(id) => ApiError::NotFound(format!("Entry not found: {}", id)),
            MatchupWriteError::Database(e) => ApiError::Database(e),
        })?;

    Ok(Json(json!({ "ok": true, "matchup_id": matchup.id })))
}

/// POST /admin/activate
pub async fn activate_matchup(
    State(state): State<AppState>,
    body: Result<Json<ActivateBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let matchup_id = body.matchup_id.trim();
    if matchup_id.is_empty() {
        return Err(ApiError::BadRequest("matchup_id is required".to_string()));
    }

    if !matchups::activate(&state.db, matchup_id).await? {
        return Err(ApiError::NotFound("Matchup not found".to_string()));
    }

    info!(matchup_id, "Matchup activated");
    Ok(Json(json!({ "ok": true, "active": matchup_id })))
}

/// GET /admin/submissions
pub async fn list_submissions(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let submissions = submissions::latest(&state.db).await?;
    Ok(Json(json!({ "submissions": submissions })))
}
