//! Vote submission

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Deserialize;
use tracing::info;

use scrumble_common::models::{Side, VoteReceipt};
use scrumble_common::time;

use crate::db::{matchups, VoteError};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

const MAX_FINGERPRINT_LEN: usize = 128;

/// Vote body before validation; `side` stays a string so a bad value is a 400
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VoteBody {
    pub matchup_id: String,
    pub side: String,
    pub fingerprint: String,
}

/// POST /vote
pub async fn cast_vote(
    State(state): State<AppState>,
    body: Result<Json<VoteBody>, JsonRejection>,
) -> ApiResult<Json<VoteReceipt>> {
    let Json(body) = body?;

    let matchup_id = body.matchup_id.trim();
    let fingerprint = body.fingerprint.trim();
    if matchup_id.is_empty() || fingerprint.is_empty() || fingerprint.len() > MAX_FINGERPRINT_LEN {
        return Err(ApiError::BadRequest("Invalid vote".to_string()));
    }
    let side: Side = body
        .side
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid vote".to_string()))?;

    let tally = matchups::cast_vote(&state.db, matchup_id, side, fingerprint, time::now())
        .await
        .map_err(|e| match e {
            VoteError::NotOpen => ApiError::NotFound("Matchup not found or inactive".to_string()),
            VoteError::Duplicate => ApiError::Conflict("Already voted".to_string()),
            VoteError::Database(e) => ApiError::Database(e),
        })?;

    info!(matchup_id, side = %side, left = tally.left, right = tally.right, "Vote recorded");
    Ok(Json(VoteReceipt {
        success: true,
        votes: Some(tally),
    }))
}
