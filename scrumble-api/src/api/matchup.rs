//! Public matchup listings

use axum::{extract::State, Json};
use scrumble_common::models::{FutureFeed, HistoryFeed, MatchupFeed};
use scrumble_common::time;

use crate::db::matchups;
use crate::error::ApiResult;
use crate::AppState;

/// GET /matchup
pub async fn get_matchups(State(state): State<AppState>) -> ApiResult<Json<MatchupFeed>> {
    let matchups = matchups::active_matchups(&state.db, time::now()).await?;
    Ok(Json(MatchupFeed { matchups }))
}

/// GET /history
pub async fn get_history(State(state): State<AppState>) -> ApiResult<Json<HistoryFeed>> {
    let history = matchups::history(&state.db, time::now()).await?;
    Ok(Json(HistoryFeed { history }))
}

/// GET /future
pub async fn get_future(State(state): State<AppState>) -> ApiResult<Json<FutureFeed>> {
    let future = matchups::future(&state.db, time::now()).await?;
    Ok(Json(FutureFeed { future }))
}
