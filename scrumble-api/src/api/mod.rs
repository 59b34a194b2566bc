//! HTTP API handlers for scrumble-api

pub mod admin;
pub mod auth;
pub mod health;
pub mod matchup;
pub mod submit;
pub mod vote;

pub use admin::{activate_matchup, create_matchup, list_submissions};
pub use auth::admin_middleware;
pub use health::health_routes;
pub use matchup::{get_future, get_history, get_matchups};
pub use submit::submit_matchup;
pub use vote::cast_vote;

use axum::extract::rejection::JsonRejection;

use crate::error::ApiError;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
