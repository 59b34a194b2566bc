//! Health check endpoint

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
///
/// Does not touch the database and needs no admin key.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "scrumble-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
