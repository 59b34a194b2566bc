//! scrumble-api library - matchup, vote and submission HTTP service

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Key required by `/admin/*`; `None` disables those routes
    pub admin_key: Option<String>,
}

impl AppState {
    pub fn new(db: SqlitePool, admin_key: Option<String>) -> Self {
        Self { db, admin_key }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let admin = Router::new()
        .route("/admin/matchup", post(api::create_matchup))
        .route("/admin/activate", post(api::activate_matchup))
        .route("/admin/submissions", get(api::list_submissions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::admin_middleware,
        ));

    let public = Router::new()
        .route("/matchup", get(api::get_matchups))
        .route("/vote", post(api::cast_vote))
        .route("/history", get(api::get_history))
        .route("/future", get(api::get_future))
        .route("/submit", post(api::submit_matchup))
        .merge(api::health_routes());

    Router::new()
        .merge(admin)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
