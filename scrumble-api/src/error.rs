//! HTTP error type for scrumble-api handlers
//!
//! Every failure is answered with `{"error": "..."}` and the matching status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scrumble_common::models::ErrorBody;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Wrong or missing admin key (403)
    #[error("Forbidden")]
    Forbidden,

    /// Resource not found or not open (404)
    #[error("{0}")]
    NotFound(String),

    /// Duplicate vote (409)
    #[error("{0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
