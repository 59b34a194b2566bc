//! Admin key check for `/admin/*` routes
//!
//! The key is sent as `x-admin-key: <key>` or `Authorization: Bearer <key>`.
//! With no key configured every admin request fails with 500 rather than
//! falling open.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(ADMIN_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

pub async fn admin_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = match state.admin_key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => return Err(ApiError::Internal("Admin key not configured".to_string())),
    };

    let authorized = matches!(presented_key(request.headers()), Some(key) if key == expected);
    if !authorized {
        warn!(path = %request.uri().path(), "Rejected admin request");
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_presented_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_key(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"));
        assert_eq!(presented_key(&headers), Some("s3cret"));

        headers.insert(ADMIN_KEY_HEADER, HeaderValue::from_static("other"));
        assert_eq!(presented_key(&headers), Some("other"));

        let mut basic = HeaderMap::new();
        basic.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(presented_key(&basic), None);
    }
}
