//! Shared helpers for the HTTP handlers.

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::auth::parse_bearer;
use crate::server::state::AppState;
use crate::storage::UserRow;

/// Build a standard JSON error response.
pub fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    (status, axum::Json(body)).into_response()
}

/// Resolve the caller from the `Authorization: Bearer <token>` header.
/// Any failure maps to a ready-to-return 401 response.
pub fn require_user(st: &AppState, headers: &HeaderMap) -> Result<UserRow, Response> {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "authentication required",
        ));
    };
    let Some(token) = parse_bearer(value) else {
        return Err(api_error(
            StatusCode::UNAUTHORIZED,
            "invalid authorization header",
        ));
    };
    match st.storage.session_user(token) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(api_error(StatusCode::UNAUTHORIZED, "invalid token")),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// Current time as seconds since UNIX epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
