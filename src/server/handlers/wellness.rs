//! Mood log handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::server::state::SharedState;
use crate::server::utils::{api_error, now_secs, require_user};

#[derive(Deserialize)]
pub struct CreateMoodLogRequest {
    mood: Option<String>,
    #[serde(default)]
    stress: i64,
    #[serde(default)]
    sleep: f64,
    #[serde(default)]
    notes: String,
}

pub async fn create_mood_log_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<CreateMoodLogRequest>,
) -> Response {
    let st = state.lock().await;
    // Owner comes from the token, never from the payload
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mood = req.mood.as_deref().unwrap_or("").trim();
    if mood.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "mood is required");
    }

    match st.storage.insert_mood_log(
        user.id,
        mood,
        req.stress,
        req.sleep,
        &req.notes,
        now_secs(),
    ) {
        Ok(log) => (StatusCode::CREATED, axum::Json(serde_json::json!(log))).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn list_mood_logs_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match st.storage.list_mood_logs(user.id) {
        Ok(logs) => (StatusCode::OK, axum::Json(serde_json::json!(logs))).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
