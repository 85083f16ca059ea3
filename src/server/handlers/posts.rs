//! Activity feed handlers.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::server::state::SharedState;
use crate::server::utils::{api_error, now_secs, require_user};

#[derive(Deserialize)]
pub struct CreatePostRequest {
    #[serde(default)]
    content_text: String,
}

pub async fn create_post_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<CreatePostRequest>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let content_text = req.content_text.trim();
    if content_text.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "post content cannot be empty");
    }

    match st.storage.insert_post(user.id, content_text, now_secs()) {
        Ok(post) => (StatusCode::OK, axum::Json(serde_json::json!(post))).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Feed query: the caller's own posts plus posts by anyone they follow,
/// newest first.
pub async fn list_posts_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match st.storage.list_feed(user.id) {
        Ok(posts) => (StatusCode::OK, axum::Json(serde_json::json!(posts))).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn delete_post_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(post_id): Path<i64>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    // Ownership is folded into the lookup: someone else's post and a missing
    // post are indistinguishable here.
    match st.storage.delete_post(post_id, user.id) {
        Ok(true) => {
            let body = serde_json::json!({ "message": "Post deleted successfully." });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Ok(false) => api_error(StatusCode::NOT_FOUND, "post not found"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
