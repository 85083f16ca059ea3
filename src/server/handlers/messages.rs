//! Direct message handlers: send, conversation thread, inbox.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::server::state::SharedState;
use crate::server::utils::{api_error, now_secs, require_user};
use crate::storage::MessageRow;

#[derive(Deserialize)]
pub struct SendMessageRequest {
    receiver: Option<String>,
    content: Option<String>,
}

pub async fn send_message_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<SendMessageRequest>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let receiver_username = req.receiver.as_deref().unwrap_or("").trim();
    let content = req.content.as_deref().unwrap_or("");
    if receiver_username.is_empty() || content.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "both receiver and content are required",
        );
    }

    let receiver = match st.storage.get_user_by_username(receiver_username) {
        Ok(Some(receiver)) => receiver,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "receiver not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match st
        .storage
        .insert_message(user.id, receiver.id, content, now_secs())
    {
        Ok(message) => {
            let body = message_to_json(&message, &user.username, &receiver.username);
            (StatusCode::CREATED, axum::Json(body)).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn get_conversation_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let other = match st.storage.get_user_by_username(&username) {
        Ok(Some(other)) => other,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    // Oldest first; unread messages from the other user are marked read as
    // part of this call.
    match st.storage.conversation(user.id, other.id) {
        Ok(messages) => {
            let json: Vec<serde_json::Value> = messages
                .iter()
                .map(|m| {
                    if m.sender_id == user.id {
                        message_to_json(m, &user.username, &other.username)
                    } else {
                        message_to_json(m, &other.username, &user.username)
                    }
                })
                .collect();
            (StatusCode::OK, axum::Json(serde_json::json!(json))).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn inbox_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match st.storage.inbox(user.id) {
        Ok(entries) => (StatusCode::OK, axum::Json(serde_json::json!(entries))).into_response(),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn message_to_json(
    m: &MessageRow,
    sender_username: &str,
    receiver_username: &str,
) -> serde_json::Value {
    serde_json::json!({
        "id": m.id,
        "sender_id": m.sender_id,
        "sender_username": sender_username,
        "receiver_id": m.receiver_id,
        "receiver_username": receiver_username,
        "content": m.content,
        "timestamp": m.timestamp,
        "is_read": m.is_read,
    })
}
