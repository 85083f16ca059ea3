//! User search and follow-graph handlers.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::server::state::SharedState;
use crate::server::utils::{api_error, now_secs, require_user};

#[derive(Deserialize)]
pub struct FindUsersQuery {
    q: Option<String>,
}

pub async fn find_users_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<FindUsersQuery>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let query = params.q.as_deref().unwrap_or("").trim().to_string();
    match st.storage.search_users(&query) {
        Ok(users) => {
            st.log
                .info("user list fetched", &[("by", &user.username), ("q", &query)]);
            (StatusCode::OK, axum::Json(serde_json::json!(users))).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn follow_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let target = match st.storage.get_user(user_id) {
        Ok(Some(target)) => target,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    if user.id == target.id {
        return api_error(StatusCode::BAD_REQUEST, "you cannot follow yourself");
    }

    match st.storage.insert_follow(user.id, target.id, now_secs()) {
        Ok(true) => {
            st.log.info(
                "followed",
                &[("follower", &user.username), ("following", &target.username)],
            );
            let body = serde_json::json!({ "message": "Followed successfully." });
            (StatusCode::CREATED, axum::Json(body)).into_response()
        }
        Ok(false) => {
            let body = serde_json::json!({ "message": "Already following this user." });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn unfollow_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let target = match st.storage.get_user(user_id) {
        Ok(Some(target)) => target,
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    match st.storage.delete_follow(user.id, target.id) {
        Ok(true) => {
            st.log.info(
                "unfollowed",
                &[("follower", &user.username), ("following", &target.username)],
            );
            let body = serde_json::json!({ "message": "Unfollowed successfully." });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Ok(false) => api_error(StatusCode::BAD_REQUEST, "you are not following this user"),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn followers_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Response {
    let st = state.lock().await;
    if let Err(resp) = require_user(&st, &headers) {
        return resp;
    }

    match st.storage.get_user(user_id) {
        Ok(Some(_)) => {}
        Ok(None) => return api_error(StatusCode::NOT_FOUND, "user not found"),
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    match st.storage.list_followers(user_id) {
        Ok(followers) => {
            (StatusCode::OK, axum::Json(serde_json::json!(followers))).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn following_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match st.storage.list_following(user.id) {
        Ok(following) => {
            let body = serde_json::json!({ "following": following });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
