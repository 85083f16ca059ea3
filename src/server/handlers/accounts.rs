//! Account handlers: registration, login, user info, account deletion.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::auth::{generate_token, hash_password, verify_password};
use crate::server::state::SharedState;
use crate::server::utils::{api_error, now_secs, require_user};
use crate::storage::StorageError;

#[derive(Deserialize)]
pub struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

pub async fn register_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<RegisterRequest>,
) -> Response {
    let username = req.username.as_deref().unwrap_or("").trim().to_string();
    let email = req.email.as_deref().unwrap_or("").trim().to_string();
    let password = req.password.as_deref().unwrap_or("");

    if username.is_empty() || email.is_empty() || password.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "all fields required");
    }

    let st = state.lock().await;

    match st.storage.username_exists(&username) {
        Ok(true) => return api_error(StatusCode::BAD_REQUEST, "username already exists"),
        Ok(false) => {}
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
    match st.storage.email_exists(&email) {
        Ok(true) => return api_error(StatusCode::BAD_REQUEST, "email already registered"),
        Ok(false) => {}
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }

    // The unique constraint closes the race left open by the checks above:
    // a concurrent register with the same name lands here as AlreadyExists.
    let password_hash = hash_password(password);
    match st
        .storage
        .create_user(&username, &email, &password_hash, now_secs())
    {
        Ok(user) => {
            st.log.info(
                "user registered",
                &[("username", &user.username), ("email", &user.email)],
            );
            let body = serde_json::json!({
                "message": format!("User \"{username}\" created successfully"),
            });
            (StatusCode::CREATED, axum::Json(body)).into_response()
        }
        Err(StorageError::AlreadyExists(msg)) => api_error(StatusCode::BAD_REQUEST, msg),
        Err(e) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    username: Option<String>,
    password: Option<String>,
}

pub async fn login_handler(
    State(state): State<SharedState>,
    axum::Json(req): axum::Json<LoginRequest>,
) -> Response {
    let login_input = req.username.as_deref().unwrap_or("").trim();
    let password = req.password.as_deref().unwrap_or("");

    if login_input.is_empty() || password.is_empty() {
        return api_error(
            StatusCode::BAD_REQUEST,
            "both username/email and password are required",
        );
    }

    let st = state.lock().await;

    // The login field doubles as an email address
    let lookup = if login_input.contains('@') {
        st.storage.get_user_by_email(login_input)
    } else {
        st.storage.get_user_by_username(login_input)
    };

    // Unknown user and wrong password produce the same answer
    let user = match lookup {
        Ok(Some(user)) => user,
        Ok(None) => {
            return api_error(
                StatusCode::UNAUTHORIZED,
                "invalid username/email or password",
            )
        }
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    if !verify_password(password, &user.password_hash) {
        return api_error(
            StatusCode::UNAUTHORIZED,
            "invalid username/email or password",
        );
    }

    let access = generate_token();
    let refresh = generate_token();
    let now = now_secs();
    if let Err(e) = st
        .storage
        .insert_session(&access, user.id, "access", now)
        .and_then(|_| st.storage.insert_session(&refresh, user.id, "refresh", now))
    {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    st.log.info(
        "user logged in",
        &[("username", &user.username), ("email", &user.email)],
    );

    let body = serde_json::json!({
        "access": access,
        "refresh": refresh,
        "user": user.username,
    });
    (StatusCode::OK, axum::Json(body)).into_response()
}

pub async fn userinfo_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    // Missing profile never errors: fields default to empty strings
    let profile = st.storage.get_profile(user.id).ok().flatten();
    let body = serde_json::json!({
        "username": user.username,
        "email": user.email,
        "bio": profile.as_ref().map(|p| p.bio.as_str()).unwrap_or(""),
        "mood_preference": profile.as_ref().map(|p| p.mood_preference.as_str()).unwrap_or(""),
    });
    (StatusCode::OK, axum::Json(body)).into_response()
}

#[derive(Deserialize)]
pub struct UpdateUserInfoRequest {
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    bio: String,
    #[serde(default)]
    mood: String,
}

pub async fn update_user_info_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<UpdateUserInfoRequest>,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let new_name = req.name.as_deref().unwrap_or("").trim().to_string();
    let new_email = req.email.as_deref().unwrap_or("").trim().to_string();
    if new_name.is_empty() || new_email.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "name and email are required");
    }

    match st.storage.update_user(user.id, &new_name, &new_email) {
        Ok(()) => {}
        Err(StorageError::AlreadyExists(msg)) => {
            return api_error(StatusCode::BAD_REQUEST, msg)
        }
        Err(e) => return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
    if let Err(e) = st.storage.upsert_profile(user.id, &req.bio, &req.mood) {
        return api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    st.log.info(
        "user profile updated",
        &[
            ("old_username", &user.username),
            ("new_username", &new_name),
            ("old_email", &user.email),
            ("new_email", &new_email),
            ("bio", &req.bio),
            ("mood", &req.mood),
        ],
    );

    let body = serde_json::json!({ "message": "Profile updated successfully." });
    (StatusCode::OK, axum::Json(body)).into_response()
}

pub async fn delete_account_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    // Sessions cascade with the user row, but clearing them first means a
    // failed delete cannot leave tokens pointing at a half-removed account.
    let deleted = st
        .storage
        .delete_sessions_for_user(user.id)
        .and_then(|_| st.storage.delete_user(user.id));

    match deleted {
        Ok(true) => {
            st.log.info("account deleted", &[("username", &user.username)]);
            let body = serde_json::json!({ "message": "Account deleted." });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
        Ok(false) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "account deletion failed",
        ),
        Err(e) => {
            st.log.error(
                "account deletion failed",
                &[("username", &user.username), ("error", &e.to_string())],
            );
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "account deletion failed")
        }
    }
}

pub async fn me_handler(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    let st = state.lock().await;
    let user = match require_user(&st, &headers) {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let body = serde_json::json!({
        "id": user.id,
        "username": user.username,
        "email": user.email,
    });
    (StatusCode::OK, axum::Json(body)).into_response()
}
