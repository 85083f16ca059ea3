//! Axum router construction.

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::server::handlers;
use crate::server::state::SharedState;

/// Build the complete axum router with all API routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Registration & login
        .route("/register", post(handlers::accounts::register_handler))
        .route("/login", post(handlers::accounts::login_handler))
        // Account management
        .route("/userinfo", get(handlers::accounts::userinfo_handler))
        .route(
            "/update_user_info",
            put(handlers::accounts::update_user_info_handler),
        )
        .route(
            "/delete_account",
            delete(handlers::accounts::delete_account_handler),
        )
        .route("/me", get(handlers::accounts::me_handler))
        // Find & follow
        .route("/find_users", get(handlers::social::find_users_handler))
        .route("/follow/:user_id", post(handlers::social::follow_handler))
        .route(
            "/unfollow/:user_id",
            delete(handlers::social::unfollow_handler),
        )
        .route(
            "/followers/:user_id",
            get(handlers::social::followers_handler),
        )
        .route("/following", get(handlers::social::following_handler))
        // Posts
        .route(
            "/posts",
            get(handlers::posts::list_posts_handler).post(handlers::posts::create_post_handler),
        )
        .route(
            "/posts/:post_id",
            delete(handlers::posts::delete_post_handler),
        )
        // Messages
        .route(
            "/send_message",
            post(handlers::messages::send_message_handler),
        )
        .route(
            "/get_conversation/:username",
            get(handlers::messages::get_conversation_handler),
        )
        .route("/inbox", get(handlers::messages::inbox_handler))
        // Mood logs
        .route(
            "/moodlogs",
            get(handlers::wellness::list_mood_logs_handler)
                .post(handlers::wellness::create_mood_log_handler),
        )
        .with_state(state)
}
