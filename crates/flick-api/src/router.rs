use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::state::AppState;
use crate::{auth, chats, friends, messages, users};

async fn health() -> &'static str {
    "ok"
}

/// Full HTTP surface: `/health` plus the versioned API under `/v1`.
/// Everything except registration and login sits behind the bearer gate.
pub fn build(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/users/profile", get(users::get_profile))
        .route("/users/pfp", put(users::update_pfp))
        .route("/users/pfp/delete", put(users::reset_pfp))
        .route("/users/display-name", put(users::update_display_name))
        .route("/users/password", put(users::update_password))
        .route("/friends", get(friends::list_friends))
        .route("/friends/requests/received", get(friends::received_requests))
        .route("/friends/requests/sent", get(friends::sent_requests))
        .route("/friends/requests/send", post(friends::send_request))
        .route("/friends/requests/{id}/accept", post(friends::accept_request))
        .route("/friends/requests/{id}/delete", post(friends::delete_request))
        .route("/chats", get(chats::list_chats).post(chats::create_chat))
        .route("/chats/{id}/read", post(chats::mark_read))
        .route("/chats/{id}/typing/{status}", post(chats::set_typing))
        .route(
            "/chats/{id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), crate::middleware::require_auth));

    Router::new()
        .route("/health", get(health))
        .nest("/v1", public_routes.merge(protected_routes))
        .with_state(state)
}
