//! ironrelay - Backend di instant messaging real-time
//!
//! Espone i moduli principali e il router dell'applicazione; i test di
//! integrazione montano il router su uno stato costruito ad hoc.

pub mod config;
pub mod core;
pub mod dtos;
pub mod entities;
pub mod hot;
pub mod repositories;
pub mod services;
pub mod ws;

// Re-export dei tipi principali per facilitare l'import
pub use crate::config::Config;
pub use crate::core::{ApiResponse, AppState, ChatError};

use crate::core::authentication_middleware;
use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;

/// Crea il router principale dell'applicazione
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", configure_auth_routes(state.clone()))
        .nest("/user", configure_user_routes(state.clone()))
        .nest("/group", configure_group_routes(state.clone()))
        .nest("/msg", configure_msg_routes(state.clone()))
        .nest("/conversation", configure_conversation_routes(state.clone()))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Routes di autenticazione: register/login pubbliche, logout protette
fn configure_auth_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::services::auth::*;

    let public_routes = Router::new()
        .route("/register", post(register_handler))
        .route("/login", post(login_handler));

    let protected_routes = Router::new()
        .route("/logout", post(logout_handler))
        .route("/force_logout", post(force_logout_handler))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ));

    public_routes.merge(protected_routes)
}

fn configure_user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::services::user::*;

    Router::new()
        .route("/info", get(my_info_handler))
        .route("/profile/{user_id}", get(profile_handler))
        .route("/update", put(update_handler))
        .route("/batch_info", post(batch_info_handler))
        .route("/get_users_online_status", post(online_status_handler))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_group_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::services::group::*;

    Router::new()
        .route("/create", post(create_group_handler))
        .route("/join", post(join_group_handler))
        .route("/quit", post(quit_group_handler))
        .route("/dismiss", post(dismiss_group_handler))
        .route("/info", get(group_info_handler))
        .route("/members", get(group_members_handler))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_msg_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::services::message::*;

    Router::new()
        .route("/send", post(send_message_handler))
        .route("/pull", get(pull_messages_handler))
        .route("/max_seq", get(get_max_seq_handler))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}

fn configure_conversation_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::services::conversation::*;

    Router::new()
        .route("/list", get(list_handler))
        .route("/info", get(info_handler))
        .route("/update", put(update_handler))
        .route("/mark_read", post(mark_read_handler))
        .route("/max_read_seq", get(max_read_seq_handler))
        .route("/unread_count", get(unread_count_handler))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}
