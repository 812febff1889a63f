//! WebSocket Module - Gateway real-time
//!
//! Upgrade HTTP -> WebSocket su `/ws` con parametri query
//! `token`, `send_id`, `platform_id` (opzionale `sdk_type`).
//! Il token deve decodificare esattamente l'identità dichiarata ed
//! essere ancora Normal nel token store. Cap globale sulle connessioni
//! e allow-list delle origin applicati prima dell'upgrade.

pub mod connection;
pub mod gateway;
pub mod handlers;
pub mod session;
pub mod usermap;

pub use gateway::{Gateway, PushTask, Pusher};
pub use session::Session;
pub use usermap::UserMap;

use crate::core::auth::validate_token;
use crate::core::state::AppState;
use crate::ws::connection::handle_socket;
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsConnectQuery {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub send_id: String,
    #[serde(default)]
    pub platform_id: Option<i32>,
    #[serde(default)]
    pub sdk_type: Option<String>,
}

/// Entry point dell'upgrade WebSocket.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(gateway) = state.gateway().cloned() else {
        return (StatusCode::SERVICE_UNAVAILABLE, "gateway unavailable").into_response();
    };

    // Cap globale, applicato all'upgrade: oltre il limite -> 503.
    if !gateway.can_accept() {
        warn!("connection limit exceeded");
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit exceeded").into_response();
    }

    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !state.config.origin_allowed(origin) {
            warn!(origin = %origin, "origin not allowed");
            return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
        }
    }

    if params.token.is_empty() || params.send_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing required parameters").into_response();
    }
    let platform_id = params.platform_id.unwrap_or(0);

    // Il subject decodificato deve coincidere con l'identità dichiarata.
    let claims = match validate_token(
        &params.token,
        &state.config.jwt_secret,
        &params.send_id,
        platform_id,
    ) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(send_id = %params.send_id, error = %e, "token validation failed");
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    };

    // Un token kickato/sloggato non apre sessioni.
    if !state
        .token_store
        .is_valid(&claims.user_id, claims.platform_id, &params.token)
    {
        debug!(user_id = %claims.user_id, "token not valid in token store");
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }

    let conn_id = Uuid::new_v4().to_string();
    let (session, outbound_rx, close_rx) = Session::new(
        claims.user_id,
        claims.platform_id,
        params.sdk_type.unwrap_or_default(),
        params.token.clone(),
        conn_id,
        state.config.ws_outbound_queue_size,
    );
    let session = Arc::new(session);

    ws.max_message_size(state.config.ws_max_message_size)
        .on_upgrade(move |socket| {
            handle_socket(socket, state, gateway, session, outbound_rx, close_rx)
        })
}
