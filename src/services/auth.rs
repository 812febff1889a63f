//! Auth service - Registrazione, login e governance dei token
//!
//! Al login il nuovo token entra come Normal e ogni altro token Normal
//! della stessa coppia (utente, piattaforma) viene marcato Kicked;
//! le sessioni WebSocket corrispondenti ricevono il frame 2002 e
//! vengono chiuse (policy single-device-per-platform).

use crate::core::auth::{generate_token, AuthUser};
use crate::core::error::ChatError;
use crate::core::response::ApiResponse;
use crate::core::state::AppState;
use crate::dtos::auth::{LoginRequest, LoginResponse, RegisterRequest};
use crate::dtos::user::UserInfo;
use crate::entities::User;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[instrument(skip(state, req))]
pub async fn register(state: &AppState, req: &RegisterRequest) -> Result<UserInfo, ChatError> {
    req.validate()?;

    let user_id = match &req.user_id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => Uuid::new_v4().to_string(),
    };

    if state.user.exists(&user_id).await? {
        return Err(ChatError::user_exists());
    }

    let hashed = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ChatError::internal_server().with_details(e.to_string()))?;

    let now = crate::core::consts::now_unix_milli();
    let user = User {
        id: user_id.clone(),
        nickname: req.nickname.clone(),
        avatar: req.avatar.clone().unwrap_or_default(),
        password: hashed,
        extra: None,
        created_at: now,
        updated_at: now,
    };
    state.user.create(&user).await?;

    info!(user_id = %user_id, "user registered");
    Ok(UserInfo::from(user))
}

#[instrument(skip(state, req), fields(user_id = %req.user_id, platform_id = req.platform_id))]
pub async fn login(state: &AppState, req: &LoginRequest) -> Result<LoginResponse, ChatError> {
    req.validate()?;

    let user = state
        .user
        .get_by_id(&req.user_id)
        .await?
        .ok_or_else(ChatError::user_not_found)?;

    let ok = bcrypt::verify(&req.password, &user.password)
        .map_err(|e| ChatError::internal_server().with_details(e.to_string()))?;
    if !ok {
        return Err(ChatError::password_wrong());
    }

    let token = generate_token(
        &user.id,
        req.platform_id,
        &state.config.jwt_secret,
        state.config.jwt_expire_hours,
    )?;

    state.token_store.store(&user.id, req.platform_id, &token);

    // Single device per platform: gli altri token Normal vengono
    // kickati e le loro sessioni online chiuse con il frame 2002.
    let kicked = state
        .token_store
        .kick_others(&user.id, req.platform_id, &token);
    if !kicked.is_empty() {
        warn!(kicked = kicked.len(), "kicked tokens on re-login");
        if let Some(gateway) = state.gateway() {
            gateway.kick_sessions(&user.id, Some(req.platform_id), Some(&token));
        }
    }

    info!("user logged in");
    Ok(LoginResponse {
        token,
        user_info: UserInfo::from(user),
    })
}

// ------------------------- HTTP handlers -------------------------

/// POST /auth/register
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ChatError> {
    let info = register(&state, &req).await?;
    Ok(Json(ApiResponse::ok(info)))
}

/// POST /auth/login
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ChatError> {
    let resp = login(&state, &req).await?;
    Ok(Json(ApiResponse::ok(resp)))
}

/// POST /auth/logout - invalida il token presentato.
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    state
        .token_store
        .invalidate(&auth.user_id, auth.platform_id, &auth.token);
    info!(user_id = %auth.user_id, platform_id = auth.platform_id, "user logged out");
    Ok(Json(ApiResponse::ok_empty()))
}

/// POST /auth/force_logout - elimina i token su tutte le piattaforme e
/// chiude ogni sessione online del chiamante.
pub async fn force_logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    state.token_store.force_logout(&auth.user_id);
    if let Some(gateway) = state.gateway() {
        gateway.kick_sessions(&auth.user_id, None, None);
    }
    info!(user_id = %auth.user_id, "user force logged out");
    Ok(Json(ApiResponse::ok_empty()))
}
