//! User service - Lookup identità e stato online

use crate::core::auth::AuthUser;
use crate::core::error::ChatError;
use crate::core::response::ApiResponse;
use crate::core::state::AppState;
use crate::dtos::user::{
    BatchUserInfoRequest, OnlineStatusRequest, UpdateUserRequest, UserInfo, UserOnlineStatus,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use std::sync::Arc;
use validator::Validate;

/// GET /user/info - profilo del chiamante
pub async fn my_info_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserInfo>>, ChatError> {
    let user = state
        .user
        .get_by_id(&auth.user_id)
        .await?
        .ok_or_else(ChatError::user_not_found)?;
    Ok(Json(ApiResponse::ok(UserInfo::from(user))))
}

/// GET /user/profile/{user_id}
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<UserInfo>>, ChatError> {
    let user = state
        .user
        .get_by_id(&user_id)
        .await?
        .ok_or_else(ChatError::user_not_found)?;
    Ok(Json(ApiResponse::ok(UserInfo::from(user))))
}

/// PUT /user/update - solo nickname e avatar
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    req.validate()?;
    state
        .user
        .update_profile(&auth.user_id, req.nickname.as_deref(), req.avatar.as_deref())
        .await?;
    Ok(Json(ApiResponse::ok_empty()))
}

/// POST /user/batch_info
pub async fn batch_info_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchUserInfoRequest>,
) -> Result<Json<ApiResponse<Vec<UserInfo>>>, ChatError> {
    let users = state.user.get_many(&req.user_ids).await?;
    Ok(Json(ApiResponse::ok(
        users.into_iter().map(UserInfo::from).collect(),
    )))
}

/// POST /user/get_users_online_status - indicatore coarse online/offline:
/// UserMap locale prima, specchio dei flag come fallback.
pub async fn online_status_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OnlineStatusRequest>,
) -> Result<Json<ApiResponse<Vec<UserOnlineStatus>>>, ChatError> {
    let statuses = req
        .user_ids
        .into_iter()
        .map(|user_id| {
            let online = state
                .gateway()
                .map(|g| g.user_map.is_online(&user_id))
                .unwrap_or(false)
                || state.presence.is_online(&user_id);
            UserOnlineStatus { user_id, online }
        })
        .collect();
    Ok(Json(ApiResponse::ok(statuses)))
}
