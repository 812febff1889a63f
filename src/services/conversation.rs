//! Conversation service - Liste, cursore di lettura e unread
//!
//! `unread = max(0, conv.max_seq - user.read_seq)`. MarkRead è
//! idempotente via GREATEST e non clampa al range visibile (è
//! responsabilità del chiamante).

use crate::core::auth::AuthUser;
use crate::core::error::ChatError;
use crate::core::response::ApiResponse;
use crate::core::state::AppState;
use crate::dtos::conversation::{
    ConversationInfo, ConversationQuery, MarkReadRequest, MaxReadSeqResponse,
    UnreadCountResponse, UpdateConversationRequest,
};
use crate::services::message::{check_conversation_access, update_read_seq_checked};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

pub async fn list_conversations(
    state: &AppState,
    user_id: &str,
) -> Result<Vec<ConversationInfo>, ChatError> {
    let rows = state.conv.list_with_seq(user_id).await?;
    Ok(rows.into_iter().map(ConversationInfo::from).collect())
}

pub async fn get_conversation(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
) -> Result<ConversationInfo, ChatError> {
    let conv = state
        .conv
        .get_by_owner_and_conv(user_id, conversation_id)
        .await?
        .ok_or_else(ChatError::conv_not_found)?;

    let (max_seq, read_seq) = max_read_seq(state, user_id, conversation_id).await?;

    Ok(ConversationInfo {
        conversation_id: conv.conversation_id,
        conversation_type: conv.conversation_type,
        peer_user_id: conv.peer_user_id,
        group_id: conv.group_id,
        recv_msg_opt: conv.recv_msg_opt,
        is_pinned: conv.is_pinned,
        unread_count: (max_seq - read_seq).max(0),
        max_seq,
        read_seq,
        updated_at: conv.updated_at,
    })
}

/// Coppia (max_seq, read_seq) con controllo d'accesso.
#[instrument(skip(state))]
pub async fn max_read_seq(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
) -> Result<(i64, i64), ChatError> {
    if !check_conversation_access(state, user_id, conversation_id).await? {
        return Err(ChatError::no_permission());
    }
    let conv_seq = state.seq.get_conversation_seq(conversation_id).await?;
    let read_seq = state
        .seq
        .get_seq_user(user_id, conversation_id)
        .await?
        .map(|s| s.read_seq)
        .unwrap_or(0);
    Ok((conv_seq.max_seq, read_seq))
}

// ------------------------- HTTP handlers -------------------------

/// GET /conversation/list
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<ConversationInfo>>>, ChatError> {
    let list = list_conversations(&state, &auth.user_id).await?;
    Ok(Json(ApiResponse::ok(list)))
}

/// GET /conversation/info
pub async fn info_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ApiResponse<ConversationInfo>>, ChatError> {
    let info = get_conversation(&state, &auth.user_id, &query.conversation_id).await?;
    Ok(Json(ApiResponse::ok(info)))
}

/// PUT /conversation/update - solo pin e opzione di ricezione
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<UpdateConversationRequest>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    req.validate()?;
    state
        .conv
        .update_settings(
            &auth.user_id,
            &req.conversation_id,
            req.recv_msg_opt,
            req.is_pinned,
        )
        .await?;
    Ok(Json(ApiResponse::ok_empty()))
}

/// POST /conversation/mark_read
pub async fn mark_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    req.validate()?;
    update_read_seq_checked(&state, &auth.user_id, &req.conversation_id, req.read_seq).await?;
    Ok(Json(ApiResponse::ok_empty()))
}

/// GET /conversation/max_read_seq
pub async fn max_read_seq_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ApiResponse<MaxReadSeqResponse>>, ChatError> {
    let (max_seq, read_seq) = max_read_seq(&state, &auth.user_id, &query.conversation_id).await?;
    Ok(Json(ApiResponse::ok(MaxReadSeqResponse { max_seq, read_seq })))
}

/// GET /conversation/unread_count
pub async fn unread_count_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, ChatError> {
    let (max_seq, read_seq) = max_read_seq(&state, &auth.user_id, &query.conversation_id).await?;
    Ok(Json(ApiResponse::ok(UnreadCountResponse {
        unread_count: (max_seq - read_seq).max(0),
    })))
}
