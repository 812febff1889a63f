//! Group service - Macchina a stati della membership
//!
//! Le transizioni join/quit acquisiscono il row lock su
//! seq_conversations e leggono il max_seq corrente dentro la
//! transazione: senza il lock, un send concorrente potrebbe allocare
//! `max_seq + 1` prima che il join scriva `min_seq = max_seq + 1`, e il
//! nuovo membro vedrebbe (o no) il messaggio in modo incoerente.

use crate::core::auth::AuthUser;
use crate::core::consts::{
    now_unix_milli, GROUP_MEMBER_STATUS_LEFT, GROUP_MEMBER_STATUS_NORMAL, GROUP_STATUS_NORMAL,
    ROLE_LEVEL_MEMBER, ROLE_LEVEL_OWNER,
};
use crate::core::error::ChatError;
use crate::core::ids;
use crate::core::response::ApiResponse;
use crate::core::state::AppState;
use crate::dtos::group::{
    CreateGroupRequest, DismissGroupRequest, GroupInfo, GroupMemberInfo, GroupQuery,
    JoinGroupRequest, QuitGroupRequest,
};
use crate::entities::{Group, GroupMember};
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

fn new_member(
    group_id: &str,
    user_id: &str,
    role_level: i32,
    join_seq: i64,
    inviter: &str,
    now: i64,
) -> GroupMember {
    GroupMember {
        id: 0,
        group_id: group_id.to_string(),
        user_id: user_id.to_string(),
        group_nickname: String::new(),
        role_level,
        status: GROUP_MEMBER_STATUS_NORMAL,
        joined_at: now,
        join_seq,
        inviter_user_id: inviter.to_string(),
        created_at: now,
        updated_at: now,
    }
}

/// Crea il gruppo in una sola transazione: riga gruppo, riga
/// seq_conversations, creatore come OWNER e invitati iniziali come
/// MEMBER, tutti con `join_seq = 1` e `min_seq = 1` (vedono la storia
/// dall'inizio).
#[instrument(skip(state, req), fields(creator_id = %creator_id))]
pub async fn create_group(
    state: &AppState,
    creator_id: &str,
    req: &CreateGroupRequest,
) -> Result<Group, ChatError> {
    req.validate()?;

    // uuid v7: univoco e ordinato nel tempo
    let group_id = Uuid::now_v7().to_string();
    let conversation_id = ids::group_conversation_id(&group_id);
    let now = now_unix_milli();

    let group = Group {
        id: group_id.clone(),
        name: req.name.clone(),
        introduction: req.introduction.clone().unwrap_or_default(),
        avatar: req.avatar.clone().unwrap_or_default(),
        extra: None,
        status: GROUP_STATUS_NORMAL,
        creator_user_id: creator_id.to_string(),
        group_type: 0,
        created_at: now,
        updated_at: now,
    };

    let mut tx = state.seq.pool().begin().await.map_err(ChatError::from)?;

    state.group.create(&mut tx, &group).await?;
    state.seq.ensure_conversation(&mut tx, &conversation_id).await?;

    let creator = new_member(&group_id, creator_id, ROLE_LEVEL_OWNER, 1, "", now);
    state.group.add_member(&mut tx, &creator).await?;
    state
        .seq
        .set_user_min_seq(&mut tx, creator_id, &conversation_id, 1)
        .await?;

    for member_id in &req.member_ids {
        if member_id == creator_id {
            continue;
        }
        let member = new_member(&group_id, member_id, ROLE_LEVEL_MEMBER, 1, creator_id, now);
        state.group.add_member(&mut tx, &member).await?;
        state
            .seq
            .set_user_min_seq(&mut tx, member_id, &conversation_id, 1)
            .await?;
    }

    tx.commit().await.map_err(ChatError::from)?;

    info!(group_id = %group_id, "group created");
    Ok(group)
}

/// Join non iniziale: il nuovo membro non vede la storia.
/// `joinSeq = max_seq + 1` letto sotto row lock.
#[instrument(skip(state))]
pub async fn join_group(state: &AppState, group_id: &str, user_id: &str) -> Result<(), ChatError> {
    let conversation_id = ids::group_conversation_id(group_id);

    let mut tx = state.seq.pool().begin().await.map_err(ChatError::from)?;

    let group = state
        .group
        .get_by_id_tx(&mut tx, group_id)
        .await?
        .ok_or_else(ChatError::group_not_found)?;
    if !group.is_normal() {
        return Err(ChatError::group_dismissed());
    }

    let existing = state.group.get_member_tx(&mut tx, group_id, user_id).await?;
    if existing.as_ref().is_some_and(|m| m.is_normal()) {
        return Err(ChatError::already_group_member());
    }

    // Lock: linearizza "primo seq osservabile" con "prossima allocazione".
    let max_seq = state
        .seq
        .max_seq_for_update(&mut tx, &conversation_id)
        .await?;
    let join_seq = max_seq + 1;
    let now = now_unix_milli();

    let member = new_member(group_id, user_id, ROLE_LEVEL_MEMBER, join_seq, "", now);
    state.group.add_member(&mut tx, &member).await?;
    state
        .seq
        .set_user_min_seq(&mut tx, user_id, &conversation_id, join_seq)
        .await?;

    tx.commit().await.map_err(ChatError::from)?;

    info!(group_id = %group_id, user_id = %user_id, join_seq, "user joined group");
    Ok(())
}

/// Quit: lo stato passa a left e `max_seq` dell'utente viene fissato al
/// massimo corrente, così i messaggi futuri restano invisibili.
#[instrument(skip(state))]
pub async fn quit_group(state: &AppState, group_id: &str, user_id: &str) -> Result<(), ChatError> {
    let conversation_id = ids::group_conversation_id(group_id);

    let mut tx = state.seq.pool().begin().await.map_err(ChatError::from)?;

    let member = state
        .group
        .get_member_tx(&mut tx, group_id, user_id)
        .await?
        .ok_or_else(ChatError::not_group_member)?;
    if !member.is_normal() {
        return Err(ChatError::not_group_member());
    }
    // L'owner non esce: serve trasferimento di proprietà o dismiss.
    if member.is_owner() {
        return Err(ChatError::cannot_kick_owner());
    }

    let max_seq = state
        .seq
        .max_seq_for_update(&mut tx, &conversation_id)
        .await?;

    state
        .group
        .update_member_status(&mut tx, group_id, user_id, GROUP_MEMBER_STATUS_LEFT)
        .await?;
    state
        .seq
        .set_user_max_seq(&mut tx, user_id, &conversation_id, max_seq)
        .await?;

    tx.commit().await.map_err(ChatError::from)?;

    info!(group_id = %group_id, user_id = %user_id, last_visible_seq = max_seq, "user quit group");
    Ok(())
}

/// Dismiss (solo owner): i nuovi send vengono rifiutati, i pull dei
/// membri esistenti continuano a funzionare fino al max_seq finale.
#[instrument(skip(state))]
pub async fn dismiss_group(
    state: &AppState,
    group_id: &str,
    user_id: &str,
) -> Result<(), ChatError> {
    let group = state
        .group
        .get_by_id(group_id)
        .await?
        .ok_or_else(ChatError::group_not_found)?;
    if !group.is_normal() {
        return Err(ChatError::group_dismissed());
    }
    if group.creator_user_id != user_id {
        return Err(ChatError::not_group_owner());
    }

    state.group.dismiss(group_id).await?;
    info!(group_id = %group_id, "group dismissed");
    Ok(())
}

// ------------------------- HTTP handlers -------------------------

/// POST /group/create
pub async fn create_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<ApiResponse<GroupInfo>>, ChatError> {
    let group = create_group(&state, &auth.user_id, &req).await?;
    let member_count = state.group.active_member_count(&group.id).await?;
    Ok(Json(ApiResponse::ok(GroupInfo::from_group(
        group,
        member_count,
    ))))
}

/// POST /group/join
pub async fn join_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<JoinGroupRequest>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    req.validate()?;
    join_group(&state, &req.group_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::ok_empty()))
}

/// POST /group/quit
pub async fn quit_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<QuitGroupRequest>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    req.validate()?;
    quit_group(&state, &req.group_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::ok_empty()))
}

/// POST /group/dismiss
pub async fn dismiss_group_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<DismissGroupRequest>,
) -> Result<Json<ApiResponse<()>>, ChatError> {
    req.validate()?;
    dismiss_group(&state, &req.group_id, &auth.user_id).await?;
    Ok(Json(ApiResponse::ok_empty()))
}

/// GET /group/info
pub async fn group_info_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GroupQuery>,
) -> Result<Json<ApiResponse<GroupInfo>>, ChatError> {
    let group = state
        .group
        .get_by_id(&query.group_id)
        .await?
        .ok_or_else(ChatError::group_not_found)?;
    let member_count = state.group.active_member_count(&group.id).await?;
    Ok(Json(ApiResponse::ok(GroupInfo::from_group(
        group,
        member_count,
    ))))
}

/// GET /group/members
pub async fn group_members_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GroupQuery>,
) -> Result<Json<ApiResponse<Vec<GroupMemberInfo>>>, ChatError> {
    let members = state.group.active_members(&query.group_id).await?;
    Ok(Json(ApiResponse::ok(
        members.into_iter().map(GroupMemberInfo::from).collect(),
    )))
}
