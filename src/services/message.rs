//! Message service - Protocollo di send atomico e read path
//!
//! Send: sonda di idempotenza → validazione → transazione
//! (alloc seq, insert, avanzamento max_seq, viste) → commit →
//! read_seq del mittente + enqueue push. Un seq allocato che non
//! arriva al commit resta un buco del solo contatore caldo, mai
//! osservabile dai lettori.

use crate::core::auth::AuthUser;
use crate::core::consts::{now_unix_milli, SESSION_TYPE_GROUP, SESSION_TYPE_SINGLE};
use crate::core::error::ChatError;
use crate::core::ids;
use crate::core::response::ApiResponse;
use crate::core::state::AppState;
use crate::dtos::message::{
    MaxSeqQuery, MaxSeqResponse, MessageData, PullMessagesQuery, PullMessagesResponse,
    SendMessageRequest, SendMessageResponse,
};
use crate::entities::Message;
use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Invio con auto-detect singola/gruppo, come da contratto dell'API.
pub async fn send_message(
    state: &AppState,
    sender_id: &str,
    req: &SendMessageRequest,
) -> Result<Message, ChatError> {
    req.validate()?;
    if req.content.is_empty() {
        return Err(ChatError::invalid_param().with_details("empty content"));
    }

    let has_recv = req.recv_id.as_deref().is_some_and(|r| !r.is_empty());
    let has_group = req.group_id.as_deref().is_some_and(|g| !g.is_empty());

    if req.session_type == SESSION_TYPE_SINGLE || (req.session_type == 0 && has_recv) {
        return send_single_message(state, sender_id, req).await;
    }
    if req.session_type == SESSION_TYPE_GROUP || (req.session_type == 0 && has_group) {
        return send_group_message(state, sender_id, req).await;
    }
    Err(ChatError::invalid_param().with_details("missing recv_id or group_id"))
}

#[instrument(skip(state, req), fields(sender_id = %sender_id, client_msg_id = %req.client_msg_id))]
async fn send_single_message(
    state: &AppState,
    sender_id: &str,
    req: &SendMessageRequest,
) -> Result<Message, ChatError> {
    let recv_id = req
        .recv_id
        .as_deref()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ChatError::invalid_param().with_details("missing recv_id"))?;

    // Sonda di idempotenza: un retry con lo stesso client_msg_id
    // restituisce il messaggio già persistito, identico.
    if let Some(existing) = state
        .msg
        .get_by_client_msg_id(sender_id, &req.client_msg_id)
        .await?
    {
        debug!("duplicate message, returning stored row");
        return Ok(existing);
    }

    let conversation_id = ids::single_conversation_id(sender_id, recv_id);
    let mut msg = build_message(sender_id, req, &conversation_id);
    msg.recv_id = recv_id.to_string();
    msg.session_type = SESSION_TYPE_SINGLE;

    let committed = commit_send(state, &mut msg, true).await?;

    let msg = match committed {
        CommitOutcome::Inserted(msg) => msg,
        CommitOutcome::Duplicate(existing) => return Ok(existing),
    };

    // Il mittente ha implicitamente letto il proprio messaggio.
    if let Err(e) = state
        .seq
        .update_read_seq(sender_id, &conversation_id, msg.seq)
        .await
    {
        warn!(error = %e, "failed to advance sender read_seq");
    }

    state.pusher.push_to_users(
        msg.clone(),
        vec![sender_id.to_string(), recv_id.to_string()],
        None,
    );

    info!(conversation_id = %conversation_id, seq = msg.seq, "single message sent");
    Ok(msg)
}

#[instrument(skip(state, req), fields(sender_id = %sender_id, client_msg_id = %req.client_msg_id))]
async fn send_group_message(
    state: &AppState,
    sender_id: &str,
    req: &SendMessageRequest,
) -> Result<Message, ChatError> {
    let group_id = req
        .group_id
        .as_deref()
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ChatError::invalid_param().with_details("missing group_id"))?;

    // Permessi: il mittente deve essere membro attivo di un gruppo normale.
    let member = state
        .group
        .get_member(group_id, sender_id)
        .await?
        .ok_or_else(ChatError::not_group_member)?;
    if !member.is_normal() {
        return Err(ChatError::member_not_active());
    }
    let group = state
        .group
        .get_by_id(group_id)
        .await?
        .ok_or_else(ChatError::group_not_found)?;
    if !group.is_normal() {
        return Err(ChatError::group_dismissed());
    }

    if let Some(existing) = state
        .msg
        .get_by_client_msg_id(sender_id, &req.client_msg_id)
        .await?
    {
        debug!("duplicate message, returning stored row");
        return Ok(existing);
    }

    let conversation_id = ids::group_conversation_id(group_id);
    let mut msg = build_message(sender_id, req, &conversation_id);
    msg.group_id = group_id.to_string();
    msg.session_type = SESSION_TYPE_GROUP;

    let committed = commit_send(state, &mut msg, false).await?;
    let msg = match committed {
        CommitOutcome::Inserted(msg) => msg,
        CommitOutcome::Duplicate(existing) => return Ok(existing),
    };

    if let Err(e) = state
        .seq
        .update_read_seq(sender_id, &conversation_id, msg.seq)
        .await
    {
        warn!(error = %e, "failed to advance sender read_seq");
    }

    // Le viste di gruppo si materializzano sul path di push, fuori
    // dalla transazione di send.
    match state.group.active_member_ids(group_id).await {
        Ok(member_ids) if !member_ids.is_empty() => {
            if let Err(e) = state
                .conv
                .ensure_group_views(&conversation_id, group_id, &member_ids)
                .await
            {
                warn!(error = %e, "failed to touch group conversation views");
            }
            state.pusher.push_to_users(msg.clone(), member_ids, None);
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to load group members for push"),
    }

    info!(conversation_id = %conversation_id, seq = msg.seq, "group message sent");
    Ok(msg)
}

fn build_message(sender_id: &str, req: &SendMessageRequest, conversation_id: &str) -> Message {
    let mut msg = Message {
        id: 0,
        conversation_id: conversation_id.to_string(),
        seq: 0,
        client_msg_id: req.client_msg_id.clone(),
        sender_id: sender_id.to_string(),
        recv_id: String::new(),
        group_id: String::new(),
        session_type: 0,
        msg_type: req.msg_type,
        content_text: None,
        content_image: None,
        content_video: None,
        content_audio: None,
        content_file: None,
        content_custom: None,
        extra: None,
        send_at: now_unix_milli(),
        created_at: 0,
        updated_at: 0,
    };
    msg.set_content(req.content.clone());
    msg
}

enum CommitOutcome {
    Inserted(Message),
    Duplicate(Message),
}

/// Cuore del protocollo di commit atomico: alloca il seq, inserisce il
/// messaggio, avanza il max_seq durevole e, per le chat singole,
/// aggiorna le due viste dei partecipanti nella stessa transazione.
async fn commit_send(
    state: &AppState,
    msg: &mut Message,
    upsert_single_views: bool,
) -> Result<CommitOutcome, ChatError> {
    let mut tx = state.seq.pool().begin().await.map_err(ChatError::from)?;

    let seq = state
        .seq
        .alloc_seq(&msg.conversation_id)
        .await
        .map_err(|e| ChatError::seq_alloc_failed().with_details(e.to_string()))?;
    msg.seq = seq;

    let inserted = state.msg.create(&mut tx, msg).await;
    let server_id = match inserted {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            // Retry concorrente dello stesso client_msg_id: la riga
            // vincente è già committata, il buco resta nel contatore.
            drop(tx);
            let existing = state
                .msg
                .get_by_client_msg_id(&msg.sender_id, &msg.client_msg_id)
                .await?
                .ok_or_else(ChatError::send_failed)?;
            return Ok(CommitOutcome::Duplicate(existing));
        }
        Err(e) => return Err(ChatError::send_failed().with_details(e.to_string())),
    };
    msg.id = server_id;

    state
        .seq
        .sync_max_seq(&mut tx, &msg.conversation_id, seq)
        .await
        .map_err(|e| ChatError::send_failed().with_details(e.to_string()))?;

    if upsert_single_views {
        state
            .conv
            .ensure_single_chat(&mut tx, &msg.conversation_id, &msg.sender_id, &msg.recv_id)
            .await
            .map_err(|e| ChatError::send_failed().with_details(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| ChatError::send_failed().with_details(e.to_string()))?;

    Ok(CommitOutcome::Inserted(msg.clone()))
}

/// Autorizzazione di lettura: per le chat singole l'id si parsa, per i
/// gruppi serve una membership (anche non più attiva: l'intervallo
/// visibile farà il resto).
pub async fn check_conversation_access(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
) -> Result<bool, ChatError> {
    if ids::is_single_conversation(conversation_id) {
        return Ok(ids::is_single_chat_participant(conversation_id, user_id));
    }
    if let Some(group_id) = ids::group_id_of(conversation_id) {
        let member = state.group.get_member(group_id, user_id).await?;
        return Ok(member.is_some());
    }
    Ok(false)
}

/// Pull con clamp sull'intervallo visibile dell'utente.
pub async fn pull_messages(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
    begin_seq: i64,
    end_seq: i64,
    limit: i64,
) -> Result<(Vec<Message>, i64), ChatError> {
    if !check_conversation_access(state, user_id, conversation_id).await? {
        return Err(ChatError::no_permission());
    }

    let conv_seq = state.seq.get_conversation_seq(conversation_id).await?;
    let seq_user = state.seq.get_seq_user(user_id, conversation_id).await?;

    let mut begin = begin_seq.max(1);
    let mut end = if end_seq == 0 { conv_seq.max_seq } else { end_seq };
    end = end.min(conv_seq.max_seq);

    if let Some(seq_user) = seq_user {
        let (b, e) = seq_user.clamp_range(begin, end, conv_seq.max_seq);
        begin = b;
        end = e;
    }

    if begin > end {
        return Ok((Vec::new(), conv_seq.max_seq));
    }

    let messages = state
        .msg
        .pull_range(conversation_id, begin, end, limit)
        .await
        .map_err(|e| ChatError::pull_failed().with_details(e.to_string()))?;
    Ok((messages, conv_seq.max_seq))
}

/// Pull per lista esplicita: esattamente l'intersezione dei seq
/// richiesti con l'intervallo visibile.
pub async fn pull_messages_by_seq_list(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
    seq_list: &[i64],
) -> Result<(Vec<Message>, i64), ChatError> {
    if !check_conversation_access(state, user_id, conversation_id).await? {
        return Err(ChatError::no_permission());
    }

    let conv_seq = state.seq.get_conversation_seq(conversation_id).await?;
    let seq_user = state.seq.get_seq_user(user_id, conversation_id).await?;

    let (lo, hi) = match &seq_user {
        Some(seq_user) => seq_user.visible_range(conv_seq.max_seq),
        None => (1, conv_seq.max_seq),
    };

    let visible: Vec<i64> = seq_list
        .iter()
        .copied()
        .filter(|seq| *seq >= lo.max(1) && *seq <= hi)
        .collect();
    if visible.is_empty() {
        return Ok((Vec::new(), conv_seq.max_seq));
    }

    let messages = state
        .msg
        .pull_by_seq_list(conversation_id, &visible)
        .await
        .map_err(|e| ChatError::pull_failed().with_details(e.to_string()))?;
    Ok((messages, conv_seq.max_seq))
}

pub async fn get_max_seq_checked(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
) -> Result<i64, ChatError> {
    if !check_conversation_access(state, user_id, conversation_id).await? {
        return Err(ChatError::no_permission());
    }
    Ok(state.seq.get_max_seq(conversation_id).await?)
}

pub async fn update_read_seq_checked(
    state: &AppState,
    user_id: &str,
    conversation_id: &str,
    read_seq: i64,
) -> Result<(), ChatError> {
    if !check_conversation_access(state, user_id, conversation_id).await? {
        return Err(ChatError::no_permission());
    }
    state
        .seq
        .update_read_seq(user_id, conversation_id, read_seq)
        .await?;
    Ok(())
}

// ------------------------- HTTP handlers -------------------------

/// POST /msg/send
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<SendMessageResponse>>, ChatError> {
    let msg = send_message(&state, &auth.user_id, &req).await?;
    Ok(Json(ApiResponse::ok(SendMessageResponse::from(&msg))))
}

/// GET /msg/pull
pub async fn pull_messages_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<PullMessagesQuery>,
) -> Result<Json<ApiResponse<PullMessagesResponse>>, ChatError> {
    let (messages, max_seq) = pull_messages(
        &state,
        &auth.user_id,
        &query.conversation_id,
        query.begin_seq,
        query.end_seq,
        query.limit,
    )
    .await?;
    Ok(Json(ApiResponse::ok(PullMessagesResponse {
        messages: messages.iter().map(MessageData::from).collect(),
        max_seq,
    })))
}

/// GET /msg/max_seq
pub async fn get_max_seq_handler(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(query): Query<MaxSeqQuery>,
) -> Result<Json<ApiResponse<MaxSeqResponse>>, ChatError> {
    let max_seq = get_max_seq_checked(&state, &auth.user_id, &query.conversation_id).await?;
    Ok(Json(ApiResponse::ok(MaxSeqResponse { max_seq })))
}
