//! Frame dispatch - Dalla richiesta WebSocket alle chiamate di engine
//!
//! Ogni frame inbound porta un identificatore di richiesta; il binding
//! del mittente viene verificato prima di processare qualunque cosa.
//! Le risposte fanno echo degli id di correlazione.

use crate::core::state::AppState;
use crate::dtos::message::{MessageData, SendMessageRequest, SendMessageResponse};
use crate::dtos::ws::{
    GetConvMaxReadSeqReq, GetConvMaxReadSeqResp, GetNewestSeqReq, GetNewestSeqResp, PullMsgReq,
    PullMsgResp, WsRequest, WsResponse, WS_DATA_ERROR, WS_GET_CONV_MAX_READ_SEQ,
    WS_GET_NEWEST_SEQ, WS_PULL_MSG, WS_PULL_MSG_BY_SEQ_LIST, WS_SEND_MSG,
};
use crate::core::error::ChatError;
use crate::services::{conversation, message};
use crate::ws::session::Session;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

fn decode_data<T: DeserializeOwned>(req: &WsRequest) -> Result<T, ChatError> {
    let data = req.data.clone().unwrap_or(Value::Null);
    serde_json::from_value(data).map_err(|e| ChatError::invalid_param().with_details(e.to_string()))
}

/// Processa un frame testuale e produce la risposta da accodare.
pub async fn handle_frame(state: &Arc<AppState>, session: &Arc<Session>, text: &str) -> WsResponse {
    let req: WsRequest = match serde_json::from_str(text) {
        Ok(req) => req,
        Err(_) => {
            // frame non decodificabile: errore protocollo 3001
            let err = ChatError::invalid_protocol();
            return WsResponse {
                req_identifier: WS_DATA_ERROR,
                msg_incr: String::new(),
                operation_id: String::new(),
                err_code: err.code,
                err_msg: err.message,
                data: None,
            };
        }
    };

    // Binding del mittente: il send_id dichiarato deve coincidere con
    // l'identità autenticata della sessione.
    if !req.send_id.is_empty() && req.send_id != session.user_id {
        let err = ChatError::user_id_mismatch();
        return WsResponse::error(&req, err.code, err.message);
    }

    debug!(
        req_identifier = req.req_identifier,
        user_id = %session.user_id,
        "frame received"
    );

    let result = dispatch(state, session, &req).await;
    match result {
        Ok(data) => WsResponse::ok(&req, data),
        Err(err) => WsResponse::error(&req, err.code, err.message),
    }
}

async fn dispatch(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    req: &WsRequest,
) -> Result<Option<Value>, ChatError> {
    match req.req_identifier {
        WS_GET_NEWEST_SEQ => handle_get_newest_seq(state, session, req).await,
        WS_SEND_MSG => handle_send_msg(state, session, req).await,
        WS_PULL_MSG => handle_pull_msg(state, session, req).await,
        WS_PULL_MSG_BY_SEQ_LIST => handle_pull_msg_by_seq_list(state, session, req).await,
        WS_GET_CONV_MAX_READ_SEQ => handle_get_conv_max_read_seq(state, session, req).await,
        _ => Err(ChatError::invalid_protocol()),
    }
}

async fn handle_get_newest_seq(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    req: &WsRequest,
) -> Result<Option<Value>, ChatError> {
    let body: GetNewestSeqReq = decode_data(req)?;
    let mut seqs = HashMap::new();
    for conversation_id in body.conversation_ids {
        let max_seq = message::get_max_seq_checked(state, &session.user_id, &conversation_id)
            .await
            .unwrap_or(0);
        seqs.insert(conversation_id, max_seq);
    }
    Ok(Some(to_value(GetNewestSeqResp { seqs })?))
}

async fn handle_send_msg(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    req: &WsRequest,
) -> Result<Option<Value>, ChatError> {
    let body: SendMessageRequest = decode_data(req)?;
    let msg = message::send_message(state, &session.user_id, &body).await?;
    Ok(Some(to_value(SendMessageResponse::from(&msg))?))
}

async fn handle_pull_msg(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    req: &WsRequest,
) -> Result<Option<Value>, ChatError> {
    let body: PullMsgReq = decode_data(req)?;
    let (messages, max_seq) = message::pull_messages(
        state,
        &session.user_id,
        &body.conversation_id,
        body.begin_seq,
        body.end_seq,
        body.limit,
    )
    .await?;
    Ok(Some(to_value(PullMsgResp {
        messages: messages.iter().map(MessageData::from).collect(),
        max_seq,
    })?))
}

async fn handle_pull_msg_by_seq_list(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    req: &WsRequest,
) -> Result<Option<Value>, ChatError> {
    let body: PullMsgReq = decode_data(req)?;
    let seq_list = body.seq_list.unwrap_or_default();
    let (messages, max_seq) = message::pull_messages_by_seq_list(
        state,
        &session.user_id,
        &body.conversation_id,
        &seq_list,
    )
    .await?;
    Ok(Some(to_value(PullMsgResp {
        messages: messages.iter().map(MessageData::from).collect(),
        max_seq,
    })?))
}

async fn handle_get_conv_max_read_seq(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    req: &WsRequest,
) -> Result<Option<Value>, ChatError> {
    let body: GetConvMaxReadSeqReq = decode_data(req)?;
    let (max_seq, read_seq) =
        conversation::max_read_seq(state, &session.user_id, &body.conversation_id).await?;
    Ok(Some(to_value(GetConvMaxReadSeqResp {
        max_seq,
        read_seq,
        unread_count: (max_seq - read_seq).max(0),
    })?))
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, ChatError> {
    serde_json::to_value(value)
        .map_err(|e| ChatError::internal_server().with_details(e.to_string()))
}
