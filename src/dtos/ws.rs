//! WebSocket frames - Protocollo applicativo del gateway
//!
//! Ogni frame è un oggetto JSON con identificatore di richiesta e id di
//! correlazione. La risposta fa echo di `msg_incr` e `operation_id`,
//! imposta `err_code` (0 = successo) e trasporta il payload in `data`.

use crate::dtos::message::MessageData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// Identificatori inbound
pub const WS_GET_NEWEST_SEQ: i32 = 1001;
pub const WS_PULL_MSG_BY_SEQ_LIST: i32 = 1002;
pub const WS_SEND_MSG: i32 = 1003;
pub const WS_PULL_MSG: i32 = 1005;
pub const WS_GET_CONV_MAX_READ_SEQ: i32 = 1006;

// Identificatori outbound
pub const WS_PUSH_MSG: i32 = 2001;
pub const WS_KICK_ONLINE_MSG: i32 = 2002;
pub const WS_DATA_ERROR: i32 = 3001;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WsRequest {
    pub req_identifier: i32,
    #[serde(default)]
    pub msg_incr: String,
    #[serde(default)]
    pub operation_id: String,
    #[serde(default)]
    pub send_id: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsResponse {
    pub req_identifier: i32,
    #[serde(default)]
    pub msg_incr: String,
    #[serde(default)]
    pub operation_id: String,
    pub err_code: i32,
    #[serde(default)]
    pub err_msg: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl WsResponse {
    pub fn ok(req: &WsRequest, data: Option<Value>) -> Self {
        Self {
            req_identifier: req.req_identifier,
            msg_incr: req.msg_incr.clone(),
            operation_id: req.operation_id.clone(),
            err_code: 0,
            err_msg: String::new(),
            data,
        }
    }

    pub fn error(req: &WsRequest, code: i32, msg: impl Into<String>) -> Self {
        Self {
            req_identifier: req.req_identifier,
            msg_incr: req.msg_incr.clone(),
            operation_id: req.operation_id.clone(),
            err_code: code,
            err_msg: msg.into(),
            data: None,
        }
    }

    /// Frame push 2001, non correlato ad alcuna richiesta.
    pub fn push(data: Value) -> Self {
        Self {
            req_identifier: WS_PUSH_MSG,
            msg_incr: String::new(),
            operation_id: String::new(),
            err_code: 0,
            err_msg: String::new(),
            data: Some(data),
        }
    }

    /// Frame kick 2002: la sessione sta per essere chiusa dal server.
    pub fn kick() -> Self {
        Self {
            req_identifier: WS_KICK_ONLINE_MSG,
            msg_incr: String::new(),
            operation_id: String::new(),
            err_code: 0,
            err_msg: String::new(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetNewestSeqReq {
    pub conversation_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetNewestSeqResp {
    /// conversation_id -> max_seq
    pub seqs: HashMap<String, i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullMsgReq {
    pub conversation_id: String,
    #[serde(default)]
    pub begin_seq: i64,
    #[serde(default)]
    pub end_seq: i64,
    #[serde(default)]
    pub limit: i64,
    /// Usato da WS_PULL_MSG_BY_SEQ_LIST: vengono restituiti
    /// esattamente i seq richiesti che cadono nel range visibile.
    #[serde(default)]
    pub seq_list: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullMsgResp {
    pub messages: Vec<MessageData>,
    pub max_seq: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GetConvMaxReadSeqReq {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetConvMaxReadSeqResp {
    pub max_seq: i64,
    pub read_seq: i64,
    pub unread_count: i64,
}

/// Payload del push 2001: conversation_id -> messaggi.
#[derive(Debug, Clone, Serialize)]
pub struct PushMsgData {
    pub msgs: HashMap<String, Vec<MessageData>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_echoes_correlation_ids() {
        let req = WsRequest {
            req_identifier: WS_SEND_MSG,
            msg_incr: "7".to_string(),
            operation_id: "op-1".to_string(),
            send_id: "alice".to_string(),
            data: None,
        };
        let resp = WsResponse::ok(&req, None);
        assert_eq!(resp.req_identifier, WS_SEND_MSG);
        assert_eq!(resp.msg_incr, "7");
        assert_eq!(resp.operation_id, "op-1");
        assert_eq!(resp.err_code, 0);
    }

    #[test]
    fn test_request_decodes_with_missing_optionals() {
        let req: WsRequest =
            serde_json::from_str(r#"{"req_identifier": 1001}"#).unwrap();
        assert_eq!(req.req_identifier, WS_GET_NEWEST_SEQ);
        assert!(req.send_id.is_empty());
        assert!(req.data.is_none());
    }

    #[test]
    fn test_error_frame_carries_code() {
        let req = WsRequest::default();
        let resp = WsResponse::error(&req, 5003, "invalid protocol");
        assert_eq!(resp.err_code, 5003);
        assert_eq!(resp.err_msg, "invalid protocol");
    }

    #[test]
    fn test_kick_frame_identifier() {
        assert_eq!(WsResponse::kick().req_identifier, WS_KICK_ONLINE_MSG);
    }
}
