//! Conversation DTOs - Viste, cursore di lettura e unread

use crate::entities::ConversationWithSeq;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct ConversationInfo {
    pub conversation_id: String,
    pub conversation_type: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub peer_user_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group_id: String,
    pub recv_msg_opt: i32,
    pub is_pinned: bool,
    pub unread_count: i64,
    pub max_seq: i64,
    pub read_seq: i64,
    pub updated_at: i64,
}

impl From<ConversationWithSeq> for ConversationInfo {
    fn from(conv: ConversationWithSeq) -> Self {
        Self {
            conversation_id: conv.conversation_id,
            conversation_type: conv.conversation_type,
            peer_user_id: conv.peer_user_id,
            group_id: conv.group_id,
            recv_msg_opt: conv.recv_msg_opt,
            is_pinned: conv.is_pinned,
            unread_count: conv.unread_count,
            max_seq: conv.max_seq,
            read_seq: conv.read_seq,
            updated_at: conv.updated_at,
        }
    }
}

/// Update limitato a pin e opzione di ricezione.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateConversationRequest {
    #[validate(length(min = 1, max = 160))]
    pub conversation_id: String,
    #[serde(default)]
    pub recv_msg_opt: Option<i32>,
    #[serde(default)]
    pub is_pinned: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MarkReadRequest {
    #[validate(length(min = 1, max = 160))]
    pub conversation_id: String,
    pub read_seq: i64,
}

/// Query string condivisa dagli endpoint di lettura per conversazione.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationQuery {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaxReadSeqResponse {
    pub max_seq: i64,
    pub read_seq: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}
