//! Conversation view - Record di presentazione per-owner
//!
//! Una chat singola produce due righe al primo messaggio, una per
//! partecipante, con `peer_user_id` incrociato. Il bump di `updated_at`
//! ad ogni send guida l'ordinamento della lista conversazioni.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: i64,
    pub conversation_id: String,
    pub owner_id: String,
    pub conversation_type: i32,
    pub peer_user_id: String,
    pub group_id: String,
    pub recv_msg_opt: i32,
    pub is_pinned: bool,
    pub extra: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Vista arricchita usata dalla lista conversazioni:
/// view ⨝ seq_conversations ⨝ seq_users.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ConversationWithSeq {
    pub conversation_id: String,
    pub owner_id: String,
    pub conversation_type: i32,
    pub peer_user_id: String,
    pub group_id: String,
    pub recv_msg_opt: i32,
    pub is_pinned: bool,
    pub updated_at: i64,
    pub max_seq: i64,
    pub read_seq: i64,
    pub unread_count: i64,
}
