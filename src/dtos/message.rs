//! Message DTOs - Invio, pull e rappresentazione wire dei messaggi

use crate::entities::Message;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Contenuto tipizzato di un messaggio; il mittente può valorizzare
/// uno o più slot. Persistito verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
}

impl MessageContent {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.image.is_none()
            && self.video.is_none()
            && self.audio.is_none()
            && self.file.is_none()
            && self.custom.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 128))]
    pub client_msg_id: String,
    /// Destinatario per chat singola.
    #[serde(default)]
    pub recv_id: Option<String>,
    /// Gruppo per chat di gruppo.
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub session_type: i32,
    pub msg_type: i32,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub server_msg_id: i64,
    pub conversation_id: String,
    pub seq: i64,
    pub client_msg_id: String,
    pub send_at: i64,
}

impl From<&Message> for SendMessageResponse {
    fn from(msg: &Message) -> Self {
        Self {
            server_msg_id: msg.id,
            conversation_id: msg.conversation_id.clone(),
            seq: msg.seq,
            client_msg_id: msg.client_msg_id.clone(),
            send_at: msg.send_at,
        }
    }
}

/// Forma wire di un messaggio (push e pull).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageData {
    pub server_msg_id: i64,
    pub conversation_id: String,
    pub seq: i64,
    pub client_msg_id: String,
    pub sender_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub recv_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub group_id: String,
    pub session_type: i32,
    pub msg_type: i32,
    pub content: MessageContent,
    pub send_at: i64,
}

impl From<&Message> for MessageData {
    fn from(msg: &Message) -> Self {
        Self {
            server_msg_id: msg.id,
            conversation_id: msg.conversation_id.clone(),
            seq: msg.seq,
            client_msg_id: msg.client_msg_id.clone(),
            sender_id: msg.sender_id.clone(),
            recv_id: msg.recv_id.clone(),
            group_id: msg.group_id.clone(),
            session_type: msg.session_type,
            msg_type: msg.msg_type,
            content: msg.content(),
            send_at: msg.send_at,
        }
    }
}

/// Query string di `GET /msg/pull`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullMessagesQuery {
    pub conversation_id: String,
    #[serde(default)]
    pub begin_seq: i64,
    #[serde(default)]
    pub end_seq: i64,
    #[serde(default)]
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullMessagesResponse {
    pub messages: Vec<MessageData>,
    pub max_seq: i64,
}

/// Query string di `GET /msg/max_seq`.
#[derive(Debug, Clone, Deserialize)]
pub struct MaxSeqQuery {
    pub conversation_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaxSeqResponse {
    pub max_seq: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_detection() {
        assert!(MessageContent::default().is_empty());
        let content = MessageContent {
            text: Some("hi".to_string()),
            ..Default::default()
        };
        assert!(!content.is_empty());
    }

    #[test]
    fn test_message_data_omits_empty_peer_fields() {
        let data = MessageData {
            server_msg_id: 1,
            conversation_id: "si_a:b".to_string(),
            seq: 1,
            client_msg_id: "m1".to_string(),
            sender_id: "a".to_string(),
            recv_id: "b".to_string(),
            group_id: String::new(),
            session_type: 1,
            msg_type: 1,
            content: MessageContent::default(),
            send_at: 0,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["recv_id"], "b");
        assert!(json.get("group_id").is_none());
    }
}
