//! Message entity - Entità messaggio
//!
//! Un messaggio è immutabile dopo il commit. Il contenuto tipizzato
//! (testo/immagine/video/audio/file/custom) è persistito verbatim in
//! colonne dedicate.

use crate::dtos::message::MessageContent;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub conversation_id: String,
    pub seq: i64,
    pub client_msg_id: String,
    pub sender_id: String,
    pub recv_id: String,
    pub group_id: String,
    pub session_type: i32,
    pub msg_type: i32,
    pub content_text: Option<String>,
    pub content_image: Option<String>,
    pub content_video: Option<String>,
    pub content_audio: Option<String>,
    pub content_file: Option<String>,
    pub content_custom: Option<String>,
    pub extra: Option<String>,
    pub send_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Message {
    pub fn content(&self) -> MessageContent {
        MessageContent {
            text: self.content_text.clone(),
            image: self.content_image.clone(),
            video: self.content_video.clone(),
            audio: self.content_audio.clone(),
            file: self.content_file.clone(),
            custom: self.content_custom.clone(),
        }
    }

    pub fn set_content(&mut self, content: MessageContent) {
        self.content_text = content.text;
        self.content_image = content.image;
        self.content_video = content.video;
        self.content_audio = content.audio;
        self.content_file = content.file;
        self.content_custom = content.custom;
    }
}
