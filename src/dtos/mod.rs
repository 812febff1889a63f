//! DTOs module - Data Transfer Objects
//!
//! Separano la rappresentazione esterna (API HTTP e frame WebSocket)
//! dalla rappresentazione interna (entities).

pub mod auth;
pub mod conversation;
pub mod group;
pub mod message;
pub mod user;
pub mod ws;

// Re-exports per facilitare l'import
pub use auth::{LoginRequest, LoginResponse, RegisterRequest};
pub use conversation::{ConversationInfo, MarkReadRequest, UpdateConversationRequest};
pub use group::{
    CreateGroupRequest, DismissGroupRequest, GroupInfo, GroupMemberInfo, JoinGroupRequest,
    QuitGroupRequest,
};
pub use message::{MessageContent, MessageData, PullMessagesResponse, SendMessageRequest, SendMessageResponse};
pub use user::UserInfo;
pub use ws::{WsRequest, WsResponse};
