//! Entities module - Entità del dominio applicativo
//!
//! Ogni entity corrisponde a una tabella del database.

pub mod conversation;
pub mod group;
pub mod message;
pub mod seq;
pub mod user;

// Re-exports per facilitare l'import
pub use conversation::{Conversation, ConversationWithSeq};
pub use group::{Group, GroupMember};
pub use message::Message;
pub use seq::{SeqConversation, SeqUser};
pub use user::User;
