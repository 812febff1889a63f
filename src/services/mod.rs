//! Services module - Logica di business e handler HTTP
//!
//! Ogni modulo espone le funzioni di dominio (riusate dal gateway
//! WebSocket) e gli handler axum che le avvolgono nella envelope.

pub mod auth;
pub mod conversation;
pub mod group;
pub mod message;
pub mod user;
