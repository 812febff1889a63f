//! Core module - Stato condiviso, errori, autenticazione e identità

pub mod auth;
pub mod consts;
pub mod error;
pub mod ids;
pub mod response;
pub mod state;

pub use auth::{authentication_middleware, AuthUser};
pub use error::ChatError;
pub use response::ApiResponse;
pub use state::AppState;
