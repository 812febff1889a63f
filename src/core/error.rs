use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;

#[derive(Serialize)]
struct ErrorBody {
    code: i32,
    msg: String,
}

/// Errore applicativo con codice numerico stabile.
///
/// Spazio codici: 0 successo, 1xxx generici, 2xxx auth, 3xxx gruppi,
/// 4xxx messaggi, 5xxx gateway. Gli errori di business viaggiano nella
/// envelope JSON con HTTP 200; lo status HTTP diverso da OK è riservato
/// al path di upgrade WebSocket.
#[derive(Debug, Clone)]
pub struct ChatError {
    pub code: i32,
    pub message: String,
}

impl ChatError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Accoda contesto al messaggio mantenendo il codice.
    pub fn with_details(mut self, details: impl AsRef<str>) -> Self {
        self.message = format!("{}: {}", self.message, details.as_ref());
        self
    }

    // Common errors (1xxx)
    pub fn invalid_param() -> Self {
        Self::new(1001, "invalid parameter")
    }
    pub fn internal_server() -> Self {
        Self::new(1002, "internal server error")
    }
    pub fn unauthorized() -> Self {
        Self::new(1003, "unauthorized")
    }
    pub fn forbidden() -> Self {
        Self::new(1004, "forbidden")
    }
    pub fn not_found() -> Self {
        Self::new(1005, "not found")
    }
    pub fn too_many_requests() -> Self {
        Self::new(1006, "too many requests")
    }
    pub fn no_permission() -> Self {
        Self::new(1007, "no permission to access this resource")
    }

    // Auth errors (2xxx)
    pub fn token_invalid() -> Self {
        Self::new(2001, "token invalid")
    }
    pub fn token_expired() -> Self {
        Self::new(2002, "token expired")
    }
    pub fn token_missing() -> Self {
        Self::new(2003, "token missing")
    }
    pub fn token_mismatch() -> Self {
        Self::new(2004, "token user mismatch")
    }
    pub fn login_failed() -> Self {
        Self::new(2005, "login failed")
    }
    pub fn user_not_found() -> Self {
        Self::new(2006, "user not found")
    }
    pub fn user_exists() -> Self {
        Self::new(2007, "user already exists")
    }
    pub fn password_wrong() -> Self {
        Self::new(2008, "password wrong")
    }

    // Group errors (3xxx)
    pub fn group_not_found() -> Self {
        Self::new(3001, "group not found")
    }
    pub fn group_dismissed() -> Self {
        Self::new(3002, "group has been dismissed")
    }
    pub fn not_group_member() -> Self {
        Self::new(3003, "not a group member")
    }
    pub fn member_not_active() -> Self {
        Self::new(3004, "member not active")
    }
    pub fn already_group_member() -> Self {
        Self::new(3005, "already a group member")
    }
    pub fn not_group_owner() -> Self {
        Self::new(3006, "not group owner")
    }
    pub fn cannot_kick_owner() -> Self {
        Self::new(3008, "cannot kick group owner")
    }

    // Message errors (4xxx)
    pub fn message_not_found() -> Self {
        Self::new(4001, "message not found")
    }
    pub fn conv_not_found() -> Self {
        Self::new(4003, "conversation not found")
    }
    pub fn seq_alloc_failed() -> Self {
        Self::new(4004, "seq allocation failed")
    }
    pub fn send_failed() -> Self {
        Self::new(4005, "message send failed")
    }
    pub fn pull_failed() -> Self {
        Self::new(4006, "message pull failed")
    }

    // Gateway errors (5xxx)
    pub fn conn_over_limit() -> Self {
        Self::new(5001, "connection over max limit")
    }
    pub fn conn_closed() -> Self {
        Self::new(5002, "connection closed")
    }
    pub fn invalid_protocol() -> Self {
        Self::new(5003, "invalid protocol")
    }
    pub fn push_failed() -> Self {
        Self::new(5004, "push message failed")
    }
    pub fn user_id_mismatch() -> Self {
        Self::new(5005, "user id mismatch")
    }
    pub fn write_channel_full() -> Self {
        Self::new(5006, "write channel full")
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errcode {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ChatError {}

impl From<sqlx::Error> for ChatError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found(),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                Self::internal_server().with_details("database unavailable")
            }
            other => Self::internal_server().with_details(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ChatError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::invalid_param().with_details(err.to_string())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> axum::response::Response {
        let body = Json(ErrorBody {
            code: self.code,
            msg: self.message,
        });
        (StatusCode::OK, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_stay_in_their_families() {
        assert_eq!(ChatError::invalid_param().code, 1001);
        assert_eq!(ChatError::token_invalid().code, 2001);
        assert_eq!(ChatError::not_group_member().code, 3003);
        assert_eq!(ChatError::send_failed().code, 4005);
        assert_eq!(ChatError::conn_over_limit().code, 5001);
    }

    #[test]
    fn test_with_details_keeps_code() {
        let err = ChatError::send_failed().with_details("deadlock");
        assert_eq!(err.code, 4005);
        assert!(err.message.contains("deadlock"));
    }

    #[test]
    fn test_sqlx_row_not_found_maps_to_not_found() {
        let err: ChatError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.code, 1005);
    }
}
