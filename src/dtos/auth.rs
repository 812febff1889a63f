//! Auth DTOs - Registrazione e login

use crate::dtos::user::UserInfo;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Id esplicito opzionale; se assente il server ne genera uno.
    #[serde(default)]
    pub user_id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub nickname: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
    pub platform_id: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_info: UserInfo,
}
