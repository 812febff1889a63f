//! User DTOs

use crate::entities::User;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Rappresentazione pubblica dell'utente (senza password).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub nickname: String,
    pub avatar: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    pub created_at: i64,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            nickname: user.nickname,
            avatar: user.avatar,
            extra: user.extra,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 255))]
    pub nickname: Option<String>,
    #[validate(length(max = 512))]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchUserInfoRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnlineStatusRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserOnlineStatus {
    pub user_id: String,
    pub online: bool,
}
