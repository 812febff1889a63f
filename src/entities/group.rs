//! Group entities - Gruppo e membership

use crate::core::consts::{GROUP_MEMBER_STATUS_NORMAL, GROUP_STATUS_NORMAL, ROLE_LEVEL_OWNER};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub introduction: String,
    pub avatar: String,
    pub extra: Option<String>,
    pub status: i32,
    pub creator_user_id: String,
    pub group_type: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Group {
    pub fn is_normal(&self) -> bool {
        self.status == GROUP_STATUS_NORMAL
    }
}

/// Riga di membership: `(group_id, user_id)` è unica, un rejoin
/// aggiorna la riga esistente invece di inserirne una nuova.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroupMember {
    pub id: i64,
    pub group_id: String,
    pub user_id: String,
    pub group_nickname: String,
    pub role_level: i32,
    pub status: i32,
    pub joined_at: i64,
    pub join_seq: i64,
    pub inviter_user_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl GroupMember {
    pub fn is_normal(&self) -> bool {
        self.status == GROUP_MEMBER_STATUS_NORMAL
    }

    pub fn is_owner(&self) -> bool {
        self.role_level == ROLE_LEVEL_OWNER
    }
}
