//! Group DTOs - Creazione, transizioni di membership e letture

use crate::entities::{Group, GroupMember};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Membri iniziali: vedono il gruppo dal seq 1 come il creatore.
    #[serde(default)]
    pub member_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JoinGroupRequest {
    #[validate(length(min = 1, max = 64))]
    pub group_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuitGroupRequest {
    #[validate(length(min = 1, max = 64))]
    pub group_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DismissGroupRequest {
    #[validate(length(min = 1, max = 64))]
    pub group_id: String,
}

/// Query string di `GET /group/info` e `GET /group/members`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupQuery {
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupInfo {
    pub id: String,
    pub name: String,
    pub introduction: String,
    pub avatar: String,
    pub status: i32,
    pub creator_user_id: String,
    pub member_count: i64,
    pub created_at: i64,
}

impl GroupInfo {
    pub fn from_group(group: Group, member_count: i64) -> Self {
        Self {
            id: group.id,
            name: group.name,
            introduction: group.introduction,
            avatar: group.avatar,
            status: group.status,
            creator_user_id: group.creator_user_id,
            member_count,
            created_at: group.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupMemberInfo {
    pub user_id: String,
    pub group_nickname: String,
    pub role_level: i32,
    pub join_seq: i64,
    pub joined_at: i64,
}

impl From<GroupMember> for GroupMemberInfo {
    fn from(member: GroupMember) -> Self {
        Self {
            user_id: member.user_id,
            group_nickname: member.group_nickname,
            role_level: member.role_level,
            join_seq: member.join_seq,
            joined_at: member.joined_at,
        }
    }
}
