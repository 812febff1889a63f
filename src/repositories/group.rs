//! GroupRepository - Gruppi e membership
//!
//! `(group_id, user_id)` è unico: l'upsert del membro gestisce il
//! rejoin aggiornando la riga esistente.

use crate::core::consts::{now_unix_milli, GROUP_MEMBER_STATUS_NORMAL, GROUP_STATUS_DISMISSED};
use crate::entities::{Group, GroupMember};
use crate::repositories::Tx;
use sqlx::{Error, MySqlPool};
use tracing::{debug, instrument};

pub struct GroupRepository {
    pool: MySqlPool,
}

impl GroupRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, tx, group), fields(group_id = %group.id))]
    pub async fn create(&self, tx: &mut Tx<'_>, group: &Group) -> Result<(), Error> {
        debug!("creating group");
        sqlx::query(
            r#"
            INSERT INTO `groups`
                (id, name, introduction, avatar, extra, status, creator_user_id, group_type,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.introduction)
        .bind(&group.avatar)
        .bind(&group.extra)
        .bind(group.status)
        .bind(&group.creator_user_id)
        .bind(group.group_type)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<Group>, Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM `groups` WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn get_by_id_tx(&self, tx: &mut Tx<'_>, id: &str) -> Result<Option<Group>, Error> {
        sqlx::query_as::<_, Group>("SELECT * FROM `groups` WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    #[instrument(skip(self))]
    pub async fn dismiss(&self, id: &str) -> Result<(), Error> {
        sqlx::query("UPDATE `groups` SET status = ?, updated_at = ? WHERE id = ?")
            .bind(GROUP_STATUS_DISMISSED)
            .bind(now_unix_milli())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Upsert del membro: un rejoin riporta la riga a Normal con il
    /// nuovo join_seq invece di inserirne una seconda.
    pub async fn add_member(&self, tx: &mut Tx<'_>, member: &GroupMember) -> Result<(), Error> {
        let now = now_unix_milli();
        sqlx::query(
            r#"
            INSERT INTO group_members
                (group_id, user_id, group_nickname, role_level, status, joined_at, join_seq,
                 inviter_user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                status = VALUES(status),
                joined_at = VALUES(joined_at),
                join_seq = VALUES(join_seq),
                role_level = VALUES(role_level),
                inviter_user_id = VALUES(inviter_user_id),
                updated_at = VALUES(updated_at)
            "#,
        )
        .bind(&member.group_id)
        .bind(&member.user_id)
        .bind(&member.group_nickname)
        .bind(member.role_level)
        .bind(member.status)
        .bind(member.joined_at)
        .bind(member.join_seq)
        .bind(&member.inviter_user_id)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn get_member(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<GroupMember>, Error> {
        sqlx::query_as::<_, GroupMember>(
            "SELECT * FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn get_member_tx(
        &self,
        tx: &mut Tx<'_>,
        group_id: &str,
        user_id: &str,
    ) -> Result<Option<GroupMember>, Error> {
        sqlx::query_as::<_, GroupMember>(
            "SELECT * FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
    }

    pub async fn update_member_status(
        &self,
        tx: &mut Tx<'_>,
        group_id: &str,
        user_id: &str,
        status: i32,
    ) -> Result<(), Error> {
        sqlx::query(
            "UPDATE group_members SET status = ?, updated_at = ? WHERE group_id = ? AND user_id = ?",
        )
        .bind(status)
        .bind(now_unix_milli())
        .bind(group_id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn active_members(&self, group_id: &str) -> Result<Vec<GroupMember>, Error> {
        sqlx::query_as::<_, GroupMember>(
            "SELECT * FROM group_members WHERE group_id = ? AND status = ? ORDER BY joined_at ASC",
        )
        .bind(group_id)
        .bind(GROUP_MEMBER_STATUS_NORMAL)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn active_member_ids(&self, group_id: &str) -> Result<Vec<String>, Error> {
        sqlx::query_scalar(
            "SELECT user_id FROM group_members WHERE group_id = ? AND status = ?",
        )
        .bind(group_id)
        .bind(GROUP_MEMBER_STATUS_NORMAL)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn active_member_count(&self, group_id: &str) -> Result<i64, Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ? AND status = ?",
        )
        .bind(group_id)
        .bind(GROUP_MEMBER_STATUS_NORMAL)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn is_active_member(&self, group_id: &str, user_id: &str) -> Result<bool, Error> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_members WHERE group_id = ? AND user_id = ? AND status = ?",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(GROUP_MEMBER_STATUS_NORMAL)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }
}
