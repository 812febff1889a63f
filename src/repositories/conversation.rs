//! ConversationRepository - Viste conversazione per-owner
//!
//! Le viste sono create pigramente: le due righe di una chat singola
//! nascono (o vengono "toccate") dentro la transazione del primo send;
//! le viste di gruppo si materializzano al push. Ogni send bumpa
//! `updated_at`, che guida l'ordinamento della lista.

use crate::core::consts::{now_unix_milli, SESSION_TYPE_GROUP, SESSION_TYPE_SINGLE};
use crate::entities::{Conversation, ConversationWithSeq};
use crate::repositories::Tx;
use sqlx::{Error, MySqlPool, QueryBuilder};
use tracing::instrument;

pub struct ConversationRepository {
    pool: MySqlPool,
}

impl ConversationRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Upsert delle due viste di una chat singola con i peer incrociati.
    /// In conflitto aggiorna solo `updated_at` (touch).
    pub async fn ensure_single_chat(
        &self,
        tx: &mut Tx<'_>,
        conversation_id: &str,
        sender_id: &str,
        recv_id: &str,
    ) -> Result<(), Error> {
        let now = now_unix_milli();
        for (owner, peer) in [(sender_id, recv_id), (recv_id, sender_id)] {
            sqlx::query(
                r#"
                INSERT INTO conversations
                    (conversation_id, owner_id, conversation_type, peer_user_id, group_id,
                     recv_msg_opt, is_pinned, created_at, updated_at)
                VALUES (?, ?, ?, ?, '', 0, FALSE, ?, ?)
                ON DUPLICATE KEY UPDATE updated_at = VALUES(updated_at)
                "#,
            )
            .bind(conversation_id)
            .bind(owner)
            .bind(SESSION_TYPE_SINGLE)
            .bind(peer)
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Materializza (o tocca) le viste di gruppo per i membri indicati.
    /// Chiamata fuori dalla transazione di send, sul path di push.
    #[instrument(skip(self, member_ids), fields(conversation_id = %conversation_id))]
    pub async fn ensure_group_views(
        &self,
        conversation_id: &str,
        group_id: &str,
        member_ids: &[String],
    ) -> Result<(), Error> {
        if member_ids.is_empty() {
            return Ok(());
        }
        let now = now_unix_milli();
        let mut builder = QueryBuilder::new(
            "INSERT INTO conversations \
             (conversation_id, owner_id, conversation_type, peer_user_id, group_id, \
              recv_msg_opt, is_pinned, created_at, updated_at) ",
        );
        builder.push_values(member_ids, |mut row, owner| {
            row.push_bind(conversation_id)
                .push_bind(owner)
                .push_bind(SESSION_TYPE_GROUP)
                .push_bind("")
                .push_bind(group_id)
                .push_bind(0)
                .push_bind(false)
                .push_bind(now)
                .push_bind(now);
        });
        builder.push(" ON DUPLICATE KEY UPDATE updated_at = VALUES(updated_at)");
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    pub async fn get_by_owner_and_conv(
        &self,
        owner_id: &str,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, Error> {
        sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE owner_id = ? AND conversation_id = ?",
        )
        .bind(owner_id)
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Lista con seq: view ⨝ seq_conversations ⨝ seq_users, ordinata
    /// per `updated_at` discendente.
    pub async fn list_with_seq(&self, owner_id: &str) -> Result<Vec<ConversationWithSeq>, Error> {
        sqlx::query_as::<_, ConversationWithSeq>(
            r#"
            SELECT
                c.conversation_id,
                c.owner_id,
                c.conversation_type,
                c.peer_user_id,
                c.group_id,
                c.recv_msg_opt,
                c.is_pinned,
                c.updated_at,
                COALESCE(sc.max_seq, 0) AS max_seq,
                COALESCE(su.read_seq, 0) AS read_seq,
                GREATEST(0, COALESCE(sc.max_seq, 0) - COALESCE(su.read_seq, 0)) AS unread_count
            FROM conversations c
            LEFT JOIN seq_conversations sc ON sc.conversation_id = c.conversation_id
            LEFT JOIN seq_users su
                ON su.user_id = c.owner_id AND su.conversation_id = c.conversation_id
            WHERE c.owner_id = ?
            ORDER BY c.updated_at DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Update ristretto a pin e opzione di ricezione.
    pub async fn update_settings(
        &self,
        owner_id: &str,
        conversation_id: &str,
        recv_msg_opt: Option<i32>,
        is_pinned: Option<bool>,
    ) -> Result<(), Error> {
        if recv_msg_opt.is_none() && is_pinned.is_none() {
            return Ok(());
        }
        let mut builder = QueryBuilder::new("UPDATE conversations SET updated_at = ");
        builder.push_bind(now_unix_milli());
        if let Some(opt) = recv_msg_opt {
            builder.push(", recv_msg_opt = ");
            builder.push_bind(opt);
        }
        if let Some(pinned) = is_pinned {
            builder.push(", is_pinned = ");
            builder.push_bind(pinned);
        }
        builder.push(" WHERE owner_id = ");
        builder.push_bind(owner_id);
        builder.push(" AND conversation_id = ");
        builder.push_bind(conversation_id);
        builder.build().execute(&self.pool).await?;
        Ok(())
    }
}
