//! MessageRepository - Persistenza dei messaggi
//!
//! L'inserimento avviene sempre dentro la transazione di send; i pull
//! filtrano per conversazione e intervallo di seq, ordinati ASC e
//! limitati a 100.

use crate::core::consts::now_unix_milli;
use crate::entities::Message;
use crate::repositories::Tx;
use sqlx::{Error, MySqlPool, QueryBuilder};
use tracing::{debug, instrument};

pub const PULL_LIMIT: i64 = 100;

pub struct MessageRepository {
    pool: MySqlPool,
}

impl MessageRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Inserisce il messaggio e restituisce l'id assegnato dal database.
    #[instrument(skip(self, tx, msg), fields(conversation_id = %msg.conversation_id, seq = msg.seq))]
    pub async fn create(&self, tx: &mut Tx<'_>, msg: &Message) -> Result<i64, Error> {
        debug!("inserting message");
        let now = now_unix_milli();
        let result = sqlx::query(
            r#"
            INSERT INTO messages
                (conversation_id, seq, client_msg_id, sender_id, recv_id, group_id,
                 session_type, msg_type,
                 content_text, content_image, content_video, content_audio,
                 content_file, content_custom, extra,
                 send_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&msg.conversation_id)
        .bind(msg.seq)
        .bind(&msg.client_msg_id)
        .bind(&msg.sender_id)
        .bind(&msg.recv_id)
        .bind(&msg.group_id)
        .bind(msg.session_type)
        .bind(msg.msg_type)
        .bind(&msg.content_text)
        .bind(&msg.content_image)
        .bind(&msg.content_video)
        .bind(&msg.content_audio)
        .bind(&msg.content_file)
        .bind(&msg.content_custom)
        .bind(&msg.extra)
        .bind(msg.send_at)
        .bind(now)
        .bind(now)
        .execute(&mut **tx)
        .await?;
        Ok(result.last_insert_id() as i64)
    }

    /// Sonda di idempotenza: `(sender_id, client_msg_id)` è unico.
    pub async fn get_by_client_msg_id(
        &self,
        sender_id: &str,
        client_msg_id: &str,
    ) -> Result<Option<Message>, Error> {
        sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE sender_id = ? AND client_msg_id = ?",
        )
        .bind(sender_id)
        .bind(client_msg_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn pull_range(
        &self,
        conversation_id: &str,
        begin_seq: i64,
        end_seq: i64,
        limit: i64,
    ) -> Result<Vec<Message>, Error> {
        let limit = if limit <= 0 || limit > PULL_LIMIT {
            PULL_LIMIT
        } else {
            limit
        };
        sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = ? AND seq >= ? AND seq <= ?
            ORDER BY seq ASC
            LIMIT ?
            "#,
        )
        .bind(conversation_id)
        .bind(begin_seq)
        .bind(end_seq)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Pull per lista esplicita di seq (già filtrata sul range visibile
    /// dal chiamante), cap a 100.
    pub async fn pull_by_seq_list(
        &self,
        conversation_id: &str,
        seq_list: &[i64],
    ) -> Result<Vec<Message>, Error> {
        if seq_list.is_empty() {
            return Ok(Vec::new());
        }
        let capped = &seq_list[..seq_list.len().min(PULL_LIMIT as usize)];

        let mut builder =
            QueryBuilder::new("SELECT * FROM messages WHERE conversation_id = ");
        builder.push_bind(conversation_id);
        builder.push(" AND seq IN (");
        let mut separated = builder.separated(", ");
        for seq in capped {
            separated.push_bind(*seq);
        }
        separated.push_unseparated(") ORDER BY seq ASC");
        builder
            .build_query_as::<Message>()
            .fetch_all(&self.pool)
            .await
    }
}
