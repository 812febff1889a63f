//! SeqRepository - Allocazione sequenze e contabilità di visibilità
//!
//! Il contatore caldo è l'autorità per l'allocazione; il `max_seq`
//! durevole avanza solo dentro la transazione di send. In caso di
//! commit fallito il buco resta confinato al contatore caldo: al
//! riavvio la re-idratazione dal durevole recupera il massimo vero.

use crate::entities::{SeqConversation, SeqUser};
use crate::hot::SeqCounter;
use crate::repositories::Tx;
use sqlx::{Error, MySqlPool};
use tracing::instrument;

pub struct SeqRepository {
    pool: MySqlPool,
    counter: SeqCounter,
}

impl SeqRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            counter: SeqCounter::new(),
        }
    }

    /// Pool condiviso, usato dai service per aprire la transazione di send.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Alloca il prossimo seq per la conversazione. Idrata il contatore
    /// dal massimo durevole al primo uso (e dopo un riavvio).
    #[instrument(skip(self))]
    pub async fn alloc_seq(&self, conversation_id: &str) -> Result<i64, Error> {
        if !self.counter.is_loaded(conversation_id) {
            let durable = self.durable_max_seq(conversation_id).await?;
            self.counter.hydrate(conversation_id, durable);
        }
        Ok(self.counter.next(conversation_id))
    }

    /// Massimo corrente: contatore caldo se presente, altrimenti
    /// fallback sul durevole con ripristino del contatore.
    pub async fn get_max_seq(&self, conversation_id: &str) -> Result<i64, Error> {
        if let Some(current) = self.counter.current(conversation_id) {
            return Ok(current);
        }
        let durable = self.durable_max_seq(conversation_id).await?;
        self.counter.hydrate(conversation_id, durable);
        Ok(durable)
    }

    async fn durable_max_seq(&self, conversation_id: &str) -> Result<i64, Error> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT max_seq FROM seq_conversations WHERE conversation_id = ?")
                .bind(conversation_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(max.unwrap_or(0))
    }

    /// Lettura con row lock, usata dalle transizioni di membership per
    /// linearizzare "primo seq osservabile" e "prossima allocazione".
    pub async fn max_seq_for_update(
        &self,
        tx: &mut Tx<'_>,
        conversation_id: &str,
    ) -> Result<i64, Error> {
        let max: Option<i64> = sqlx::query_scalar(
            "SELECT max_seq FROM seq_conversations WHERE conversation_id = ? FOR UPDATE",
        )
        .bind(conversation_id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(max.unwrap_or(0))
    }

    /// Avanza il max_seq durevole dentro la transazione di send.
    /// GREATEST rende l'upsert sicuro rispetto a commit fuori ordine.
    pub async fn sync_max_seq(
        &self,
        tx: &mut Tx<'_>,
        conversation_id: &str,
        seq: i64,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO seq_conversations (conversation_id, max_seq, min_seq)
            VALUES (?, ?, 0)
            ON DUPLICATE KEY UPDATE max_seq = GREATEST(max_seq, ?)
            "#,
        )
        .bind(conversation_id)
        .bind(seq)
        .bind(seq)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Garantisce l'esistenza della riga seq_conversations (creazione gruppo).
    pub async fn ensure_conversation(
        &self,
        tx: &mut Tx<'_>,
        conversation_id: &str,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO seq_conversations (conversation_id, max_seq, min_seq)
            VALUES (?, 0, 0)
            ON DUPLICATE KEY UPDATE conversation_id = conversation_id
            "#,
        )
        .bind(conversation_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn get_conversation_seq(
        &self,
        conversation_id: &str,
    ) -> Result<SeqConversation, Error> {
        let row = sqlx::query_as::<_, SeqConversation>(
            "SELECT * FROM seq_conversations WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.unwrap_or(SeqConversation {
            conversation_id: conversation_id.to_string(),
            max_seq: 0,
            min_seq: 0,
        }))
    }

    pub async fn get_seq_user(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<Option<SeqUser>, Error> {
        sqlx::query_as::<_, SeqUser>(
            "SELECT * FROM seq_users WHERE user_id = ? AND conversation_id = ?",
        )
        .bind(user_id)
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Apre la visibilità al join: min_seq al seq di ingresso, max_seq
    /// azzerato (riapre i rejoiner), read_seq appena sotto il min.
    pub async fn set_user_min_seq(
        &self,
        tx: &mut Tx<'_>,
        user_id: &str,
        conversation_id: &str,
        min_seq: i64,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO seq_users (user_id, conversation_id, min_seq, max_seq, read_seq)
            VALUES (?, ?, ?, 0, ?)
            ON DUPLICATE KEY UPDATE min_seq = ?, max_seq = 0, read_seq = ?
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(min_seq)
        .bind(min_seq - 1)
        .bind(min_seq)
        .bind(min_seq - 1)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Congela la visibilità al quit: max_seq = ultimo seq leggibile.
    pub async fn set_user_max_seq(
        &self,
        tx: &mut Tx<'_>,
        user_id: &str,
        conversation_id: &str,
        max_seq: i64,
    ) -> Result<(), Error> {
        sqlx::query(
            "UPDATE seq_users SET max_seq = ? WHERE user_id = ? AND conversation_id = ?",
        )
        .bind(max_seq)
        .bind(user_id)
        .bind(conversation_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Avanza il cursore di lettura; mai all'indietro.
    #[instrument(skip(self))]
    pub async fn update_read_seq(
        &self,
        user_id: &str,
        conversation_id: &str,
        read_seq: i64,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO seq_users (user_id, conversation_id, min_seq, max_seq, read_seq)
            VALUES (?, ?, 0, 0, ?)
            ON DUPLICATE KEY UPDATE read_seq = GREATEST(read_seq, ?)
            "#,
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(read_seq)
        .bind(read_seq)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
