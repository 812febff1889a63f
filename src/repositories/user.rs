//! UserRepository - Gestione utenti

use crate::core::consts::now_unix_milli;
use crate::entities::User;
use sqlx::{Error, MySqlPool, QueryBuilder};
use tracing::{debug, instrument};

pub struct UserRepository {
    pool: MySqlPool,
}

impl UserRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create(&self, user: &User) -> Result<(), Error> {
        debug!("creating user");
        sqlx::query(
            r#"
            INSERT INTO users (id, nickname, avatar, password, extra, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.nickname)
        .bind(&user.avatar)
        .bind(&user.password)
        .bind(&user.extra)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<User>, Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Lettura batch; l'ordine del risultato è quello del database,
    /// non quello degli id richiesti.
    pub async fn get_many(&self, ids: &[String]) -> Result<Vec<User>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::new("SELECT * FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");
        builder.build_query_as::<User>().fetch_all(&self.pool).await
    }

    #[instrument(skip(self))]
    pub async fn update_profile(
        &self,
        id: &str,
        nickname: Option<&str>,
        avatar: Option<&str>,
    ) -> Result<(), Error> {
        if nickname.is_none() && avatar.is_none() {
            return Ok(());
        }
        let mut builder = QueryBuilder::new("UPDATE users SET updated_at = ");
        builder.push_bind(now_unix_milli());
        if let Some(nickname) = nickname {
            builder.push(", nickname = ");
            builder.push_bind(nickname);
        }
        if let Some(avatar) = avatar {
            builder.push(", avatar = ");
            builder.push_bind(avatar);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        builder.build().execute(&self.pool).await?;
        Ok(())
    }
}
