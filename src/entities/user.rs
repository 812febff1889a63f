//! User entity - Entità utente

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub nickname: String,
    pub avatar: String,
    // mai serializzata verso il client
    #[serde(skip_serializing)]
    pub password: String,
    pub extra: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
