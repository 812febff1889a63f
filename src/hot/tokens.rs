//! Token store - Governance delle sessioni di autenticazione.
//!
//! Hash per `(user_id, platform_id)`: ogni voce mappa un token al suo
//! stato. La policy è single-device-per-platform: al login il nuovo
//! token entra come Normal e tutti gli altri Normal della stessa coppia
//! vengono marcati Kicked. L'intero set scade insieme (TTL rinnovato ad
//! ogni login).

use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Normal,
    Kicked,
    Expired,
    Logout,
}

struct PlatformTokens {
    tokens: HashMap<String, TokenStatus>,
    expires_at: Instant,
}

pub struct TokenStore {
    entries: DashMap<(String, i32), PlatformTokens>,
    expire: Duration,
}

impl TokenStore {
    pub fn new(expire_hours: i64) -> Self {
        Self {
            entries: DashMap::new(),
            expire: Duration::from_secs((expire_hours.max(1) as u64) * 3600),
        }
    }

    /// Registra un token appena emesso come Normal e rinnova il TTL del set.
    pub fn store(&self, user_id: &str, platform_id: i32, token: &str) {
        let mut entry = self
            .entries
            .entry((user_id.to_string(), platform_id))
            .or_insert_with(|| PlatformTokens {
                tokens: HashMap::new(),
                expires_at: Instant::now() + self.expire,
            });
        entry.tokens.insert(token.to_string(), TokenStatus::Normal);
        entry.expires_at = Instant::now() + self.expire;
    }

    /// Stato corrente di un token. `None` se sconosciuto; `Expired` se
    /// il set è oltre il proprio TTL.
    pub fn status(&self, user_id: &str, platform_id: i32, token: &str) -> Option<TokenStatus> {
        let key = (user_id.to_string(), platform_id);
        let entry = self.entries.get(&key)?;
        if entry.expires_at <= Instant::now() {
            return Some(TokenStatus::Expired);
        }
        entry.tokens.get(token).copied()
    }

    pub fn is_valid(&self, user_id: &str, platform_id: i32, token: &str) -> bool {
        self.status(user_id, platform_id, token) == Some(TokenStatus::Normal)
    }

    /// Marca Kicked ogni altro token Normal della stessa coppia
    /// `(user, platform)`. Ritorna i token colpiti, così il gateway può
    /// chiudere le sessioni corrispondenti.
    pub fn kick_others(&self, user_id: &str, platform_id: i32, current_token: &str) -> Vec<String> {
        let key = (user_id.to_string(), platform_id);
        let mut kicked = Vec::new();
        if let Some(mut entry) = self.entries.get_mut(&key) {
            for (token, status) in entry.tokens.iter_mut() {
                if token != current_token && *status == TokenStatus::Normal {
                    *status = TokenStatus::Kicked;
                    kicked.push(token.clone());
                }
            }
        }
        kicked
    }

    /// Logout esplicito: il token resta registrato ma non è più valido.
    pub fn invalidate(&self, user_id: &str, platform_id: i32, token: &str) {
        let key = (user_id.to_string(), platform_id);
        if let Some(mut entry) = self.entries.get_mut(&key) {
            if let Some(status) = entry.tokens.get_mut(token) {
                *status = TokenStatus::Logout;
            }
        }
    }

    /// Forza il logout su tutte le piattaforme dell'utente.
    pub fn force_logout(&self, user_id: &str) {
        self.entries.retain(|(uid, _), _| uid != user_id);
    }

    /// Rimuove i token non più Normal di una coppia (pulizia periodica).
    pub fn clean_stale(&self, user_id: &str, platform_id: i32) {
        let key = (user_id.to_string(), platform_id);
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry
                .tokens
                .retain(|_, status| *status == TokenStatus::Normal);
        }
    }
}
