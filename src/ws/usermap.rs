//! UserMap - Multiplexing per utente delle sessioni attive
//!
//! `user_id -> lista di sessioni` in ordine di inserimento (più device
//! e piattaforme contemporanei). Read-heavy: ogni push fa uno snapshot
//! sotto read lock; register/unregister sono i rari scrittori e
//! arrivano già serializzati dall'event loop del gateway.

use crate::ws::session::Session;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct UserMap {
    users: RwLock<HashMap<String, Vec<Arc<Session>>>>,
}

impl UserMap {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Aggiunge la sessione; true se l'utente non aveva altre connessioni.
    pub fn register(&self, session: Arc<Session>) -> bool {
        let mut users = self.users.write().unwrap();
        let sessions = users.entry(session.user_id.clone()).or_default();
        let was_offline = sessions.is_empty();
        sessions.push(session);
        was_offline
    }

    /// Rimuove per conn_id; true se l'utente è rimasto senza connessioni.
    pub fn unregister(&self, user_id: &str, conn_id: &str) -> bool {
        let mut users = self.users.write().unwrap();
        let Some(sessions) = users.get_mut(user_id) else {
            return false;
        };
        sessions.retain(|s| s.conn_id != conn_id);
        if sessions.is_empty() {
            users.remove(user_id);
            return true;
        }
        false
    }

    /// Snapshot delle sessioni di un utente (copia sotto read lock, i
    /// push non tengono il lock durante le scritture sulle code).
    pub fn get_all(&self, user_id: &str) -> Vec<Arc<Session>> {
        let users = self.users.read().unwrap();
        users.get(user_id).cloned().unwrap_or_default()
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        let users = self.users.read().unwrap();
        users.get(user_id).is_some_and(|s| !s.is_empty())
    }

    pub fn online_user_count(&self) -> usize {
        self.users.read().unwrap().len()
    }

    pub fn online_conn_count(&self) -> usize {
        self.users.read().unwrap().values().map(Vec::len).sum()
    }

    pub fn all_user_ids(&self) -> Vec<String> {
        self.users.read().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(user_id: &str, conn_id: &str) -> Arc<Session> {
        let (session, _rx, _close) = Session::new(
            user_id.to_string(),
            5,
            String::new(),
            "token".to_string(),
            conn_id.to_string(),
            4,
        );
        Arc::new(session)
    }

    #[test]
    fn test_register_reports_first_connection() {
        let map = UserMap::new();
        assert!(map.register(session("alice", "c1")));
        assert!(!map.register(session("alice", "c2")));
        assert_eq!(map.online_user_count(), 1);
        assert_eq!(map.online_conn_count(), 2);
    }

    #[test]
    fn test_unregister_by_conn_id_keeps_other_devices() {
        let map = UserMap::new();
        map.register(session("alice", "c1"));
        map.register(session("alice", "c2"));

        assert!(!map.unregister("alice", "c1"));
        assert!(map.is_online("alice"));
        assert_eq!(map.online_conn_count(), 1);

        assert!(map.unregister("alice", "c2"));
        assert!(!map.is_online("alice"));
        assert_eq!(map.online_user_count(), 0);
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let map = UserMap::new();
        assert!(!map.unregister("ghost", "c1"));
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let map = UserMap::new();
        map.register(session("alice", "c1"));
        map.register(session("alice", "c2"));
        let snapshot = map.get_all("alice");
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].conn_id, "c1");
        assert_eq!(snapshot[1].conn_id, "c2");
    }

    #[test]
    fn test_counts_match_map_contents() {
        let map = UserMap::new();
        map.register(session("alice", "c1"));
        map.register(session("bob", "c2"));
        map.register(session("bob", "c3"));
        assert_eq!(map.online_user_count(), map.all_user_ids().len());
        assert_eq!(map.online_conn_count(), 3);
    }
}
