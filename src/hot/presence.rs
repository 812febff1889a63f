//! Flag di presenza online con TTL.
//!
//! Specchio coarse-grained dello stato online tenuto accanto alla
//! UserMap del gateway: il flag sopravvive al massimo `ONLINE_TTL`
//! senza refresh, così una sessione morta senza unregister non resta
//! online per sempre.

use dashmap::DashMap;
use std::time::{Duration, Instant};

const ONLINE_TTL: Duration = Duration::from_secs(60);

#[derive(Default)]
pub struct PresenceMap {
    flags: DashMap<String, Instant>,
}

impl PresenceMap {
    pub fn new() -> Self {
        Self {
            flags: DashMap::new(),
        }
    }

    pub fn set_online(&self, user_id: &str) {
        self.flags
            .insert(user_id.to_string(), Instant::now() + ONLINE_TTL);
    }

    pub fn set_offline(&self, user_id: &str) {
        self.flags.remove(user_id);
    }

    /// Estende il TTL di un utente ancora connesso.
    pub fn refresh(&self, user_id: &str) {
        if let Some(mut deadline) = self.flags.get_mut(user_id) {
            *deadline = Instant::now() + ONLINE_TTL;
        }
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        let live = match self.flags.get(user_id) {
            Some(deadline) => *deadline > Instant::now(),
            None => return false,
        };
        if !live {
            self.flags.remove(user_id);
        }
        live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_online_offline_cycle() {
        let presence = PresenceMap::new();
        assert!(!presence.is_online("alice"));

        presence.set_online("alice");
        assert!(presence.is_online("alice"));

        presence.set_offline("alice");
        assert!(!presence.is_online("alice"));
    }

    #[test]
    fn test_refresh_unknown_user_is_noop() {
        let presence = PresenceMap::new();
        presence.refresh("ghost");
        assert!(!presence.is_online("ghost"));
    }
}
