//! Sequence records - Contabilità delle sequenze
//!
//! `seq_conversations` tiene il massimo committato per conversazione;
//! `seq_users` tiene l'intervallo visibile e il cursore di lettura di
//! ogni utente. Invariante: l'insieme dei seq committati di una
//! conversazione è esattamente `{1..=max_seq}` senza buchi.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeqConversation {
    pub conversation_id: String,
    pub max_seq: i64,
    pub min_seq: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SeqUser {
    pub id: i64,
    pub user_id: String,
    pub conversation_id: String,
    /// Primo seq leggibile (impostato al join).
    pub min_seq: i64,
    /// Ultimo seq leggibile; 0 significa nessun limite superiore
    /// (impostato al quit per congelare la visibilità).
    pub max_seq: i64,
    /// Cursore di lettura, monotono non decrescente.
    pub read_seq: i64,
}

impl SeqUser {
    /// Intervallo visibile effettivo dati i limiti dell'utente e il
    /// massimo della conversazione.
    pub fn visible_range(&self, conv_max_seq: i64) -> (i64, i64) {
        let min_seq = self.min_seq;
        let mut max_seq = conv_max_seq;
        if self.max_seq > 0 && self.max_seq < max_seq {
            max_seq = self.max_seq;
        }
        (min_seq, max_seq)
    }

    /// Clampa l'intervallo richiesto dal client dentro quello visibile.
    pub fn clamp_range(&self, begin_seq: i64, end_seq: i64, conv_max_seq: i64) -> (i64, i64) {
        let (min_visible, max_visible) = self.visible_range(conv_max_seq);
        let begin = begin_seq.max(min_visible);
        let end = end_seq.min(max_visible);
        (begin, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq_user(min_seq: i64, max_seq: i64) -> SeqUser {
        SeqUser {
            id: 1,
            user_id: "alice".to_string(),
            conversation_id: "sg_g1".to_string(),
            min_seq,
            max_seq,
            read_seq: 0,
        }
    }

    #[test]
    fn test_visible_range_unbounded_member() {
        let user = seq_user(1, 0);
        assert_eq!(user.visible_range(10), (1, 10));
    }

    #[test]
    fn test_visible_range_late_joiner() {
        // min_seq = max_seq+1 al momento del join: la storia resta invisibile
        let user = seq_user(6, 0);
        assert_eq!(user.visible_range(8), (6, 8));
    }

    #[test]
    fn test_visible_range_after_quit() {
        // max_seq fissato al quit: i messaggi successivi restano invisibili
        let user = seq_user(1, 2);
        assert_eq!(user.visible_range(4), (1, 2));
    }

    #[test]
    fn test_clamp_request_inside_visible_window() {
        let user = seq_user(6, 0);
        assert_eq!(user.clamp_range(1, 100, 8), (6, 8));
        // richiesta interamente sopra il massimo -> intervallo vuoto (begin > end)
        let (begin, end) = user.clamp_range(20, 100, 8);
        assert!(begin > end);
    }

    #[test]
    fn test_clamp_respects_quit_upper_bound() {
        let user = seq_user(1, 2);
        assert_eq!(user.clamp_range(1, 100, 4), (1, 2));
    }
}
