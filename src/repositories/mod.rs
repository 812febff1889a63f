//! Repositories module - Accesso dati
//!
//! Ogni repository incapsula le query per una entità e riceve il pool
//! condiviso. Le operazioni che devono essere atomiche con altre
//! (inserimento messaggi, sync del max_seq, transizioni di membership)
//! accettano una transazione esterna invece del pool.

pub mod conversation;
pub mod group;
pub mod message;
pub mod seq;
pub mod user;

pub use conversation::ConversationRepository;
pub use group::GroupRepository;
pub use message::MessageRepository;
pub use seq::SeqRepository;
pub use user::UserRepository;

/// Transazione MySQL passata ai metodi repository che partecipano a un
/// commit atomico orchestrato dal service.
pub type Tx<'a> = sqlx::Transaction<'a, sqlx::MySql>;
