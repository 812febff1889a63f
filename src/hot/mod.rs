//! Hot store - Stato caldo in-process
//!
//! Contatori di sequenza, flag di presenza online e hash dei token
//! vivono in mappe concorrenti locali al processo. Le interfacce
//! ricalcano le primitive di uno store distribuito (INCR, hash per
//! token, TTL sui flag) così che un deployment multi-istanza possa
//! sostituirle senza toccare i chiamanti.

pub mod counter;
pub mod presence;
pub mod tokens;

pub use counter::SeqCounter;
pub use presence::PresenceMap;
pub use tokens::{TokenStatus, TokenStore};
