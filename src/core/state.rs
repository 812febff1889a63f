//! Application State - Stato globale dell'applicazione
//!
//! Contiene i repository, gli store caldi e la configurazione condivisi
//! da route, middleware e gateway.

use crate::config::Config;
use crate::hot::{PresenceMap, TokenStore};
use crate::repositories::{
    ConversationRepository, GroupRepository, MessageRepository, SeqRepository, UserRepository,
};
use crate::ws::gateway::{Gateway, PushTask, Pusher};
use sqlx::MySqlPool;
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;

pub struct AppState {
    /// Repository per la gestione degli utenti
    pub user: UserRepository,

    /// Repository per gruppi e membership
    pub group: GroupRepository,

    /// Repository per i messaggi
    pub msg: MessageRepository,

    /// Repository per le viste conversazione
    pub conv: ConversationRepository,

    /// Repository per sequenze e visibilità (incorpora il contatore caldo)
    pub seq: SeqRepository,

    /// Hash dei token di sessione (governance single-device-per-platform)
    pub token_store: TokenStore,

    /// Specchio dei flag online con TTL
    pub presence: PresenceMap,

    /// Coda dei push task verso il pool di worker del gateway
    pub pusher: Pusher,

    /// Gateway WebSocket, impostato dopo la costruzione dello stato
    /// (il gateway ha bisogno dello stato per i propri loop).
    gateway: OnceLock<Arc<Gateway>>,

    pub config: Config,
}

impl AppState {
    /// Crea lo stato con tutti i repository inizializzati sul pool
    /// condiviso. Restituisce anche il receiver della coda push, da
    /// consegnare al gateway.
    pub fn new(pool: MySqlPool, config: Config) -> (Arc<Self>, mpsc::Receiver<PushTask>) {
        let (push_tx, push_rx) = mpsc::channel(config.ws_push_queue_size);

        let state = Arc::new(Self {
            user: UserRepository::new(pool.clone()),
            group: GroupRepository::new(pool.clone()),
            msg: MessageRepository::new(pool.clone()),
            conv: ConversationRepository::new(pool.clone()),
            seq: SeqRepository::new(pool),
            token_store: TokenStore::new(config.jwt_expire_hours),
            presence: PresenceMap::new(),
            pusher: Pusher::new(push_tx),
            gateway: OnceLock::new(),
            config,
        });

        (state, push_rx)
    }

    pub fn attach_gateway(&self, gateway: Arc<Gateway>) {
        // seconda set ignorata: il gateway si collega una sola volta all'avvio
        let _ = self.gateway.set(gateway);
    }

    pub fn gateway(&self) -> Option<&Arc<Gateway>> {
        self.gateway.get()
    }
}
