//! Gateway - Registrazione sessioni e fan-out dei push
//!
//! Register e unregister passano da due canali bounded consumati da un
//! unico event loop: i contatori online restano coerenti senza lock a
//! grana fine e una sessione non può ricevere push in concorrenza con
//! la propria rimozione. Un pool fisso di worker drena la coda dei
//! push task; se la coda è piena il messaggio esce dal path real-time
//! (i destinatari lo recuperano via pull).

use crate::core::state::AppState;
use crate::dtos::message::MessageData;
use crate::entities::Message;
use crate::ws::session::Session;
use crate::ws::usermap::UserMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

/// Task di push: messaggio committato + destinatari + connessione
/// opzionale da escludere.
pub struct PushTask {
    pub msg: Message,
    pub target_ids: Vec<String>,
    pub exclude_conn_id: Option<String>,
}

/// Lato produttore della coda push, posseduto dallo stato applicativo.
pub struct Pusher {
    tx: mpsc::Sender<PushTask>,
}

impl Pusher {
    pub fn new(tx: mpsc::Sender<PushTask>) -> Self {
        Self { tx }
    }

    /// Accoda senza bloccare: best-effort per contratto, la vista
    /// autoritativa resta lo stream persistito dei seq.
    pub fn push_to_users(&self, msg: Message, target_ids: Vec<String>, exclude_conn_id: Option<String>) {
        let conversation_id = msg.conversation_id.clone();
        let seq = msg.seq;
        let task = PushTask {
            msg,
            target_ids,
            exclude_conn_id,
        };
        if self.tx.try_send(task).is_err() {
            warn!(
                conversation_id = %conversation_id,
                seq,
                "push queue full or closed, message dropped from real-time path"
            );
        }
    }
}

pub struct Gateway {
    state: Arc<AppState>,
    pub user_map: UserMap,
    register_tx: mpsc::Sender<Arc<Session>>,
    unregister_tx: mpsc::Sender<Arc<Session>>,
    online_user_count: AtomicI64,
    online_conn_count: AtomicI64,
    max_conn_num: i64,
}

impl Gateway {
    /// Costruisce il gateway e avvia event loop e worker di push.
    pub fn start(
        state: Arc<AppState>,
        push_rx: mpsc::Receiver<PushTask>,
        shutdown: watch::Receiver<bool>,
    ) -> Arc<Self> {
        let (register_tx, register_rx) = mpsc::channel(1000);
        let (unregister_tx, unregister_rx) = mpsc::channel(1000);

        let gateway = Arc::new(Self {
            max_conn_num: state.config.ws_max_conn_num,
            user_map: UserMap::new(),
            register_tx,
            unregister_tx,
            online_user_count: AtomicI64::new(0),
            online_conn_count: AtomicI64::new(0),
            state,
        });

        tokio::spawn(event_loop(
            gateway.clone(),
            register_rx,
            unregister_rx,
            shutdown.clone(),
        ));

        let worker_num = gateway.state.config.ws_push_worker_num.max(1);
        let shared_rx = Arc::new(Mutex::new(push_rx));
        for worker_id in 0..worker_num {
            tokio::spawn(push_loop(
                gateway.clone(),
                shared_rx.clone(),
                shutdown.clone(),
                worker_id,
            ));
        }
        info!(worker_num, "started push workers");

        gateway
    }

    /// Cap globale sulle connessioni, applicato all'upgrade.
    pub fn can_accept(&self) -> bool {
        self.online_conn_count.load(Ordering::Relaxed) < self.max_conn_num
    }

    pub fn queue_register(&self, session: Arc<Session>) {
        if self.register_tx.try_send(session).is_err() {
            warn!("register channel full, session dropped");
        }
    }

    pub fn queue_unregister(&self, session: Arc<Session>) {
        if let Err(e) = self.unregister_tx.try_send(session) {
            if let mpsc::error::TrySendError::Full(session) = e {
                warn!(user_id = %session.user_id, "unregister channel full");
            }
        }
    }

    pub fn online_user_count(&self) -> i64 {
        self.online_user_count.load(Ordering::Relaxed)
    }

    pub fn online_conn_count(&self) -> i64 {
        self.online_conn_count.load(Ordering::Relaxed)
    }

    /// Chiude le sessioni di un utente con il frame kick 2002.
    /// `platform_id = None` colpisce tutte le piattaforme;
    /// `keep_token` risparmia la sessione del token appena emesso.
    pub fn kick_sessions(&self, user_id: &str, platform_id: Option<i32>, keep_token: Option<&str>) {
        for session in self.user_map.get_all(user_id) {
            if let Some(platform) = platform_id {
                if session.platform_id != platform {
                    continue;
                }
            }
            if let Some(token) = keep_token {
                if session.token == token {
                    continue;
                }
            }
            session.kick();
        }
    }

    fn register_session(&self, session: Arc<Session>) {
        let user_id = session.user_id.clone();
        let platform_id = session.platform_id;
        let conn_id = session.conn_id.clone();

        let was_offline = self.user_map.register(session);
        if was_offline {
            self.online_user_count.fetch_add(1, Ordering::Relaxed);
        }
        self.online_conn_count.fetch_add(1, Ordering::Relaxed);
        self.state.presence.set_online(&user_id);

        info!(
            user_id = %user_id,
            platform_id,
            conn_id = %conn_id,
            online_users = self.online_user_count(),
            online_conns = self.online_conn_count(),
            "session registered"
        );
    }

    fn unregister_session(&self, session: Arc<Session>) {
        let user_offline = self
            .user_map
            .unregister(&session.user_id, &session.conn_id);
        self.online_conn_count.fetch_sub(1, Ordering::Relaxed);
        if user_offline {
            self.online_user_count.fetch_sub(1, Ordering::Relaxed);
            self.state.presence.set_offline(&session.user_id);
        }

        info!(
            user_id = %session.user_id,
            conn_id = %session.conn_id,
            user_offline,
            online_users = self.online_user_count(),
            online_conns = self.online_conn_count(),
            "session unregistered"
        );
    }

    /// Consegna un task di push: snapshot delle sessioni per ogni
    /// destinatario, poi scrittura sulle code outbound. Una coda piena
    /// chiude la sessione lenta (il client recupera via pull).
    fn process_push_task(&self, task: PushTask) {
        let data = MessageData::from(&task.msg);

        for user_id in &task.target_ids {
            for session in self.user_map.get_all(user_id) {
                if let Some(exclude) = &task.exclude_conn_id {
                    if &session.conn_id == exclude {
                        continue;
                    }
                }
                if let Err(e) = session.push_message(&data) {
                    debug!(
                        user_id = %user_id,
                        conn_id = %session.conn_id,
                        error = %e,
                        "push to session failed"
                    );
                    if e.code == crate::core::error::ChatError::write_channel_full().code {
                        session.close();
                    }
                }
            }
        }
    }
}

async fn event_loop(
    gateway: Arc<Gateway>,
    mut register_rx: mpsc::Receiver<Arc<Session>>,
    mut unregister_rx: mpsc::Receiver<Arc<Session>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("gateway event loop stopped");
                return;
            }
            session = register_rx.recv() => match session {
                Some(session) => gateway.register_session(session),
                None => return,
            },
            session = unregister_rx.recv() => match session {
                Some(session) => gateway.unregister_session(session),
                None => return,
            },
        }
    }
}

async fn push_loop(
    gateway: Arc<Gateway>,
    shared_rx: Arc<Mutex<mpsc::Receiver<PushTask>>>,
    mut shutdown: watch::Receiver<bool>,
    worker_id: usize,
) {
    loop {
        let task = {
            let mut rx = shared_rx.lock().await;
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!(worker_id, "push worker stopped");
                    return;
                }
                task = rx.recv() => task,
            }
        };
        match task {
            Some(task) => gateway.process_push_task(task),
            None => return,
        }
    }
}
