//! Session - Una connessione WebSocket accettata e la sua identità
//!
//! Ogni frame in uscita passa dalla coda outbound bounded della
//! sessione; il write loop è l'unico a toccare il socket in scrittura.
//! Una coda piena segnala un consumatore lento: la sessione viene
//! chiusa e il client recupera via pull.

use crate::core::error::ChatError;
use crate::dtos::message::MessageData;
use crate::dtos::ws::{PushMsgData, WsResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::debug;

pub struct Session {
    pub user_id: String,
    pub platform_id: i32,
    pub sdk_type: String,
    pub token: String,
    /// Identificatore univoco della connessione; una sessione viene
    /// rimossa dalla UserMap per conn_id, non per user_id.
    pub conn_id: String,
    outbound_tx: mpsc::Sender<WsResponse>,
    close_tx: watch::Sender<bool>,
    closed: AtomicBool,
}

impl Session {
    /// Costruisce la sessione e restituisce gli estremi consumati dai
    /// due loop: il receiver della coda outbound (write loop) e il
    /// receiver del segnale di chiusura (entrambi i loop).
    pub fn new(
        user_id: String,
        platform_id: i32,
        sdk_type: String,
        token: String,
        conn_id: String,
        outbound_queue_size: usize,
    ) -> (Self, mpsc::Receiver<WsResponse>, watch::Receiver<bool>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(outbound_queue_size);
        let (close_tx, close_rx) = watch::channel(false);
        let session = Self {
            user_id,
            platform_id,
            sdk_type,
            token,
            conn_id,
            outbound_tx,
            close_tx,
            closed: AtomicBool::new(false),
        };
        (session, outbound_rx, close_rx)
    }

    /// Accoda un frame in uscita senza bloccare. `WriteChannelFull`
    /// significa peer troppo lento: il chiamante chiude la sessione.
    pub fn enqueue(&self, frame: WsResponse) -> Result<(), ChatError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ChatError::conn_closed());
        }
        match self.outbound_tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(ChatError::write_channel_full()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ChatError::conn_closed()),
        }
    }

    /// Push 2001 di un messaggio appena committato.
    pub fn push_message(&self, data: &MessageData) -> Result<(), ChatError> {
        let mut msgs = HashMap::new();
        msgs.insert(data.conversation_id.clone(), vec![data.clone()]);
        let payload = serde_json::to_value(PushMsgData { msgs })
            .map_err(|e| ChatError::push_failed().with_details(e.to_string()))?;
        self.enqueue(WsResponse::push(payload))
    }

    /// Invia il frame kick 2002 e chiude la sessione.
    pub fn kick(&self) {
        debug!(user_id = %self.user_id, conn_id = %self.conn_id, "kicking session");
        let _ = self.enqueue(WsResponse::kick());
        self.close();
    }

    /// Transizione a closing: idempotente, sveglia entrambi i loop.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.close_tx.send(true);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::ws::WS_KICK_ONLINE_MSG;

    fn test_session(queue: usize) -> (Session, mpsc::Receiver<WsResponse>, watch::Receiver<bool>) {
        Session::new(
            "alice".to_string(),
            5,
            String::new(),
            "token".to_string(),
            "conn-1".to_string(),
            queue,
        )
    }

    #[tokio::test]
    async fn test_enqueue_delivers_to_write_side() {
        let (session, mut rx, _close) = test_session(4);
        session
            .enqueue(WsResponse::push(serde_json::json!({})))
            .unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.req_identifier, crate::dtos::ws::WS_PUSH_MSG);
    }

    #[tokio::test]
    async fn test_full_queue_reports_write_channel_full() {
        let (session, _rx, _close) = test_session(1);
        session
            .enqueue(WsResponse::push(serde_json::json!({})))
            .unwrap();
        let err = session
            .enqueue(WsResponse::push(serde_json::json!({})))
            .unwrap_err();
        assert_eq!(err.code, ChatError::write_channel_full().code);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_signals() {
        let (session, _rx, mut close_rx) = test_session(1);
        assert!(!session.is_closed());
        session.close();
        session.close();
        assert!(session.is_closed());
        close_rx.changed().await.unwrap();
        assert!(*close_rx.borrow());

        let err = session
            .enqueue(WsResponse::push(serde_json::json!({})))
            .unwrap_err();
        assert_eq!(err.code, ChatError::conn_closed().code);
    }

    #[tokio::test]
    async fn test_kick_sends_2002_then_closes() {
        let (session, mut rx, _close) = test_session(4);
        session.kick();
        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.req_identifier, WS_KICK_ONLINE_MSG);
        assert!(session.is_closed());
    }
}
