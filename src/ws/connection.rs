//! Connection loops - Lettore e scrittore di una sessione
//!
//! Ogni sessione esegue esattamente un read loop (bloccato sul socket)
//! e un write loop (unico scrittore: drena la coda outbound e possiede
//! ogni scrittura, ping compresi). Il read loop scade a pong_wait; i
//! pong del client, come ogni altro frame, estendono la deadline.

use crate::core::state::AppState;
use crate::dtos::ws::WsResponse;
use crate::ws::gateway::Gateway;
use crate::ws::handlers::handle_frame;
use crate::ws::session::Session;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{FutureExt, SinkExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, instrument, warn};

#[instrument(skip_all, fields(user_id = %session.user_id, conn_id = %session.conn_id))]
pub async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    gateway: Arc<Gateway>,
    session: Arc<Session>,
    outbound_rx: mpsc::Receiver<WsResponse>,
    close_rx: watch::Receiver<bool>,
) {
    info!("websocket connection established");

    let (ws_tx, ws_rx) = socket.split();

    gateway.queue_register(session.clone());

    let write_wait = Duration::from_secs(state.config.ws_write_wait_secs);
    let ping_period = Duration::from_secs(state.config.ws_ping_period_secs);
    let pong_wait = Duration::from_secs(state.config.ws_pong_wait_secs);

    let writer = tokio::spawn(write_loop(
        ws_tx,
        outbound_rx,
        close_rx.clone(),
        write_wait,
        ping_period,
    ));

    read_loop(ws_rx, &state, &session, close_rx, pong_wait).await;

    // Cleanup: transizione a closing e rimozione dal registro.
    session.close();
    gateway.queue_unregister(session.clone());
    let _ = writer.await;
    info!("websocket connection terminated");
}

async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    state: &Arc<AppState>,
    session: &Arc<Session>,
    mut close_rx: watch::Receiver<bool>,
    pong_wait: Duration,
) {
    loop {
        tokio::select! {
            _ = close_rx.changed() => {
                debug!("close signal received by read loop");
                return;
            }
            next = timeout(pong_wait, ws_rx.next()) => {
                let msg = match next {
                    Err(_) => {
                        warn!(pong_wait_secs = pong_wait.as_secs(), "read deadline exceeded");
                        return;
                    }
                    Ok(None) => {
                        debug!("websocket stream ended");
                        return;
                    }
                    Ok(Some(Err(e))) => {
                        debug!(error = %e, "websocket read error");
                        return;
                    }
                    Ok(Some(Ok(msg))) => msg,
                };

                // ogni frame del peer (pong compresi) rinnova il TTL
                // del flag online, che altrimenti scade a connessione viva
                state.presence.refresh(&session.user_id);

                match msg {
                    Message::Text(text) => {
                        // Guardia di recovery: un panic nel handler chiude
                        // solo questa sessione, mai il processo.
                        let resp = match AssertUnwindSafe(handle_frame(state, session, text.as_str()))
                            .catch_unwind()
                            .await
                        {
                            Ok(resp) => resp,
                            Err(_) => {
                                error!("panic recovered in frame handler, closing session");
                                return;
                            }
                        };
                        if let Err(e) = session.enqueue(resp) {
                            // peer troppo lento o già chiuso
                            warn!(error = %e, "failed to enqueue reply, closing session");
                            return;
                        }
                    }
                    Message::Close(_) => {
                        debug!("close frame received");
                        return;
                    }
                    // i pong (e qualunque altro frame) estendono la deadline
                    // semplicemente completando la read
                    Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
                }
            }
        }
    }
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<WsResponse>,
    mut close_rx: watch::Receiver<bool>,
    write_wait: Duration,
    ping_period: Duration,
) {
    let mut ticker = interval(ping_period);
    ticker.tick().await; // consuma il primo tick immediato

    loop {
        tokio::select! {
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    return;
                };
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        error!(error = %e, "failed to serialize outbound frame");
                        continue;
                    }
                };
                match timeout(write_wait, ws_tx.send(Message::Text(Utf8Bytes::from(json)))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        debug!("write failed or timed out, stopping write loop");
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                match timeout(write_wait, ws_tx.send(Message::Ping(Default::default()))).await {
                    Ok(Ok(())) => {}
                    _ => {
                        debug!("ping failed, stopping write loop");
                        return;
                    }
                }
            }
            _ = close_rx.changed() => {
                let _ = timeout(write_wait, ws_tx.send(Message::Close(None))).await;
                return;
            }
        }
    }
}
