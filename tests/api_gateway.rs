//! Integration tests per il gateway: dispatch dei frame, registro
//! delle connessioni e pipeline di push.
//!
//! I frame vengono processati direttamente con `handle_frame` su
//! sessioni costruite ad hoc, tenendo in mano il lato di lettura della
//! coda outbound al posto del write loop.

mod common;

use common::*;
use ironrelay::dtos::ws::{
    WS_DATA_ERROR, WS_GET_CONV_MAX_READ_SEQ, WS_GET_NEWEST_SEQ, WS_PULL_MSG,
    WS_PULL_MSG_BY_SEQ_LIST, WS_PUSH_MSG, WS_SEND_MSG,
};
use ironrelay::entities::Message;
use ironrelay::ws::handlers::handle_frame;
use ironrelay::ws::{Gateway, Session};
use serde_json::json;
use sqlx::MySqlPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn make_session(user_id: &str, queue: usize) -> (Arc<Session>, tokio::sync::mpsc::Receiver<ironrelay::dtos::ws::WsResponse>) {
    let (session, outbound_rx, _close_rx) = Session::new(
        user_id.to_string(),
        PLATFORM_WEB,
        String::new(),
        "test-token".to_string(),
        format!("conn-{user_id}"),
        queue,
    );
    (Arc::new(session), outbound_rx)
}

fn test_message(conversation_id: &str, seq: i64, sender: &str, recv: &str) -> Message {
    Message {
        id: seq,
        conversation_id: conversation_id.to_string(),
        seq,
        client_msg_id: format!("m{seq}"),
        sender_id: sender.to_string(),
        recv_id: recv.to_string(),
        group_id: String::new(),
        session_type: 1,
        msg_type: 1,
        content_text: Some("hello".to_string()),
        content_image: None,
        content_video: None,
        content_audio: None,
        content_file: None,
        content_custom: None,
        extra: None,
        send_at: 0,
        created_at: 0,
        updated_at: 0,
    }
}

async fn wait_until<F: Fn() -> bool>(cond: F, what: &str) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for: {what}");
}

// ------------------------- frame dispatch -------------------------

#[sqlx::test]
async fn test_send_frame_persists_and_replies(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state.clone());
    setup_user(&server, "alice").await;
    setup_user(&server, "bob").await;

    let (session, _rx) = make_session("alice", 16);
    let frame = json!({
        "req_identifier": WS_SEND_MSG,
        "msg_incr": "1",
        "operation_id": "op-1",
        "send_id": "alice",
        "data": {
            "client_msg_id": "ws-m1",
            "recv_id": "bob",
            "session_type": 1,
            "msg_type": 1,
            "content": { "text": "hi over ws" },
        },
    });

    let resp = handle_frame(&state, &session, &frame.to_string()).await;
    assert_eq!(resp.err_code, 0, "err: {}", resp.err_msg);
    assert_eq!(resp.req_identifier, WS_SEND_MSG);
    assert_eq!(resp.msg_incr, "1");
    assert_eq!(resp.operation_id, "op-1");
    let data = resp.data.unwrap();
    assert_eq!(data["conversation_id"], "si_alice:bob");
    assert_eq!(data["seq"], 1);

    // il messaggio è davvero persistito
    let stored = state
        .msg
        .get_by_client_msg_id("alice", "ws-m1")
        .await
        .unwrap();
    assert!(stored.is_some());
}

#[sqlx::test]
async fn test_sender_binding_enforced(pool: MySqlPool) {
    let state = create_test_state(pool);
    let (session, _rx) = make_session("alice", 16);

    let frame = json!({
        "req_identifier": WS_SEND_MSG,
        "send_id": "mallory",
        "data": {},
    });
    let resp = handle_frame(&state, &session, &frame.to_string()).await;
    assert_eq!(resp.err_code, 5005);
}

#[sqlx::test]
async fn test_unknown_identifier_rejected(pool: MySqlPool) {
    let state = create_test_state(pool);
    let (session, _rx) = make_session("alice", 16);

    let frame = json!({ "req_identifier": 9999, "send_id": "alice" });
    let resp = handle_frame(&state, &session, &frame.to_string()).await;
    assert_eq!(resp.err_code, 5003);
}

#[sqlx::test]
async fn test_malformed_frame_returns_protocol_error(pool: MySqlPool) {
    let state = create_test_state(pool);
    let (session, _rx) = make_session("alice", 16);

    let resp = handle_frame(&state, &session, "this is not json").await;
    assert_eq!(resp.req_identifier, WS_DATA_ERROR);
    assert_eq!(resp.err_code, 5003);
}

#[sqlx::test]
async fn test_get_newest_seq_batch(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state.clone());
    let alice = setup_user(&server, "alice").await;
    setup_user(&server, "bob").await;

    send_single(&server, &alice, "bob", "m1", "x").await;
    send_single(&server, &alice, "bob", "m2", "x").await;

    let (session, _rx) = make_session("alice", 16);
    let frame = json!({
        "req_identifier": WS_GET_NEWEST_SEQ,
        "send_id": "alice",
        "data": { "conversation_ids": ["si_alice:bob", "si_carol:dave"] },
    });
    let resp = handle_frame(&state, &session, &frame.to_string()).await;
    assert_eq!(resp.err_code, 0);
    let seqs = &resp.data.unwrap()["seqs"];
    assert_eq!(seqs["si_alice:bob"], 2);
    // conversazione non accessibile: max 0, nessun errore batch
    assert_eq!(seqs["si_carol:dave"], 0);
}

#[sqlx::test]
async fn test_pull_by_seq_list_honors_list(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state.clone());
    let alice = setup_user(&server, "alice").await;
    setup_user(&server, "bob").await;

    for i in 1..=3 {
        send_single(&server, &alice, "bob", &format!("m{i}"), "x").await;
    }

    let (session, _rx) = make_session("alice", 16);
    let frame = json!({
        "req_identifier": WS_PULL_MSG_BY_SEQ_LIST,
        "send_id": "alice",
        "data": { "conversation_id": "si_alice:bob", "seq_list": [1, 3, 99] },
    });
    let resp = handle_frame(&state, &session, &frame.to_string()).await;
    assert_eq!(resp.err_code, 0);
    let data = resp.data.unwrap();
    let seqs: Vec<i64> = data["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["seq"].as_i64().unwrap())
        .collect();
    // esattamente l'intersezione della lista con il range visibile
    assert_eq!(seqs, vec![1, 3]);
    assert_eq!(data["max_seq"], 3);
}

#[sqlx::test]
async fn test_pull_range_frame(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state.clone());
    let alice = setup_user(&server, "alice").await;
    setup_user(&server, "bob").await;

    send_single(&server, &alice, "bob", "m1", "x").await;

    let (session, _rx) = make_session("bob", 16);
    let frame = json!({
        "req_identifier": WS_PULL_MSG,
        "send_id": "bob",
        "data": { "conversation_id": "si_alice:bob", "begin_seq": 1, "end_seq": 10 },
    });
    let resp = handle_frame(&state, &session, &frame.to_string()).await;
    assert_eq!(resp.err_code, 0);
    let data = resp.data.unwrap();
    assert_eq!(data["messages"].as_array().unwrap().len(), 1);
}

#[sqlx::test]
async fn test_conv_max_read_seq_frame(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state.clone());
    let alice = setup_user(&server, "alice").await;
    setup_user(&server, "bob").await;

    send_single(&server, &alice, "bob", "m1", "x").await;
    send_single(&server, &alice, "bob", "m2", "x").await;

    let (session, _rx) = make_session("bob", 16);
    let frame = json!({
        "req_identifier": WS_GET_CONV_MAX_READ_SEQ,
        "send_id": "bob",
        "data": { "conversation_id": "si_alice:bob" },
    });
    let resp = handle_frame(&state, &session, &frame.to_string()).await;
    assert_eq!(resp.err_code, 0);
    let data = resp.data.unwrap();
    assert_eq!(data["max_seq"], 2);
    assert_eq!(data["read_seq"], 0);
    assert_eq!(data["unread_count"], 2);
}

// ------------------------- registro e push -------------------------

#[sqlx::test]
async fn test_gateway_counters_track_usermap(pool: MySqlPool) {
    let (state, push_rx) = create_test_state_with_push(pool);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = Gateway::start(state.clone(), push_rx, shutdown_rx);
    state.attach_gateway(gateway.clone());

    let (s1, _rx1) = make_session("alice", 16);
    let (s2, _rx2) = make_session("alice", 16);
    let (s3, _rx3) = make_session("bob", 16);

    gateway.queue_register(s1.clone());
    gateway.queue_register(s2.clone());
    gateway.queue_register(s3);

    let gw = gateway.clone();
    wait_until(
        || gw.online_conn_count() == 3 && gw.online_user_count() == 2,
        "3 connections for 2 users",
    )
    .await;
    assert_eq!(
        gateway.user_map.online_user_count() as i64,
        gateway.online_user_count()
    );
    assert!(state.presence.is_online("alice"));

    // rimozione per conn_id: l'altro device di alice resta online
    gateway.queue_unregister(s1);
    let gw = gateway.clone();
    wait_until(|| gw.online_conn_count() == 2, "2 connections left").await;
    assert!(gateway.user_map.is_online("alice"));

    gateway.queue_unregister(s2);
    let gw = gateway.clone();
    wait_until(|| gw.online_user_count() == 1, "alice fully offline").await;
    assert!(!state.presence.is_online("alice"));
}

#[sqlx::test]
async fn test_push_pipeline_delivers_2001_frames(pool: MySqlPool) {
    let (state, push_rx) = create_test_state_with_push(pool);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = Gateway::start(state.clone(), push_rx, shutdown_rx);
    state.attach_gateway(gateway.clone());

    let (bob_session, mut bob_rx) = make_session("bob", 16);
    gateway.queue_register(bob_session);
    let gw = gateway.clone();
    wait_until(|| gw.online_conn_count() == 1, "bob registered").await;

    let msg = test_message("si_alice:bob", 1, "alice", "bob");
    state
        .pusher
        .push_to_users(msg, vec!["alice".to_string(), "bob".to_string()], None);

    let frame = tokio::time::timeout(Duration::from_secs(2), bob_rx.recv())
        .await
        .expect("no push within deadline")
        .expect("channel closed");
    assert_eq!(frame.req_identifier, WS_PUSH_MSG);
    let data = frame.data.unwrap();
    assert_eq!(data["msgs"]["si_alice:bob"][0]["seq"], 1);
}

#[sqlx::test]
async fn test_push_skips_excluded_connection(pool: MySqlPool) {
    let (state, push_rx) = create_test_state_with_push(pool);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = Gateway::start(state.clone(), push_rx, shutdown_rx);

    let (session, mut rx) = make_session("bob", 16);
    let conn_id = session.conn_id.clone();
    gateway.queue_register(session);
    let gw = gateway.clone();
    wait_until(|| gw.online_conn_count() == 1, "bob registered").await;

    let msg = test_message("si_alice:bob", 1, "alice", "bob");
    state
        .pusher
        .push_to_users(msg, vec!["bob".to_string()], Some(conn_id));

    // la connessione esclusa non riceve nulla
    let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(result.is_err(), "excluded connection received a push");
}

#[sqlx::test]
async fn test_slow_consumer_closed_on_push(pool: MySqlPool) {
    let (state, push_rx) = create_test_state_with_push(pool);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = Gateway::start(state.clone(), push_rx, shutdown_rx);

    // coda outbound profonda 1, mai drenata: si satura subito
    let (session, _rx) = make_session("bob", 1);
    gateway.queue_register(session.clone());
    let gw = gateway.clone();
    wait_until(|| gw.online_conn_count() == 1, "bob registered").await;

    for seq in 1..=2 {
        let msg = test_message("si_alice:bob", seq, "alice", "bob");
        state.pusher.push_to_users(msg, vec!["bob".to_string()], None);
    }

    let s = session.clone();
    wait_until(|| s.is_closed(), "slow session closed").await;
}

#[sqlx::test]
async fn test_kick_sessions_by_platform_and_token(pool: MySqlPool) {
    let (state, push_rx) = create_test_state_with_push(pool);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let gateway = Gateway::start(state.clone(), push_rx, shutdown_rx);

    let (old_session, mut old_rx) = make_session("alice", 16);
    gateway.queue_register(old_session.clone());
    let gw = gateway.clone();
    wait_until(|| gw.online_conn_count() == 1, "session registered").await;

    // re-login sulla stessa piattaforma: la vecchia sessione riceve 2002
    gateway.kick_sessions("alice", Some(PLATFORM_WEB), Some("fresh-token"));

    let frame = tokio::time::timeout(Duration::from_secs(1), old_rx.recv())
        .await
        .expect("no kick frame")
        .expect("channel closed");
    assert_eq!(frame.req_identifier, 2002);
    assert!(old_session.is_closed());
}
