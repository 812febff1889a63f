//! Integration tests per il motore di sequenze e il path dei messaggi
//!
//! Coprono il contratto di send idempotente, l'assegnazione dei seq,
//! i clamp del pull e i permessi di accesso alle conversazioni.

mod common;

use common::*;
use serde_json::{json, Value};
use sqlx::MySqlPool;

#[sqlx::test]
async fn test_single_chat_ping(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let bob = setup_user(&server, "bob").await;

    // alice -> bob: primo messaggio della conversazione
    let body = send_single(&server, &alice, "bob", "m1", "hi").await;
    assert_eq!(body["code"], 0, "send failed: {body}");
    assert_eq!(body["data"]["conversation_id"], "si_alice:bob");
    assert_eq!(body["data"]["seq"], 1);

    // bob ha 1 non letto
    let body: Value = server
        .get("/conversation/unread_count")
        .authorization_bearer(&bob)
        .add_query_param("conversation_id", "si_alice:bob")
        .await
        .json();
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["unread_count"], 1);

    // bob marca letto fino a 1
    let body: Value = server
        .post("/conversation/mark_read")
        .authorization_bearer(&bob)
        .json(&json!({ "conversation_id": "si_alice:bob", "read_seq": 1 }))
        .await
        .json();
    assert_eq!(body["code"], 0);

    let body: Value = server
        .get("/conversation/unread_count")
        .authorization_bearer(&bob)
        .add_query_param("conversation_id", "si_alice:bob")
        .await
        .json();
    assert_eq!(body["data"]["unread_count"], 0);
}

#[sqlx::test]
async fn test_idempotent_send(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;

    let first = send_single(&server, &alice, "bob", "m1", "hi").await;
    let second = send_single(&server, &alice, "bob", "m1", "hi").await;

    // entrambe le risposte portano lo stesso seq
    assert_eq!(first["data"]["seq"], 1);
    assert_eq!(second["data"]["seq"], 1);
    assert_eq!(
        first["data"]["server_msg_id"],
        second["data"]["server_msg_id"]
    );

    // ed esiste una sola riga persistita
    let body = pull_range(&server, &alice, "si_alice:bob", 1, 10).await;
    assert_eq!(body["code"], 0);
    assert_eq!(seqs_of(&body), vec![1]);
}

#[sqlx::test]
async fn test_seq_is_monotonic_per_conversation(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;
    let _carol = setup_user(&server, "carol").await;

    for i in 1..=3 {
        let body = send_single(&server, &alice, "bob", &format!("b{i}"), "x").await;
        assert_eq!(body["data"]["seq"], i);
    }
    // conversazione diversa, contatore indipendente
    let body = send_single(&server, &alice, "carol", "c1", "x").await;
    assert_eq!(body["data"]["seq"], 1);
}

#[sqlx::test]
async fn test_pull_begin_beyond_max_returns_empty(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;

    send_single(&server, &alice, "bob", "m1", "hi").await;

    let body = pull_range(&server, &alice, "si_alice:bob", 50, 100).await;
    assert_eq!(body["code"], 0);
    assert!(seqs_of(&body).is_empty());
    // il max_seq corrente viene comunque riportato
    assert_eq!(body["data"]["max_seq"], 1);
}

#[sqlx::test]
async fn test_pull_limit_zero_defaults_to_hundred(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;

    for i in 1..=3 {
        send_single(&server, &alice, "bob", &format!("m{i}"), "x").await;
    }

    // limit 0 non significa "zero messaggi": cade sul default 100
    let body: Value = server
        .get("/msg/pull")
        .authorization_bearer(&alice)
        .add_query_param("conversation_id", "si_alice:bob")
        .add_query_param("begin_seq", 1)
        .add_query_param("end_seq", 10)
        .add_query_param("limit", 0)
        .await
        .json();
    assert_eq!(seqs_of(&body), vec![1, 2, 3]);
}

#[sqlx::test]
async fn test_non_member_cannot_send_to_group(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let stranger = setup_user(&server, "stranger").await;
    let group_id = create_group(&server, &owner, "g", &[]).await;

    let body = send_group(&server, &stranger, &group_id, "s1", "hello?").await;
    assert_eq!(body["code"], 3003);
}

#[sqlx::test]
async fn test_outsider_cannot_pull_single_chat(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;
    let eve = setup_user(&server, "eve").await;

    send_single(&server, &alice, "bob", "m1", "secret").await;

    let body = pull_range(&server, &eve, "si_alice:bob", 1, 10).await;
    assert_eq!(body["code"], 1007);
}

#[sqlx::test]
async fn test_empty_content_rejected(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;

    let body: Value = server
        .post("/msg/send")
        .authorization_bearer(&alice)
        .json(&json!({
            "client_msg_id": "m1",
            "recv_id": "bob",
            "session_type": 1,
            "msg_type": 1,
            "content": {},
        }))
        .await
        .json();
    assert_eq!(body["code"], 1001);
}

#[sqlx::test]
async fn test_max_seq_endpoint(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;

    send_single(&server, &alice, "bob", "m1", "x").await;
    send_single(&server, &alice, "bob", "m2", "x").await;

    let body: Value = server
        .get("/msg/max_seq")
        .authorization_bearer(&alice)
        .add_query_param("conversation_id", "si_alice:bob")
        .await
        .json();
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["max_seq"], 2);
}

#[sqlx::test]
async fn test_message_content_preserved_verbatim(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let alice = setup_user(&server, "alice").await;
    let _bob = setup_user(&server, "bob").await;

    let body: Value = server
        .post("/msg/send")
        .authorization_bearer(&alice)
        .json(&json!({
            "client_msg_id": "m1",
            "recv_id": "bob",
            "session_type": 1,
            "msg_type": 2,
            "content": { "image": "https://cdn.example/img.png", "text": "caption" },
        }))
        .await
        .json();
    assert_eq!(body["code"], 0);

    let body = pull_range(&server, &alice, "si_alice:bob", 1, 10).await;
    let msg = &body["data"]["messages"][0];
    assert_eq!(msg["msg_type"], 2);
    assert_eq!(msg["content"]["image"], "https://cdn.example/img.png");
    assert_eq!(msg["content"]["text"], "caption");
    assert_eq!(msg["sender_id"], "alice");
}
