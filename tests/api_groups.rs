//! Integration tests per la membership di gruppo
//!
//! Coprono l'invariante di visibilità: il join scrive
//! `min_seq = max_seq + 1` (la storia resta invisibile), il quit
//! congela `max_seq` (il futuro resta invisibile), il rejoin riapre
//! la finestra dal punto di rientro.

mod common;

use common::*;
use serde_json::{json, Value};
use sqlx::MySqlPool;

async fn join(server: &axum_test::TestServer, token: &str, group_id: &str) -> Value {
    server
        .post("/group/join")
        .authorization_bearer(token)
        .json(&json!({ "group_id": group_id }))
        .await
        .json()
}

async fn quit(server: &axum_test::TestServer, token: &str, group_id: &str) -> Value {
    server
        .post("/group/quit")
        .authorization_bearer(token)
        .json(&json!({ "group_id": group_id }))
        .await
        .json()
}

#[sqlx::test]
async fn test_late_joiner_cannot_see_history(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let late = setup_user(&server, "late").await;

    let group_id = create_group(&server, &owner, "g", &[]).await;
    let conv = format!("sg_{group_id}");

    for i in 1..=5 {
        let body = send_group(&server, &owner, &group_id, &format!("m{i}"), "x").await;
        assert_eq!(body["data"]["seq"], i);
    }

    let body = join(&server, &late, &group_id).await;
    assert_eq!(body["code"], 0);

    for i in 6..=8 {
        send_group(&server, &owner, &group_id, &format!("m{i}"), "x").await;
    }

    // late vede solo i messaggi successivi al proprio ingresso
    let body = pull_range(&server, &late, &conv, 1, 100).await;
    assert_eq!(body["code"], 0);
    assert_eq!(seqs_of(&body), vec![6, 7, 8]);
}

#[sqlx::test]
async fn test_quit_freezes_visibility(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let member = setup_user(&server, "member").await;

    // membro iniziale: vede la storia dal seq 1
    let group_id = create_group(&server, &owner, "g", &["member"]).await;
    let conv = format!("sg_{group_id}");

    send_group(&server, &owner, &group_id, "m1", "x").await;
    send_group(&server, &owner, &group_id, "m2", "x").await;

    let body = quit(&server, &member, &group_id).await;
    assert_eq!(body["code"], 0);

    send_group(&server, &owner, &group_id, "m3", "x").await;
    send_group(&server, &owner, &group_id, "m4", "x").await;

    // il membro uscito vede esattamente i primi due
    let body = pull_range(&server, &member, &conv, 1, 100).await;
    assert_eq!(body["code"], 0);
    assert_eq!(seqs_of(&body), vec![1, 2]);
}

#[sqlx::test]
async fn test_rejoin_reopens_window_without_history(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let member = setup_user(&server, "member").await;

    let group_id = create_group(&server, &owner, "g", &["member"]).await;
    let conv = format!("sg_{group_id}");

    send_group(&server, &owner, &group_id, "m1", "x").await;
    send_group(&server, &owner, &group_id, "m2", "x").await;
    assert_eq!(quit(&server, &member, &group_id).await["code"], 0);
    send_group(&server, &owner, &group_id, "m3", "x").await;

    // rejoin: la riga di membership viene aggiornata, non duplicata
    assert_eq!(join(&server, &member, &group_id).await["code"], 0);
    send_group(&server, &owner, &group_id, "m4", "x").await;

    let body = pull_range(&server, &member, &conv, 1, 100).await;
    assert_eq!(seqs_of(&body), vec![4]);
}

#[sqlx::test]
async fn test_join_twice_rejected(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let user = setup_user(&server, "user").await;
    let group_id = create_group(&server, &owner, "g", &[]).await;

    assert_eq!(join(&server, &user, &group_id).await["code"], 0);
    assert_eq!(join(&server, &user, &group_id).await["code"], 3005);
}

#[sqlx::test]
async fn test_owner_cannot_quit(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let group_id = create_group(&server, &owner, "g", &[]).await;

    assert_eq!(quit(&server, &owner, &group_id).await["code"], 3008);
}

#[sqlx::test]
async fn test_quit_without_membership_rejected(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let stranger = setup_user(&server, "stranger").await;
    let group_id = create_group(&server, &owner, "g", &[]).await;

    assert_eq!(quit(&server, &stranger, &group_id).await["code"], 3003);
}

#[sqlx::test]
async fn test_join_unknown_group(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let user = setup_user(&server, "user").await;
    assert_eq!(join(&server, &user, "missing-group").await["code"], 3001);
}

#[sqlx::test]
async fn test_dismiss_stops_sends_but_not_pulls(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let member = setup_user(&server, "member").await;
    let group_id = create_group(&server, &owner, "g", &["member"]).await;
    let conv = format!("sg_{group_id}");

    send_group(&server, &owner, &group_id, "m1", "x").await;

    // solo l'owner può dissolvere
    let body: Value = server
        .post("/group/dismiss")
        .authorization_bearer(&member)
        .json(&json!({ "group_id": group_id }))
        .await
        .json();
    assert_eq!(body["code"], 3006);

    let body: Value = server
        .post("/group/dismiss")
        .authorization_bearer(&owner)
        .json(&json!({ "group_id": group_id }))
        .await
        .json();
    assert_eq!(body["code"], 0);

    // i nuovi send vengono rifiutati
    let body = send_group(&server, &owner, &group_id, "m2", "x").await;
    assert_eq!(body["code"], 3002);

    // i pull dei membri esistenti continuano fino al max finale
    let body = pull_range(&server, &member, &conv, 1, 100).await;
    assert_eq!(seqs_of(&body), vec![1]);
}

#[sqlx::test]
async fn test_group_info_and_members(pool: MySqlPool) {
    let state = create_test_state(pool);
    let server = create_test_server(state);

    let owner = setup_user(&server, "owner").await;
    let _m1 = setup_user(&server, "m1").await;
    let group_id = create_group(&server, &owner, "my group", &["m1"]).await;

    let body: Value = server
        .get("/group/info")
        .authorization_bearer(&owner)
        .add_query_param("group_id", &group_id)
        .await
        .json();
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["name"], "my group");
    assert_eq!(body["data"]["creator_user_id"], "owner");
    assert_eq!(body["data"]["member_count"], 2);

    let body: Value = server
        .get("/group/members")
        .authorization_bearer(&owner)
        .add_query_param("group_id", &group_id)
        .await
        .json();
    assert_eq!(body["code"], 0);
    let members = body["data"].as_array().unwrap();
    assert_eq!(members.len(), 2);
    // il creatore è owner (role_level 2), l'invitato member (0)
    let owner_row = members.iter().find(|m| m["user_id"] == "owner").unwrap();
    assert_eq!(owner_row["role_level"], 2);
    let member_row = members.iter().find(|m| m["user_id"] == "m1").unwrap();
    assert_eq!(member_row["role_level"], 0);
    // entrambi i membri iniziali partono da join_seq 1
    assert_eq!(member_row["join_seq"], 1);
}
