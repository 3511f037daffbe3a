//! S6 (spec.md §8): `USR_ADD charlie pw="p"` reports `created_user=true`;
//! `USR_LOGIN charlie pw="p"` reports `credentials_valid=true`; `USR_LOGIN
//! charlie pw="q"` reports `credentials_valid=false`.

#[path = "common.rs"]
mod common;

use chat_protocol::Header;
use chat_test_utils::MockPeer;
use common::ack_for;
use serde_json::json;

#[tokio::test]
async fn login_validates_the_password_it_was_registered_with() {
    let (_server, server_addr) = common::spawn_server().await;
    let client = MockPeer::bind().await.unwrap();

    client
        .send_frame(
            Header::new(0),
            Some(json!({"type": "USR_ADD", "username": "charlie", "password": "p"})),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 0).await;
    assert_eq!(ack.response.unwrap()["created_user"], json!(true));

    client
        .send_frame(
            Header::new(1),
            Some(json!({"type": "USR_LOGIN", "username": "charlie", "password": "p"})),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 1).await;
    assert_eq!(ack.response.unwrap()["credentials_valid"], json!(true));

    client
        .send_frame(
            Header::new(2),
            Some(json!({"type": "USR_LOGIN", "username": "charlie", "password": "q"})),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 2).await;
    assert_eq!(ack.response.unwrap()["credentials_valid"], json!(false));
}

#[tokio::test]
async fn re_adding_the_same_username_reports_not_created() {
    let (_server, server_addr) = common::spawn_server().await;
    let client = MockPeer::bind().await.unwrap();

    client
        .send_frame(
            Header::new(0),
            Some(json!({"type": "USR_ADD", "username": "dora", "password": "p"})),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 0).await;
    assert_eq!(ack.response.unwrap()["created_user"], json!(true));

    client
        .send_frame(
            Header::new(1),
            Some(json!({"type": "USR_ADD", "username": "dora", "password": "p"})),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 1).await;
    assert_eq!(ack.response.unwrap()["created_user"], json!(false));
}
