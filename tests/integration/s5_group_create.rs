//! S5 (spec.md §8): `USR_ADD alice`, `USR_ADD bob`, then `GRP_ADD
//! group="eng" members=["bob"] username="alice"` subscribes both alice (the
//! creator) and bob; `GRP_HST` for bob includes `eng`.

#[path = "common.rs"]
mod common;

use chat_protocol::Header;
use chat_test_utils::MockPeer;
use common::ack_for;
use serde_json::json;

#[tokio::test]
async fn group_add_subscribes_creator_and_member_alike() {
    let (_server, server_addr) = common::spawn_server().await;
    let client = MockPeer::bind().await.unwrap();

    for (seqn, username) in [(0, "alice"), (1, "bob")] {
        client
            .send_frame(
                Header::new(seqn),
                Some(json!({"type": "USR_ADD", "username": username, "password": "p"})),
                server_addr,
            )
            .await
            .unwrap();
        let ack = ack_for(&client, seqn).await;
        assert_eq!(ack.response.unwrap()["created_user"], json!(true));
    }

    client
        .send_frame(
            Header::new(2),
            Some(json!({
                "type": "GRP_ADD",
                "group": "eng",
                "username": "alice",
                "members": ["bob"],
            })),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 2).await;
    assert_eq!(ack.response.unwrap()["group"], json!("eng"));

    client
        .send_frame(
            Header::new(3),
            Some(json!({"type": "GRP_HST", "username": "alice"})),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 3).await;
    let alice_groups = ack.response.unwrap();
    assert!(alice_groups.as_array().unwrap().iter().any(|g| g["name"] == "eng"));

    client
        .send_frame(
            Header::new(4),
            Some(json!({"type": "GRP_HST", "username": "bob"})),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 4).await;
    let bob_groups = ack.response.unwrap();
    assert!(bob_groups.as_array().unwrap().iter().any(|g| g["name"] == "eng"));
}

#[tokio::test]
async fn group_add_for_an_unknown_creator_fails() {
    let (_server, server_addr) = common::spawn_server().await;
    let client = MockPeer::bind().await.unwrap();

    client
        .send_frame(
            Header::new(0),
            Some(json!({
                "type": "GRP_ADD",
                "group": "eng",
                "username": "nobody",
                "members": [],
            })),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&client, 0).await;
    assert_eq!(ack.status, 400);
}
