//! S2 (spec.md §8): alice subscribes to `default`, sends a `CHT` at
//! `SEQN=7`; the server ACKs `SEQN=7 status=200` and broadcasts a `CHT`
//! copy — carrying the stored `msg_seqn=7` and a fresh outer SEQN — to
//! every group member, including alice herself.

#[path = "common.rs"]
mod common;

use chat_protocol::Header;
use chat_test_utils::MockPeer;
use common::ack_for;
use serde_json::json;

async fn join_default(peer: &MockPeer, server_addr: std::net::SocketAddr, username: &str, add_seqn: i32) {
    peer.send_frame(
        Header::new(add_seqn),
        Some(json!({"type": "USR_ADD", "username": username, "password": "p"})),
        server_addr,
    )
    .await
    .unwrap();
    ack_for(peer, add_seqn).await;

    // USR_ADD already auto-subscribes to "default"; GRP_SUB is idempotent
    // and makes the subscription explicit, matching the literal scenario.
    peer.send_frame(
        Header::new(add_seqn + 1),
        Some(json!({"type": "GRP_SUB", "group": "default", "username": username})),
        server_addr,
    )
    .await
    .unwrap();
    ack_for(peer, add_seqn + 1).await;

    // A SYN registers this peer's current address, without which
    // `addresses_for_group` has nowhere to send a broadcast copy.
    let syn = Header {
        seqn: add_seqn + 2,
        ack: false,
        syn: true,
        fin: false,
    };
    peer.send_frame(syn, Some(json!({"username": username})), server_addr)
        .await
        .unwrap();
    ack_for(peer, add_seqn + 2).await;
}

#[tokio::test]
async fn chat_broadcast_reaches_every_subscriber_including_sender() {
    let (_server, server_addr) = common::spawn_server().await;
    let alice = MockPeer::bind().await.unwrap();
    let bob = MockPeer::bind().await.unwrap();

    join_default(&alice, server_addr, "alice", 0).await;
    join_default(&bob, server_addr, "bob", 0).await;

    alice
        .send_frame(
            Header::new(7),
            Some(json!({
                "type": "CHT",
                "group": "default",
                "username": "alice",
                "text": "hi",
                "time_sent": "2024-01-01T00:00:00+00:00",
            })),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&alice, 7).await;
    assert_eq!(ack.status, 200);

    // Alice's own copy of the broadcast: distinct outer SEQN, msg_seqn=7.
    let (frame, from) = alice.recv_frame().await.unwrap();
    assert!(!frame.header.ack);
    let body = frame.body.clone().unwrap();
    assert_eq!(body["msg_seqn"], json!(7));
    assert_eq!(body["text"], json!("hi"));
    assert_ne!(frame.header.seqn, 7);
    let alice_broadcast_seqn = frame.header.seqn;
    alice.send_frame(Header::ack_for(frame.header.seqn), None, from).await.unwrap();

    // Bob's copy: same msg_seqn, but its own distinct outer SEQN.
    let (frame, from) = bob.recv_frame().await.unwrap();
    assert!(!frame.header.ack);
    let body = frame.body.unwrap();
    assert_eq!(body["msg_seqn"], json!(7));
    assert_ne!(frame.header.seqn, alice_broadcast_seqn);
    bob.send_frame(Header::ack_for(frame.header.seqn), None, from).await.unwrap();
}

#[tokio::test]
async fn chat_does_not_implicitly_create_an_unknown_group() {
    // Design note (a): CHT never creates the group, only GRP_ADD does.
    let (_server, server_addr) = common::spawn_server().await;
    let alice = MockPeer::bind().await.unwrap();

    alice
        .send_frame(
            Header::new(0),
            Some(json!({"type": "USR_ADD", "username": "alice", "password": "p"})),
            server_addr,
        )
        .await
        .unwrap();
    ack_for(&alice, 0).await;

    alice
        .send_frame(
            Header::new(1),
            Some(json!({
                "type": "CHT",
                "group": "never-created",
                "username": "alice",
                "text": "hi",
            })),
            server_addr,
        )
        .await
        .unwrap();
    let ack = ack_for(&alice, 1).await;
    assert_eq!(ack.status, 400, "CHT against an unknown group must not create it");
}
