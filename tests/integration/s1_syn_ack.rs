//! S1 (spec.md §8): client sends `SEQN=0 SYN=1 body={"username":"alice"}`;
//! server responds `SEQN=0 ACK=1 body={}`; the client's connect completes
//! successfully — its `server_connected` notification.

#[path = "common.rs"]
mod common;

use chat_client::ChatClient;

#[tokio::test]
async fn syn_is_ack_matched_at_seqn_zero() {
    let (_server, server_addr) = common::spawn_server().await;
    let (client, _connection_lost) = ChatClient::bind(server_addr).await.unwrap();

    let ack = client.connect(Some("alice")).await.unwrap();

    assert!(ack.is_success(), "SYN ack: {ack:?}");
}

#[tokio::test]
async fn anonymous_syn_also_succeeds() {
    let (_server, server_addr) = common::spawn_server().await;
    let (client, _connection_lost) = ChatClient::bind(server_addr).await.unwrap();

    let ack = client.connect(None).await.unwrap();

    assert!(ack.is_success());
}
