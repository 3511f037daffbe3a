//! S3 (spec.md §8): client sends at `SEQN=11`; the peer drops the first two
//! datagrams; the client resends at ~0.5s and ~1.5s; the third transmission
//! reaches the peer; the ACK completes the request in well under the 5s
//! timeout budget, with exactly one completion.
//!
//! Run with real wall-clock timers (not `tokio::time::pause()`), per
//! SPEC_FULL.md §8 — the property under test is real retransmission timing.

#[path = "common.rs"]
mod common;

use std::time::Instant;

use chat_client::ChatClient;
use chat_protocol::Header;
use chat_test_utils::MockPeer;
use serde_json::json;

#[tokio::test]
async fn third_transmission_is_acked_well_under_max_timeout() {
    let flaky_peer = MockPeer::bind().await.unwrap();
    let peer_addr = flaky_peer.local_addr().unwrap();
    let (client, _connection_lost) = ChatClient::bind(peer_addr).await.unwrap();

    let start = Instant::now();
    let send_task = tokio::spawn(async move { client.send_message(json!({"type": "USR_LST"})).await });

    // Drop the first two transmissions of this request's SEQN, then ACK
    // the third. `MockPeer` has no retransmission logic of its own, so
    // every datagram it receives here genuinely is a separate transmission
    // from the real `chat-endpoint`'s backoff loop.
    let (first, from) = flaky_peer.recv_frame().await.unwrap();
    let seqn = first.header.seqn;
    let (second, _from) = flaky_peer.recv_frame().await.unwrap();
    assert_eq!(second.header.seqn, seqn, "retransmission must reuse the same SEQN");
    let (third, _from) = flaky_peer.recv_frame().await.unwrap();
    assert_eq!(third.header.seqn, seqn);

    flaky_peer
        .send_frame(Header::ack_for(seqn), Some(json!({"status": 200})), from)
        .await
        .unwrap();

    let ack = send_task.await.unwrap().unwrap();
    let elapsed = start.elapsed();

    assert!(ack.is_success());
    assert!(
        elapsed < std::time::Duration::from_secs(5),
        "elapsed {elapsed:?} should be well under the 5s timeout budget"
    );
    assert!(
        elapsed >= std::time::Duration::from_millis(1_400),
        "third transmission should not arrive before the ~1.5s backoff point, got {elapsed:?}"
    );
}
