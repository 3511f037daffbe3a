//! S4 (spec.md §8): the server is offline. The client sends, resends
//! proceed until the cumulative retransmission budget is exhausted, and the
//! request completes with `TIMED_OUT`; the client's `connection_lost`
//! signal fires.
//!
//! Real wall-clock timers, per SPEC_FULL.md §8 — this test takes several
//! real seconds by design.

#[path = "common.rs"]
mod common;

use std::time::{Duration, Instant};

use chat_client::ChatClient;
use chat_endpoint::EndpointError;
use serde_json::json;

#[tokio::test]
async fn send_to_an_offline_server_times_out_and_signals_connection_lost() {
    // Bind and immediately drop a socket to reserve a port nobody is
    // listening on.
    let reserved = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let offline_addr = reserved.local_addr().unwrap();
    drop(reserved);

    let (client, connection_lost) = ChatClient::bind(offline_addr).await.unwrap();

    let start = Instant::now();
    let send_task = tokio::spawn(async move { client.send_message(json!({"type": "USR_LST"})).await });

    connection_lost.wait().await;
    let result = send_task.await.unwrap();
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(EndpointError::TimedOut)));
    assert!(
        elapsed >= Duration::from_secs(5),
        "TIMED_OUT must not fire before the 5s cumulative budget, got {elapsed:?}"
    );
}
