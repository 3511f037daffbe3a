//! Shared helpers for the literal S1-S6 end-to-end scenarios (spec.md §8).
//! Each scenario binds a real `chat-server` to a loopback UDP socket backed
//! by an in-memory SQLite database, and drives it with either a raw
//! [`chat_test_utils::MockPeer`] or a real [`chat_client::ChatClient`].

use std::net::SocketAddr;
use std::sync::Arc;

use chat_protocol::AckBody;
use chat_server::Server;
use chat_storage::Storage;
use chat_test_utils::MockPeer;
use tokio::net::UdpSocket;

/// Spawn a real chat server on a loopback ephemeral port, backed by a fresh
/// in-memory database (so `root`/`default` bootstrap state is isolated per
/// test). The returned `Arc<Server>` keeps the receive loop alive for as
/// long as the test holds onto it.
pub async fn spawn_server() -> (Arc<Server>, SocketAddr) {
    let storage = Arc::new(Storage::open_in_memory().unwrap());
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let endpoint = Arc::new(chat_endpoint::Endpoint::new(socket));
    let server = Arc::new(Server::new(endpoint, storage));
    tokio::spawn(server.clone().run());
    (server, addr)
}

/// Wait for the ACK with the given `SEQN` from `peer`, discarding any
/// unrelated frames (broadcast copies, stray notifications) in between.
pub async fn ack_for(peer: &MockPeer, seqn: i32) -> AckBody {
    loop {
        let (frame, _from) = peer.recv_frame().await.unwrap();
        if frame.header.ack && frame.header.seqn == seqn {
            return frame
                .body
                .map(|v| serde_json::from_value(v).unwrap())
                .unwrap_or_default();
        }
    }
}
