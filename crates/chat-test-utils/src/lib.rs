// chat-test-utils: a loopback UDP peer harness shared by crate unit tests
// and the root `tests/integration/*.rs` end-to-end scenarios.

pub mod mock_peer;

pub use mock_peer::MockPeer;
