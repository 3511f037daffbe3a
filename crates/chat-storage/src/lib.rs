// chat-storage: the storage port (C3) and session/address registry (C7)
// backing the udp-chat server, over a bundled SQLite database. See
// SPEC_FULL.md §4.3/§4.7.

mod addr;
mod error;
mod models;
mod storage;

pub use addr::parse_addr;
pub use error::{StorageError, StorageResult};
pub use models::{GroupHistoryEntry, MessageHistoryEntry};
pub use storage::Storage;
