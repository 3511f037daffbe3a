// chat-endpoint: the reliable datagram endpoint (C2). See SPEC_FULL.md §4.2.

mod endpoint;
mod error;

pub use endpoint::{
    BROADCAST_INITIAL_DELAY, DEFAULT_INITIAL_DELAY, DEFAULT_MAX_OUTSTANDING, Endpoint, Inbound,
    MAX_TIMEOUT, RequestHandle,
};
pub use error::EndpointError;
