#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("request timed out")]
    TimedOut,
    #[error("endpoint closed")]
    ConnectionClosed,
    #[error("too many outstanding requests")]
    Overloaded,
    #[error(transparent)]
    Frame(#[from] chat_protocol::FrameError),
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}
