//! Error types for the data channel.

use chunkstream_protocol::ProtocolError;

/// Errors produced by the transport channel.
///
/// Any of these means the session was aborted without a terminal status.
#[derive(Debug, thiserror::Error)]
pub enum DataChannelError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },
}

impl From<ProtocolError> for DataChannelError {
    fn from(e: ProtocolError) -> Self {
        DataChannelError::Protocol(e.to_string())
    }
}
