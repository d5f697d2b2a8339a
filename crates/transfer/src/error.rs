use std::time::Duration;

use chunkstream_data_channel::DataChannelError;
use chunkstream_protocol::ProtocolError;

/// Errors that end an upload without a terminal status.
///
/// A FAILED status is not an error here: it arrives as `Ok` with
/// [`StatusCode::Failed`](chunkstream_protocol::StatusCode::Failed).
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Rejected before any source or channel was opened.
    #[error("configuration error: {0}")]
    Configuration(#[from] ProtocolError),

    /// The local source could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] DataChannelError),

    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
}

impl UploadError {
    /// True when the session may have started but no answer came back.
    pub fn is_transport(&self) -> bool {
        matches!(self, UploadError::Transport(_) | UploadError::Timeout(_))
    }
}
