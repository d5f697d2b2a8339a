use std::time::Duration;

use chunkstream_protocol::{ChunkSize, ProtocolError};

/// Sender-side settings for one upload.
#[derive(Debug, Clone, Default)]
pub struct UploadConfig {
    pub chunk_size: ChunkSize,
    /// Deadline for the whole upload, connection included.
    pub timeout: Option<Duration>,
}

impl UploadConfig {
    /// Validates `chunk_size` before any source or connection is opened.
    pub fn new(chunk_size: usize) -> Result<Self, ProtocolError> {
        Ok(Self {
            chunk_size: ChunkSize::new(chunk_size)?,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Receiver-side settings shared by every session of a server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Largest chunk payload accepted; bigger frames abort the session.
    pub max_chunk_size: ChunkSize,
    /// Deadline for a single session, from accept to terminal status.
    pub session_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: ChunkSize::max(),
            session_timeout: None,
        }
    }
}
