//! Shared message types for the chunked upload protocol.
//!
//! A session is a sequence of [`Chunk`]s flowing from sender to receiver,
//! terminated by an end-of-input signal and answered by exactly one
//! [`Status`].

pub mod constants;
pub mod status;
pub mod types;

pub use constants::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, STATUS_OK_MESSAGE};
pub use status::{Status, StatusCode};
pub use types::{Chunk, ChunkSize, Destination};

/// Errors produced while building or decoding protocol values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid chunk size {size}: must be between 1 and {max} bytes")]
    InvalidChunkSize { size: usize, max: usize },

    #[error("missing destination: {0} must not be empty")]
    MissingDestination(&'static str),

    #[error("unknown status code: {0}")]
    UnknownStatusCode(u8),
}
