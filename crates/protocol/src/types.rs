use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Where an upload lands in the object store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Destination {
    pub bucket: String,
    pub object: String,
}

impl Destination {
    pub fn new(bucket: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object: object.into(),
        }
    }

    /// Checks that both the bucket and the object name are present.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.bucket.is_empty() {
            return Err(ProtocolError::MissingDestination("bucket"));
        }
        if self.object.is_empty() {
            return Err(ProtocolError::MissingDestination("object"));
        }
        Ok(())
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.object)
    }
}

/// One bounded fragment of a transferred file.
///
/// `bucket` and `object` are only authoritative on the first chunk of a
/// session; the receiver ignores them afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub bucket: String,
    pub object: String,
    pub payload: Vec<u8>,
}

impl Chunk {
    pub fn new(destination: &Destination, payload: Vec<u8>) -> Self {
        Self {
            bucket: destination.bucket.clone(),
            object: destination.object.clone(),
            payload,
        }
    }

    /// Destination named by this chunk.
    pub fn destination(&self) -> Destination {
        Destination::new(self.bucket.clone(), self.object.clone())
    }
}

/// A validated chunk size in `1..=MAX_CHUNK_SIZE` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct ChunkSize(usize);

impl ChunkSize {
    pub fn new(size: usize) -> Result<Self, ProtocolError> {
        if size == 0 || size > MAX_CHUNK_SIZE {
            return Err(ProtocolError::InvalidChunkSize {
                size,
                max: MAX_CHUNK_SIZE,
            });
        }
        Ok(Self(size))
    }

    /// The largest chunk size the protocol allows.
    pub const fn max() -> Self {
        Self(MAX_CHUNK_SIZE)
    }

    pub const fn get(self) -> usize {
        self.0
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(DEFAULT_CHUNK_SIZE)
    }
}

impl TryFrom<usize> for ChunkSize {
    type Error = ProtocolError;

    fn try_from(size: usize) -> Result<Self, Self::Error> {
        Self::new(size)
    }
}

impl From<ChunkSize> for usize {
    fn from(size: ChunkSize) -> Self {
        size.0
    }
}
