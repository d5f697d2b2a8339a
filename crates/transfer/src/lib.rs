//! Chunked upload sessions.
//!
//! [`ChunkProducer`] streams a local file as an ordered sequence of chunks;
//! [`Reassembler`] forwards them to an object store writer and decides the
//! single terminal [`Status`](chunkstream_protocol::Status) through the
//! [`respond`] mapping. [`UploadClient`] and [`UploadServer`] bind both
//! sides to TCP.

mod client;
mod config;
mod error;
mod producer;
mod reassembler;
mod responder;
mod server;
mod source;

pub use client::UploadClient;
pub use config::{ServerConfig, UploadConfig};
pub use error::UploadError;
pub use producer::{ChunkProducer, UploadReport};
pub use reassembler::{Reassembler, SessionReport};
pub use responder::{SessionOutcome, respond};
pub use server::UploadServer;
pub use source::SourceReader;

/// Hex-encoded SHA-256 of the bytes fed to `hasher`.
pub(crate) fn hex_digest(hasher: sha2::Sha256) -> String {
    use sha2::Digest;
    hex::encode(hasher.finalize())
}
