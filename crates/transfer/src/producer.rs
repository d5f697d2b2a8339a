//! Sender side of an upload: source file in, ordered chunks out.

use std::path::Path;

use chunkstream_data_channel::ChunkSender;
use chunkstream_protocol::{Chunk, ChunkSize, Destination, Status};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::UploadError;
use crate::hex_digest;
use crate::source::SourceReader;

/// Result of a completed upload as seen by the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub status: Status,
    /// Payload bytes sent.
    pub bytes: u64,
    pub chunks: u64,
    /// Hex SHA-256 of the payload bytes sent.
    pub sha256: String,
}

/// Streams a source file over a [`ChunkSender`].
#[derive(Debug, Clone, Default)]
pub struct ChunkProducer {
    chunk_size: ChunkSize,
    progress: Option<mpsc::Sender<u64>>,
}

impl ChunkProducer {
    pub fn new(chunk_size: ChunkSize) -> Self {
        Self {
            chunk_size,
            progress: None,
        }
    }

    /// Reports cumulative bytes sent after every chunk. Updates are dropped
    /// while the channel is full.
    pub fn with_progress(mut self, progress: mpsc::Sender<u64>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Uploads the file at `path` to `destination`.
    ///
    /// The destination and the source are checked before anything is sent;
    /// on either failure `sender` is dropped without a chunk.
    pub async fn send<R, W>(
        &self,
        path: &Path,
        destination: &Destination,
        sender: ChunkSender<R, W>,
    ) -> Result<UploadReport, UploadError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        destination.validate()?;
        let source = SourceReader::open(path, self.chunk_size).await?;
        self.send_source(source, destination, sender).await
    }

    /// Streams an already opened source to `destination`.
    ///
    /// At least one chunk is always sent, so an empty source still names
    /// its destination.
    ///
    /// A read error stops the upload before another chunk is sent; `sender`
    /// is dropped without end-of-input so the receiver sees an abort.
    pub async fn send_source<S, R, W>(
        &self,
        mut source: SourceReader<S>,
        destination: &Destination,
        mut sender: ChunkSender<R, W>,
    ) -> Result<UploadReport, UploadError>
    where
        S: AsyncRead + Unpin,
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        destination.validate()?;
        let mut hasher = Sha256::new();
        let mut bytes = 0u64;

        while let Some(block) = source.next_block().await? {
            hasher.update(&block);
            bytes += block.len() as u64;
            sender.send(&Chunk::new(destination, block)).await?;
            debug!(chunk = sender.chunks_sent(), bytes, "chunk sent");
            self.report_progress(bytes);
        }
        if sender.chunks_sent() == 0 {
            sender.send(&Chunk::new(destination, Vec::new())).await?;
            debug!("empty source, sent empty chunk");
        }

        let chunks = sender.chunks_sent();
        let status = sender.finish().await?;
        let sha256 = hex_digest(hasher);
        info!(
            %destination,
            bytes,
            chunks,
            %sha256,
            %status,
            "upload finished"
        );

        Ok(UploadReport {
            status,
            bytes,
            chunks,
            sha256,
        })
    }

    fn report_progress(&self, bytes: u64) {
        if let Some(progress) = &self.progress {
            let _ = progress.try_send(bytes);
        }
    }
}
