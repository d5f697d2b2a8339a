//! TCP upload client.

use std::net::SocketAddr;
use std::path::Path;

use chunkstream_data_channel::TcpDataClient;
use chunkstream_protocol::Destination;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::UploadConfig;
use crate::error::UploadError;
use crate::producer::{ChunkProducer, UploadReport};
use crate::source::SourceReader;

/// Uploads local files to an [`UploadServer`](crate::UploadServer).
pub struct UploadClient {
    addr: SocketAddr,
    config: UploadConfig,
    progress: Option<mpsc::Sender<u64>>,
}

impl UploadClient {
    pub fn new(addr: SocketAddr, config: UploadConfig) -> Self {
        Self {
            addr,
            config,
            progress: None,
        }
    }

    /// See [`ChunkProducer::with_progress`].
    pub fn with_progress(mut self, progress: mpsc::Sender<u64>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Uploads the file at `path` to `destination`.
    ///
    /// The destination and the source are checked before dialing, so a bad
    /// path never opens a session. A FAILED status comes back as `Ok`.
    pub async fn upload(
        &self,
        path: &Path,
        destination: &Destination,
        cancel: CancellationToken,
    ) -> Result<UploadReport, UploadError> {
        destination.validate()?;
        let source = SourceReader::open(path, self.config.chunk_size).await?;

        let mut producer = ChunkProducer::new(self.config.chunk_size);
        if let Some(progress) = &self.progress {
            producer = producer.with_progress(progress.clone());
        }

        // The session observes a child so a deadline never cancels the caller's token.
        let session_cancel = cancel.child_token();
        let session = async {
            let sender = TcpDataClient::connect(self.addr, session_cancel.clone()).await?;
            producer.send_source(source, destination, sender).await
        };

        match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, session).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%destination, ?limit, "upload timed out");
                    session_cancel.cancel();
                    Err(UploadError::Timeout(limit))
                }
            },
            None => session.await,
        }
    }
}
