//! TCP upload server: one reassembly session per connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chunkstream_data_channel::{ChunkReceiver, DataChannelError, TcpDataServer};
use chunkstream_object_store::ObjectStore;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::reassembler::{Reassembler, SessionReport};

/// Accepts upload sessions and stores them through an [`ObjectStore`].
pub struct UploadServer {
    reassembler: Reassembler,
    config: ServerConfig,
}

impl UploadServer {
    pub fn new(store: Arc<dyn ObjectStore>, config: ServerConfig) -> Self {
        Self {
            reassembler: Reassembler::new(store),
            config,
        }
    }

    /// Binds a listener that accepts chunks up to the configured maximum.
    pub async fn bind(&self, addr: SocketAddr) -> Result<TcpDataServer, DataChannelError> {
        TcpDataServer::bind(addr, self.config.max_chunk_size.get()).await
    }

    /// Serves sessions until `cancel` fires, then waits for the sessions
    /// still in flight. Cancelling also aborts those sessions.
    pub async fn serve(
        &self,
        listener: TcpDataServer,
        cancel: CancellationToken,
    ) -> Result<(), DataChannelError> {
        info!(addr = %listener.local_addr()?, "upload server accepting sessions");
        let mut sessions = JoinSet::new();

        loop {
            let (receiver, peer) = match listener.accept(&cancel).await {
                Ok(accepted) => accepted,
                Err(DataChannelError::Cancelled) => break,
                Err(e) => {
                    warn!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            let reassembler = self.reassembler.clone();
            let timeout = self.config.session_timeout;
            sessions.spawn(async move {
                match run_session(&reassembler, receiver, timeout).await {
                    Ok(report) => debug!(%peer, status = %report.status, "session closed"),
                    Err(e) => warn!(%peer, error = %e, "session aborted"),
                }
            });

            while sessions.try_join_next().is_some() {}
        }

        info!(in_flight = sessions.len(), "upload server stopping");
        while sessions.join_next().await.is_some() {}
        Ok(())
    }
}

/// Runs one session, aborting it once `timeout` elapses.
pub(crate) async fn run_session<R, W>(
    reassembler: &Reassembler,
    receiver: ChunkReceiver<R, W>,
    timeout: Option<Duration>,
) -> Result<SessionReport, DataChannelError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, reassembler.run(receiver))
            .await
            .unwrap_or(Err(DataChannelError::Timeout)),
        None => reassembler.run(receiver).await,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chunkstream_data_channel::pair;
    use chunkstream_object_store::{BucketAdmin, FsObjectStore, MemoryObjectStore};
    use chunkstream_protocol::{Chunk, Destination, StatusCode};
    use tempfile::NamedTempFile;

    use super::*;
    use crate::{UploadClient, UploadConfig, UploadError};

    fn source(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    async fn start(
        store: Arc<dyn ObjectStore>,
        config: ServerConfig,
    ) -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
        let server = UploadServer::new(store, config);
        let listener = server.bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let serve_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            server.serve(listener, serve_cancel).await.unwrap();
        });
        (addr, cancel, handle)
    }

    #[tokio::test]
    async fn uploads_file_over_tcp() {
        let root = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(root.path()).await.unwrap();
        store.create_bucket("photos").await.unwrap();
        let (addr, cancel, handle) = start(Arc::new(store), ServerConfig::default()).await;

        let file = source(b"HELLOWORLD");
        let client = UploadClient::new(addr, UploadConfig::new(4).unwrap());
        let report = client
            .upload(
                file.path(),
                &Destination::new("photos", "greeting.txt"),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(report.status.is_ok());
        assert_eq!(report.chunks, 3);
        let stored = std::fs::read(root.path().join("photos/greeting.txt")).unwrap();
        assert_eq!(stored, b"HELLOWORLD");

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn missing_source_never_dials() {
        // Nothing listens here; dialing would fail with a transport error.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let client = UploadClient::new(addr, UploadConfig::default());
        let result = client
            .upload(
                &dir.path().join("absent"),
                &Destination::new("b", "o"),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(UploadError::Io(_))));
    }

    #[tokio::test]
    async fn oversized_chunks_abort_the_session() {
        let store = MemoryObjectStore::new().with_bucket("b");
        let config = ServerConfig {
            max_chunk_size: chunkstream_protocol::ChunkSize::new(4).unwrap(),
            session_timeout: None,
        };
        let (addr, cancel, handle) = start(Arc::new(store.clone()), config).await;

        let file = source(b"HELLOWORLD");
        let client = UploadClient::new(addr, UploadConfig::new(8).unwrap());
        let result = client
            .upload(file.path(), &Destination::new("b", "o"), CancellationToken::new())
            .await;

        assert!(result.unwrap_err().is_transport());
        assert_eq!(store.object("b", "o"), None);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn serves_concurrent_sessions() {
        let store = MemoryObjectStore::new().with_bucket("b");
        let (addr, cancel, handle) =
            start(Arc::new(store.clone()), ServerConfig::default()).await;

        let mut uploads = JoinSet::new();
        for i in 0..8u8 {
            uploads.spawn(async move {
                let file = source(&vec![i; 1000]);
                let client = UploadClient::new(addr, UploadConfig::new(64).unwrap());
                client
                    .upload(
                        file.path(),
                        &Destination::new("b", format!("object-{i}")),
                        CancellationToken::new(),
                    )
                    .await
                    .unwrap()
            });
        }
        while let Some(report) = uploads.join_next().await {
            assert!(report.unwrap().status.is_ok());
        }

        for i in 0..8u8 {
            let object = store.object("b", &format!("object-{i}")).unwrap();
            assert_eq!(object, vec![i; 1000]);
        }

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_session_times_out() {
        let store = MemoryObjectStore::new().with_bucket("b");
        let reassembler = Reassembler::new(Arc::new(store.clone()));
        let (mut tx, rx) = pair(1024, 1024, CancellationToken::new());

        tx.send(&Chunk::new(&Destination::new("b", "o"), b"partial".to_vec()))
            .await
            .unwrap();
        let result = run_session(&reassembler, rx, Some(Duration::from_secs(5))).await;

        let err = result.unwrap_err();
        assert!(matches!(err, DataChannelError::Timeout));
        assert_eq!(err.to_string(), "timed out");
        assert_eq!(store.abandoned(), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn timed_out_upload_leaves_caller_token_alone() {
        // Connections queue in the backlog but are never accepted.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let file = source(b"HELLOWORLD");
        let config = UploadConfig::new(4)
            .unwrap()
            .with_timeout(Duration::from_millis(200));
        let shared = CancellationToken::new();
        let result = UploadClient::new(addr, config)
            .upload(file.path(), &Destination::new("b", "o"), shared.clone())
            .await;

        assert!(matches!(result, Err(UploadError::Timeout(_))));
        assert!(!shared.is_cancelled());
        drop(listener);
    }

    #[tokio::test]
    async fn failed_status_reaches_client() {
        let store = MemoryObjectStore::new();
        let (addr, cancel, handle) =
            start(Arc::new(store.clone()), ServerConfig::default()).await;

        let file = source(b"data");
        let report = UploadClient::new(addr, UploadConfig::default())
            .upload(file.path(), &Destination::new("missing", "o"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status.code(), StatusCode::Failed);
        assert!(report.status.message().contains("missing"));

        cancel.cancel();
        handle.await.unwrap();
    }
}
