//! TCP data client (sender side).
//!
//! Dials the upload server and wraps the connection in a [`ChunkSender`].

use std::net::SocketAddr;

use tokio::io::BufWriter;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::channel::ChunkSender;
use crate::error::DataChannelError;
use crate::{TCP_BUFFER_SIZE, TCP_CONNECT_TIMEOUT};

/// Sender end of a TCP session.
pub type TcpChunkSender = ChunkSender<OwnedReadHalf, BufWriter<OwnedWriteHalf>>;

/// TCP data client for sending uploads.
pub struct TcpDataClient;

impl TcpDataClient {
    /// Connects to `addr` and returns the sender end of a new session.
    pub async fn connect(
        addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Result<TcpChunkSender, DataChannelError> {
        // Connect with timeout + cancellation.
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DataChannelError::Cancelled);
            }
            result = tokio::time::timeout(TCP_CONNECT_TIMEOUT, TcpStream::connect(addr)) => {
                match result {
                    Ok(Ok(s)) => {
                        info!(%addr, "TCP data channel connected");
                        s
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => return Err(DataChannelError::Timeout),
                }
            }
        };
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);
        Ok(ChunkSender::new(reader, writer, cancel))
    }
}
