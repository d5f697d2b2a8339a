//! TCP data server (receiver side).
//!
//! Binds a listener and hands out one [`ChunkReceiver`] per accepted
//! connection.

use std::net::SocketAddr;

use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::TCP_BUFFER_SIZE;
use crate::channel::ChunkReceiver;
use crate::error::DataChannelError;

/// Receiver end of a TCP session.
pub type TcpChunkReceiver = ChunkReceiver<BufReader<OwnedReadHalf>, OwnedWriteHalf>;

/// TCP data server for receiving uploads.
pub struct TcpDataServer {
    listener: TcpListener,
    max_payload: usize,
}

impl TcpDataServer {
    /// Binds a listener on `addr`. Frames with payloads above `max_payload`
    /// abort their session.
    pub async fn bind(addr: SocketAddr, max_payload: usize) -> Result<Self, DataChannelError> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, max_payload, "TCP data channel listener bound");
        Ok(Self {
            listener,
            max_payload,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DataChannelError> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the next connection.
    ///
    /// The returned receiver observes a child of `cancel`, so cancelling
    /// the server also aborts its sessions.
    pub async fn accept(
        &self,
        cancel: &CancellationToken,
    ) -> Result<(TcpChunkReceiver, SocketAddr), DataChannelError> {
        let (stream, peer) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DataChannelError::Cancelled);
            }
            result = self.listener.accept() => result?,
        };
        debug!(%peer, "TCP data channel connection accepted");
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let reader = BufReader::with_capacity(TCP_BUFFER_SIZE, reader);
        Ok((
            ChunkReceiver::new(reader, writer, self.max_payload, cancel.child_token()),
            peer,
        ))
    }
}
