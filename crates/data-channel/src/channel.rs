//! The two ends of an upload session.
//!
//! [`ChunkSender`] writes chunk frames and, once, the end-of-input marker
//! followed by a wait for the terminal status. [`ChunkReceiver`] reads
//! frames in order and, once, writes the terminal status back. Both
//! terminal operations consume their end, so a session cannot signal
//! end-of-input or answer twice.
//!
//! Backpressure is whatever the underlying stream provides: a send blocks
//! while the pipe is full. Every blocking operation also races the
//! session's [`CancellationToken`].

use chunkstream_protocol::{Chunk, Status};
use tokio::io::{
    AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::DataChannelError;
use crate::wire::{Frame, read_frame, read_status, write_chunk, write_end_marker, write_status};

/// In-process sender end, see [`pair`].
pub type MemorySender = ChunkSender<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// In-process receiver end, see [`pair`].
pub type MemoryReceiver = ChunkReceiver<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Creates a connected in-process sender/receiver pair.
///
/// `capacity` bounds the bytes in flight in each direction; a sender that
/// gets ahead of its receiver blocks. Both ends share `cancel`.
pub fn pair(
    capacity: usize,
    max_payload: usize,
    cancel: CancellationToken,
) -> (MemorySender, MemoryReceiver) {
    let (near, far) = tokio::io::duplex(capacity);
    let (near_read, near_write) = tokio::io::split(near);
    let (far_read, far_write) = tokio::io::split(far);
    (
        ChunkSender::new(near_read, near_write, cancel.clone()),
        ChunkReceiver::new(far_read, far_write, max_payload, cancel),
    )
}

/// Producer end of a session.
pub struct ChunkSender<R, W> {
    reader: R,
    writer: W,
    cancel: CancellationToken,
    sent: u64,
}

impl<R, W> ChunkSender<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, cancel: CancellationToken) -> Self {
        Self {
            reader,
            writer,
            cancel,
            sent: 0,
        }
    }

    /// Sends one chunk, waiting for capacity if the pipe is full.
    pub async fn send(&mut self, chunk: &Chunk) -> Result<(), DataChannelError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DataChannelError::Cancelled),
            result = write_chunk(&mut self.writer, chunk) => {
                result?;
                self.sent += 1;
                Ok(())
            }
        }
    }

    /// Signals end-of-input and waits for the terminal status.
    pub async fn finish(mut self) -> Result<Status, DataChannelError> {
        let Self {
            reader,
            writer,
            cancel,
            sent,
        } = &mut self;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DataChannelError::Cancelled),
            result = async {
                write_end_marker(writer).await?;
                writer.flush().await?;
                debug!(chunks = *sent, "end of input sent, awaiting status");
                read_status(reader).await
            } => result,
        }
    }

    /// Number of chunks sent so far.
    pub fn chunks_sent(&self) -> u64 {
        self.sent
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Receiver end of a session.
pub struct ChunkReceiver<R, W> {
    reader: R,
    writer: W,
    cancel: CancellationToken,
    max_payload: usize,
    ended: bool,
}

impl<R, W> ChunkReceiver<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, max_payload: usize, cancel: CancellationToken) -> Self {
        Self {
            reader,
            writer,
            cancel,
            max_payload,
            ended: false,
        }
    }

    /// Receives the next chunk, or `None` once end-of-input arrives.
    ///
    /// Calling this again after `None` is a protocol error.
    pub async fn recv(&mut self) -> Result<Option<Chunk>, DataChannelError> {
        if self.ended {
            return Err(DataChannelError::Protocol(
                "end of input already received".into(),
            ));
        }

        let frame = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(DataChannelError::Cancelled),
            result = read_frame(&mut self.reader, self.max_payload) => result?,
        };

        match frame {
            Frame::Chunk(chunk) => Ok(Some(chunk)),
            Frame::End => {
                self.ended = true;
                Ok(None)
            }
        }
    }

    /// Sends the terminal status and closes the channel.
    ///
    /// Only valid after end-of-input has been received.
    pub async fn respond(mut self, status: &Status) -> Result<(), DataChannelError> {
        if !self.ended {
            return Err(DataChannelError::Protocol(
                "status sent before end of input".into(),
            ));
        }

        let Self { writer, cancel, .. } = &mut self;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DataChannelError::Cancelled),
            result = async {
                write_status(writer, status).await?;
                writer.shutdown().await?;
                Ok(())
            } => result,
        }
    }

    /// Largest payload this receiver accepts.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
