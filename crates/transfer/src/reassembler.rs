//! Receiver side of an upload: ordered chunks in, one object out.
//!
//! A session moves from waiting for its first chunk, to receiving, to
//! finalizing once end-of-input arrives. The first chunk fixes the
//! destination; destination fields on later chunks are ignored. After a
//! sink failure the session keeps draining chunks without forwarding them
//! so the producer still reaches end-of-input and gets its status.

use std::sync::Arc;

use chunkstream_data_channel::{ChunkReceiver, DataChannelError};
use chunkstream_object_store::{ObjectStore, ObjectWriter, StoreError};
use chunkstream_protocol::{Chunk, Destination, Status};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::hex_digest;
use crate::responder::{SessionOutcome, respond};

/// Summary of one finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Destination fixed by the first chunk, if any arrived.
    pub destination: Option<Destination>,
    /// Payload bytes forwarded to the writer.
    pub bytes: u64,
    /// Chunks received, forwarded or not.
    pub chunks: u64,
    /// Hex SHA-256 of the forwarded bytes.
    pub sha256: String,
    pub status: Status,
}

enum State {
    AwaitingFirstChunk,
    Receiving {
        destination: Destination,
        writer: Box<dyn ObjectWriter>,
    },
    /// A write failed; remaining chunks are read and discarded, then the
    /// writer is closed.
    WriteFailed {
        destination: Destination,
        writer: Box<dyn ObjectWriter>,
        error: StoreError,
    },
    /// No writer was opened; remaining chunks are read and discarded.
    Rejected {
        destination: Option<Destination>,
        failure: SessionOutcome,
    },
}

impl State {
    fn destination(&self) -> Option<&Destination> {
        match self {
            State::AwaitingFirstChunk => None,
            State::Receiving { destination, .. } | State::WriteFailed { destination, .. } => {
                Some(destination)
            }
            State::Rejected { destination, .. } => destination.as_ref(),
        }
    }
}

/// Per-session bookkeeping.
#[derive(Default)]
struct Tally {
    hasher: Sha256,
    bytes: u64,
    chunks: u64,
}

/// Reassembles uploads into objects of an [`ObjectStore`].
#[derive(Clone)]
pub struct Reassembler {
    store: Arc<dyn ObjectStore>,
}

impl Reassembler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Runs one session to completion.
    ///
    /// Returns `Err` when the transport fails before end-of-input; the open
    /// writer, if any, is dropped without a close and no status is sent.
    pub async fn run<R, W>(
        &self,
        mut receiver: ChunkReceiver<R, W>,
    ) -> Result<SessionReport, DataChannelError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut state = State::AwaitingFirstChunk;
        let mut tally = Tally::default();

        loop {
            let chunk = match receiver.recv().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        destination = ?state.destination(),
                        chunks = tally.chunks,
                        error = %e,
                        "upload session aborted by transport"
                    );
                    return Err(e);
                }
            };
            tally.chunks += 1;
            state = self.accept(state, chunk, &mut tally).await;
        }

        let destination = state.destination().cloned();
        let outcome = finalize(state).await;
        let status = respond(&outcome);
        receiver.respond(&status).await?;

        let report = SessionReport {
            destination,
            bytes: tally.bytes,
            chunks: tally.chunks,
            sha256: hex_digest(tally.hasher),
            status,
        };
        match &report.destination {
            Some(destination) => info!(
                %destination,
                bytes = report.bytes,
                chunks = report.chunks,
                sha256 = %report.sha256,
                status = %report.status,
                "upload session finished"
            ),
            None => info!(status = %report.status, "upload session finished without destination"),
        }
        Ok(report)
    }

    async fn accept(&self, state: State, chunk: Chunk, tally: &mut Tally) -> State {
        match state {
            State::AwaitingFirstChunk => {
                let destination = chunk.destination();
                if let Err(e) = destination.validate() {
                    warn!(error = %e, "first chunk carries no usable destination");
                    return State::Rejected {
                        destination: None,
                        failure: SessionOutcome::InvalidDestination(e.to_string()),
                    };
                }

                info!(%destination, "upload session started");
                match self
                    .store
                    .open_writer(&destination.bucket, &destination.object)
                    .await
                {
                    Ok(writer) => forward(destination, writer, chunk.payload, tally).await,
                    Err(e) => {
                        warn!(%destination, error = %e, "failed to open object writer");
                        State::Rejected {
                            destination: Some(destination),
                            failure: SessionOutcome::OpenFailed(e),
                        }
                    }
                }
            }
            State::Receiving {
                destination,
                writer,
            } => {
                if chunk.bucket != destination.bucket || chunk.object != destination.object {
                    debug!(
                        %destination,
                        ignored = %chunk.destination(),
                        "ignoring destination on later chunk"
                    );
                }
                forward(destination, writer, chunk.payload, tally).await
            }
            draining @ (State::WriteFailed { .. } | State::Rejected { .. }) => {
                debug!(bytes = chunk.payload.len(), "discarding chunk after failure");
                draining
            }
        }
    }
}

async fn forward(
    destination: Destination,
    mut writer: Box<dyn ObjectWriter>,
    payload: Vec<u8>,
    tally: &mut Tally,
) -> State {
    if !payload.is_empty() {
        if let Err(e) = writer.write(&payload).await {
            warn!(%destination, error = %e, "object write failed, draining session");
            return State::WriteFailed {
                destination,
                writer,
                error: e,
            };
        }
        tally.hasher.update(&payload);
        tally.bytes += payload.len() as u64;
    }
    debug!(%destination, chunk = tally.chunks, bytes = payload.len(), "chunk forwarded");
    State::Receiving {
        destination,
        writer,
    }
}

/// Closes whatever writer is still open and settles the outcome.
async fn finalize(state: State) -> SessionOutcome {
    match state {
        State::AwaitingFirstChunk => SessionOutcome::NoDestination,
        State::Receiving {
            destination,
            mut writer,
        } => match writer.close().await {
            Ok(()) => SessionOutcome::Stored,
            Err(e) => {
                warn!(%destination, error = %e, "failed to close object writer");
                SessionOutcome::CloseFailed(e)
            }
        },
        State::WriteFailed {
            destination,
            mut writer,
            error: write,
        } => match writer.close().await {
            Ok(()) => SessionOutcome::WriteFailed(write),
            Err(close) => {
                warn!(%destination, error = %close, "failed to close object writer");
                SessionOutcome::WriteAndCloseFailed { write, close }
            }
        },
        State::Rejected { failure, .. } => failure,
    }
}
