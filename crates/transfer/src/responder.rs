//! Maps how a session ended to the single status sent back to the producer.

use chunkstream_object_store::StoreError;
use chunkstream_protocol::Status;

/// How a session ended once end-of-input arrived.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Every byte was forwarded and the writer closed cleanly.
    Stored,
    /// End-of-input arrived before any chunk named a destination.
    NoDestination,
    /// The first chunk named a destination the store cannot hold.
    InvalidDestination(String),
    OpenFailed(StoreError),
    WriteFailed(StoreError),
    CloseFailed(StoreError),
    WriteAndCloseFailed { write: StoreError, close: StoreError },
}

impl SessionOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, SessionOutcome::Stored)
    }
}

/// Builds the terminal status for `outcome`.
///
/// OK carries the fixed success message; every failure carries a non-empty
/// description of what went wrong.
pub fn respond(outcome: &SessionOutcome) -> Status {
    match outcome {
        SessionOutcome::Stored => Status::ok(),
        SessionOutcome::NoDestination => {
            Status::failed("upload failed: no destination received")
        }
        SessionOutcome::InvalidDestination(reason) => {
            Status::failed(format!("upload failed: invalid destination: {reason}"))
        }
        SessionOutcome::OpenFailed(e) => {
            Status::failed(format!("upload failed opening object writer: {e}"))
        }
        SessionOutcome::WriteFailed(e) => {
            Status::failed(format!("upload failed writing object: {e}"))
        }
        SessionOutcome::CloseFailed(e) => {
            Status::failed(format!("upload failed closing object writer: {e}"))
        }
        SessionOutcome::WriteAndCloseFailed { write, close } => Status::failed(format!(
            "upload failed writing object: {write}; closing object writer also failed: {close}"
        )),
    }
}
