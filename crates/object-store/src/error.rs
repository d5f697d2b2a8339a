//! Object store error types.

/// Result type for object store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by object store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// The bucket exists and belongs to this store. Idempotent creation
    /// matches on this variant.
    #[error("bucket already owned: {0}")]
    BucketAlreadyOwned(String),

    #[error("bucket not empty: {0}")]
    BucketNotEmpty(String),

    #[error("object not found: {bucket}/{object}")]
    ObjectNotFound { bucket: String, object: String },

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("writer already closed")]
    WriterClosed,

    #[error("injected failure: {0}")]
    Injected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
