//! Object sink backends.
//!
//! The upload core only needs [`ObjectStore::open_writer`] and the
//! [`ObjectWriter`] it returns. [`BucketAdmin`] covers the bucket
//! management the command-line tool exposes.

use async_trait::async_trait;

mod error;
mod fs;
mod memory;
mod validation;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::{Faults, MemoryObjectStore};
pub use validation::{validate_bucket_name, validate_object_key};

/// Opens streaming writers for objects.
///
/// Implementations must tolerate concurrent use by unrelated sessions.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Opens a writer for `bucket/object`. The object becomes visible only
    /// once the writer closes successfully.
    async fn open_writer(&self, bucket: &str, object: &str) -> StoreResult<Box<dyn ObjectWriter>>;
}

/// An in-progress object write, owned by exactly one session.
///
/// Dropping a writer without closing it discards what was written.
#[async_trait]
pub trait ObjectWriter: Send {
    /// Appends `data` to the object.
    async fn write(&mut self, data: &[u8]) -> StoreResult<()>;

    /// Commits the object. A second call fails with [`StoreError::WriterClosed`].
    async fn close(&mut self) -> StoreResult<()>;
}

/// Bucket management.
#[async_trait]
pub trait BucketAdmin: Send + Sync {
    /// Creates a bucket. Fails with [`StoreError::BucketAlreadyOwned`] if it
    /// already exists.
    async fn create_bucket(&self, name: &str) -> StoreResult<()>;

    /// Creates a bucket unless it already exists.
    async fn ensure_bucket(&self, name: &str) -> StoreResult<()> {
        match self.create_bucket(name).await {
            Ok(()) | Err(StoreError::BucketAlreadyOwned(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Lists bucket names in sorted order.
    async fn list_buckets(&self) -> StoreResult<Vec<String>>;

    /// Deletes an empty bucket.
    async fn delete_bucket(&self, name: &str) -> StoreResult<()>;

    async fn delete_object(&self, bucket: &str, object: &str) -> StoreResult<()>;
}
