//! In-memory object store for tests and embedding.
//!
//! Objects are committed only when their writer closes. The store keeps a
//! log of every write call and counts writers opened, closed and abandoned,
//! and can inject failures into opens, writes and closes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::validation::{validate_bucket_name, validate_object_key};
use crate::{BucketAdmin, ObjectStore, ObjectWriter, StoreError, StoreResult};

/// Failures to inject into writers opened after they are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Faults {
    /// Fail `open_writer`.
    pub fail_open: bool,
    /// Fail the write call with this zero-based index (per writer).
    pub fail_write_at: Option<usize>,
    /// Fail `close` (the object is not committed, the writer still counts as closed).
    pub fail_close: bool,
}

/// Object store that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    faults: Faults,
    writes: Vec<Vec<u8>>,
    opened: usize,
    closed: usize,
    abandoned: usize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store with `bucket` already created.
    pub fn with_bucket(self, bucket: &str) -> Self {
        self.lock().buckets.entry(bucket.to_string()).or_default();
        self
    }

    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Committed contents of `bucket/object`.
    pub fn object(&self, bucket: &str, object: &str) -> Option<Vec<u8>> {
        self.lock()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(object))
            .cloned()
    }

    /// Committed object keys of `bucket`, sorted.
    pub fn objects(&self, bucket: &str) -> Vec<String> {
        self.lock()
            .buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Every accepted write call, in the order received.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock().writes.clone()
    }

    pub fn opened(&self) -> usize {
        self.lock().opened
    }

    pub fn closed(&self) -> usize {
        self.lock().closed
    }

    /// Writers dropped without a close.
    pub fn abandoned(&self) -> usize {
        self.lock().abandoned
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        lock(&self.inner)
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn open_writer(&self, bucket: &str, object: &str) -> StoreResult<Box<dyn ObjectWriter>> {
        validate_bucket_name(bucket)?;
        validate_object_key(object)?;

        let mut inner = self.lock();
        if inner.faults.fail_open {
            return Err(StoreError::Injected("open".into()));
        }
        if !inner.buckets.contains_key(bucket) {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        inner.opened += 1;
        let faults = inner.faults.clone();
        drop(inner);

        Ok(Box::new(MemoryObjectWriter {
            store: Arc::clone(&self.inner),
            bucket: bucket.to_string(),
            object: object.to_string(),
            buf: Vec::new(),
            faults,
            writes: 0,
            closed: false,
        }))
    }
}

#[async_trait]
impl BucketAdmin for MemoryObjectStore {
    async fn create_bucket(&self, name: &str) -> StoreResult<()> {
        validate_bucket_name(name)?;
        let mut inner = self.lock();
        if inner.buckets.contains_key(name) {
            return Err(StoreError::BucketAlreadyOwned(name.to_string()));
        }
        inner.buckets.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock().buckets.keys().cloned().collect())
    }

    async fn delete_bucket(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        match inner.buckets.get(name) {
            None => Err(StoreError::BucketNotFound(name.to_string())),
            Some(objects) if !objects.is_empty() => {
                Err(StoreError::BucketNotEmpty(name.to_string()))
            }
            Some(_) => {
                inner.buckets.remove(name);
                Ok(())
            }
        }
    }

    async fn delete_object(&self, bucket: &str, object: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        let objects = inner
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        objects
            .remove(object)
            .map(|_| ())
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })
    }
}

struct MemoryObjectWriter {
    store: Arc<Mutex<Inner>>,
    bucket: String,
    object: String,
    buf: Vec<u8>,
    faults: Faults,
    writes: usize,
    closed: bool,
}

#[async_trait]
impl ObjectWriter for MemoryObjectWriter {
    async fn write(&mut self, data: &[u8]) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        let index = self.writes;
        self.writes += 1;
        if self.faults.fail_write_at == Some(index) {
            return Err(StoreError::Injected(format!("write #{index}")));
        }

        lock(&self.store).writes.push(data.to_vec());
        self.buf.extend_from_slice(data);
        Ok(())
    }

    async fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::WriterClosed);
        }
        self.closed = true;

        let mut inner = lock(&self.store);
        inner.closed += 1;
        if self.faults.fail_close {
            return Err(StoreError::Injected("close".into()));
        }
        let objects = inner
            .buckets
            .get_mut(&self.bucket)
            .ok_or_else(|| StoreError::BucketNotFound(self.bucket.clone()))?;
        objects.insert(self.object.clone(), std::mem::take(&mut self.buf));
        Ok(())
    }
}

impl Drop for MemoryObjectWriter {
    fn drop(&mut self) {
        if !self.closed {
            lock(&self.store).abandoned += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_on_close_only() {
        let store = MemoryObjectStore::new().with_bucket("b");

        let mut writer = store.open_writer("b", "o").await.unwrap();
        writer.write(b"HELLO").await.unwrap();
        assert_eq!(store.object("b", "o"), None);

        writer.close().await.unwrap();
        assert_eq!(store.object("b", "o").unwrap(), b"HELLO");
        assert_eq!(store.writes(), vec![b"HELLO".to_vec()]);
        assert_eq!((store.opened(), store.closed()), (1, 1));
    }

    #[tokio::test]
    async fn injected_close_failure() {
        let store = MemoryObjectStore::new().with_bucket("b");
        store.set_faults(Faults {
            fail_close: true,
            ..Faults::default()
        });

        let mut writer = store.open_writer("b", "o").await.unwrap();
        writer.write(b"data").await.unwrap();
        assert!(matches!(writer.close().await, Err(StoreError::Injected(_))));

        assert_eq!(store.object("b", "o"), None);
        assert_eq!(store.closed(), 1);
    }

    #[tokio::test]
    async fn injected_write_failure() {
        let store = MemoryObjectStore::new().with_bucket("b");
        store.set_faults(Faults {
            fail_write_at: Some(1),
            ..Faults::default()
        });

        let mut writer = store.open_writer("b", "o").await.unwrap();
        writer.write(b"first").await.unwrap();
        assert!(writer.write(b"second").await.is_err());
        assert_eq!(store.writes(), vec![b"first".to_vec()]);
    }

    #[tokio::test]
    async fn dropped_writer_counts_as_abandoned() {
        let store = MemoryObjectStore::new().with_bucket("b");
        let writer = store.open_writer("b", "o").await.unwrap();
        drop(writer);

        assert_eq!(store.abandoned(), 1);
        assert_eq!(store.closed(), 0);
    }

    #[tokio::test]
    async fn missing_bucket() {
        let store = MemoryObjectStore::new();
        assert!(matches!(
            store.open_writer("b", "o").await,
            Err(StoreError::BucketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn bucket_admin() {
        let store = MemoryObjectStore::new();
        store.create_bucket("b").await.unwrap();
        assert!(matches!(
            store.create_bucket("b").await,
            Err(StoreError::BucketAlreadyOwned(_))
        ));
        store.ensure_bucket("b").await.unwrap();
        store.ensure_bucket("a").await.unwrap();
        assert_eq!(store.list_buckets().await.unwrap(), vec!["a", "b"]);

        let mut writer = store.open_writer("b", "o").await.unwrap();
        writer.close().await.unwrap();
        assert!(matches!(
            store.delete_bucket("b").await,
            Err(StoreError::BucketNotEmpty(_))
        ));
        store.delete_object("b", "o").await.unwrap();
        store.delete_bucket("b").await.unwrap();
        assert_eq!(store.list_buckets().await.unwrap(), vec!["a"]);
    }
}
