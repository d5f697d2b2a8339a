//! Filesystem-backed object store.
//!
//! Layout: `<root>/<bucket>/<object key>`. A writer streams into a hidden
//! temporary file next to the final key and renames it into place on
//! close, so objects appear atomically and a failed or abandoned write
//! leaves nothing behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::validation::{validate_bucket_name, validate_object_key};
use crate::{BucketAdmin, ObjectStore, ObjectWriter, StoreError, StoreResult};

/// Write buffer for object files (256 KB).
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root directory if needed and returns the store.
    pub async fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let store = Self::new(root);
        tokio::fs::create_dir_all(&store.root).await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> StoreResult<PathBuf> {
        validate_bucket_name(bucket)?;
        Ok(self.root.join(bucket))
    }

    async fn existing_bucket(&self, bucket: &str) -> StoreResult<PathBuf> {
        let path = self.bucket_path(bucket)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(StoreError::BucketNotFound(bucket.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::BucketNotFound(bucket.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn open_writer(&self, bucket: &str, object: &str) -> StoreResult<Box<dyn ObjectWriter>> {
        let bucket_path = self.existing_bucket(bucket).await?;
        validate_object_key(object)?;

        let final_path = bucket_path.join(object);
        let parent = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| bucket_path.clone());
        tokio::fs::create_dir_all(&parent).await?;

        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp_path = parent.join(format!(".{file_name}.{}.part", uuid::Uuid::new_v4()));

        let file = File::create(&temp_path).await?;
        debug!(temp = %temp_path.display(), "object writer opened");

        Ok(Box::new(FsObjectWriter {
            file: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            temp_path,
            final_path,
            settled: false,
        }))
    }
}

#[async_trait]
impl BucketAdmin for FsObjectStore {
    async fn create_bucket(&self, name: &str) -> StoreResult<()> {
        let path = self.bucket_path(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        match tokio::fs::create_dir(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::BucketAlreadyOwned(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_buckets(&self) -> StoreResult<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_bucket_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_bucket(&self, name: &str) -> StoreResult<()> {
        let path = self.existing_bucket(name).await?;
        if contains_files(&path).await? {
            return Err(StoreError::BucketNotEmpty(name.to_string()));
        }
        // Only empty key directories remain.
        tokio::fs::remove_dir_all(&path).await?;
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, object: &str) -> StoreResult<()> {
        let bucket_path = self.existing_bucket(bucket).await?;
        validate_object_key(object)?;
        let path = bucket_path.join(object);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                prune_empty_dirs(&path, &bucket_path).await;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

/// True if anything other than a directory lives under `dir`.
async fn contains_files(dir: &Path) -> StoreResult<bool> {
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                pending.push(entry.path());
            } else {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Removes the now-empty key directories between `object_path` and
/// `bucket_path`, stopping at the first one that still has entries.
async fn prune_empty_dirs(object_path: &Path, bucket_path: &Path) {
    let mut dir = object_path.parent();
    while let Some(current) = dir {
        if current == bucket_path || !current.starts_with(bucket_path) {
            break;
        }
        if tokio::fs::remove_dir(current).await.is_err() {
            break;
        }
        debug!(dir = %current.display(), "removed empty key directory");
        dir = current.parent();
    }
}

/// Streams one object into a temporary file.
struct FsObjectWriter {
    file: Option<BufWriter<File>>,
    temp_path: PathBuf,
    final_path: PathBuf,
    /// Set once the temporary file is renamed or removed.
    settled: bool,
}

impl FsObjectWriter {
    async fn commit(&self, mut file: BufWriter<File>) -> std::io::Result<()> {
        file.flush().await?;
        file.get_ref().sync_all().await?;
        drop(file);
        tokio::fs::rename(&self.temp_path, &self.final_path).await
    }
}

#[async_trait]
impl ObjectWriter for FsObjectWriter {
    async fn write(&mut self, data: &[u8]) -> StoreResult<()> {
        let file = self.file.as_mut().ok_or(StoreError::WriterClosed)?;
        file.write_all(data).await?;
        Ok(())
    }

    async fn close(&mut self) -> StoreResult<()> {
        let file = self.file.take().ok_or(StoreError::WriterClosed)?;
        match self.commit(file).await {
            Ok(()) => {
                self.settled = true;
                debug!(path = %self.final_path.display(), "object committed");
                Ok(())
            }
            Err(e) => {
                warn!(path = %self.final_path.display(), error = %e, "object commit failed");
                if let Err(e) = tokio::fs::remove_file(&self.temp_path).await {
                    debug!(error = %e, "temporary object file not removed");
                }
                self.settled = true;
                Err(e.into())
            }
        }
    }
}

impl Drop for FsObjectWriter {
    fn drop(&mut self) {
        if !self.settled {
            // Abandoned mid-write: discard the partial object.
            self.file.take();
            let _ = std::fs::remove_file(&self.temp_path);
        }
    }
}
