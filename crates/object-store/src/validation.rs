use std::path::{Component, Path};

use crate::StoreError;

/// Longest accepted bucket name.
const MAX_BUCKET_NAME: usize = 255;

/// Validates a bucket name.
///
/// Accepts ASCII letters, digits, `-`, `_` and `.`, not starting with `.`.
pub fn validate_bucket_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty() {
        return Err(StoreError::InvalidName("empty bucket name".into()));
    }
    if name.len() > MAX_BUCKET_NAME {
        return Err(StoreError::InvalidName(format!(
            "bucket name longer than {MAX_BUCKET_NAME} bytes"
        )));
    }
    if name.starts_with('.') {
        return Err(StoreError::InvalidName(format!(
            "bucket name may not start with '.': {name}"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(StoreError::InvalidName(format!(
            "invalid character {c:?} in bucket name: {name}"
        )));
    }
    Ok(())
}

/// Validates that an object key stays inside its bucket.
///
/// Rejects:
/// - Empty keys and keys naming a directory (`.`, trailing `/`)
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_object_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidName("empty object key".into()));
    }
    if key.ends_with('/') {
        return Err(StoreError::InvalidName(format!(
            "object key names a directory: {key}"
        )));
    }

    let path = Path::new(key);

    if path.is_absolute() {
        return Err(StoreError::InvalidName(format!(
            "absolute path not allowed: {key}"
        )));
    }

    let mut has_name = false;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(StoreError::InvalidName(format!(
                    "parent directory traversal not allowed: {key}"
                )));
            }
            Component::Prefix(_) => {
                return Err(StoreError::InvalidName(format!(
                    "path prefix not allowed: {key}"
                )));
            }
            Component::RootDir => {
                return Err(StoreError::InvalidName(format!(
                    "absolute path not allowed: {key}"
                )));
            }
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
        }
    }

    if !has_name {
        return Err(StoreError::InvalidName(format!(
            "object key names a directory: {key}"
        )));
    }
    Ok(())
}
