//! Single-record JSON files, replaced atomically

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

/// Read a record, `None` if the file does not exist yet.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::StorageUnavailable(format!(
                "Failed to read {:?}: {}",
                path, e
            )))
        }
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| Error::StorageUnavailable(format!("Failed to parse {:?}: {}", path, e)))
}

/// Overwrite a record: write a temp file, sync it, rename over the target.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::StorageUnavailable(format!("Failed to serialize record: {}", e)))?;

    let temp_path = path.with_extension("json.tmp");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::StorageUnavailable(format!("Failed to create temp record: {}", e)))?;

    file.write_all(&json)
        .map_err(|e| Error::StorageUnavailable(format!("Failed to write record: {}", e)))?;
    file.sync_all()
        .map_err(|e| Error::StorageUnavailable(format!("Failed to sync record: {}", e)))?;

    std::fs::rename(&temp_path, path)
        .map_err(|e| Error::StorageUnavailable(format!("Failed to replace {:?}: {}", path, e)))
}
