//! File content loading
//!
//! Reads whole files and their metadata from disk. Nothing is retained
//! between requests.

use hyper::body::Bytes;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;

use crate::error::ServeError;

/// Bytes of one file, owned by a single request
#[derive(Debug, Clone)]
pub struct FileContent {
    pub bytes: Bytes,
    pub source_path: PathBuf,
    pub modified: Option<SystemTime>,
}

/// Modification time and length of a regular file
pub async fn stat_modified_time(path: &Path) -> Result<(SystemTime, u64), ServeError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| ServeError::from_io(path.to_path_buf(), e))?;
    if !metadata.is_file() {
        return Err(ServeError::NotFound(path.to_path_buf()));
    }
    let modified = metadata
        .modified()
        .map_err(|e| ServeError::from_io(path.to_path_buf(), e))?;
    Ok((modified, metadata.len()))
}

/// Read the entire file, refusing anything larger than `max_size` bytes
pub async fn load_bytes(path: &Path, max_size: u64) -> Result<FileContent, ServeError> {
    let metadata = fs::metadata(path)
        .await
        .map_err(|e| ServeError::from_io(path.to_path_buf(), e))?;
    if !metadata.is_file() {
        return Err(ServeError::NotFound(path.to_path_buf()));
    }
    if metadata.len() > max_size {
        return Err(ServeError::TooLarge {
            path: path.to_path_buf(),
            size: metadata.len(),
            limit: max_size,
        });
    }

    let bytes = fs::read(path)
        .await
        .map_err(|e| ServeError::from_io(path.to_path_buf(), e))?;

    Ok(FileContent {
        bytes: Bytes::from(bytes),
        source_path: path.to_path_buf(),
        modified: metadata.modified().ok(),
    })
}
