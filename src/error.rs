//! Request failure taxonomy
//!
//! Every way a file request can fail before a cache decision is made.

use hyper::StatusCode;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file '{}' is {size} bytes, limit is {limit}", .path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("path escapes the root directory: {0}")]
    PathTraversal(String),

    #[error("malformed request path: {0}")]
    BadPath(String),
}

impl ServeError {
    /// Map an I/O failure on `path` onto the taxonomy
    pub fn from_io(path: PathBuf, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Read { path, source }
        }
    }

    /// HTTP status reported to the client
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Read { .. } | Self::TooLarge { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PathTraversal(_) => StatusCode::FORBIDDEN,
            Self::BadPath(_) => StatusCode::BAD_REQUEST,
        }
    }
}
