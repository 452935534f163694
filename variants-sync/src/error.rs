//! Error types for variants-sync.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use variants_codec::CodecError;
use variants_core::CoreError;

/// All errors that can arise from unit synchronization and mutations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Malformed input: bad version key, bad unit name, missing argument.
    #[error("{0}")]
    Validation(String),

    /// Unknown unit or missing version file.
    #[error("{0}")]
    NotFound(String),

    /// Target already exists, or the operation would delete the last version.
    #[error("{0}")]
    Conflict(String),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest or stub rendering failed.
    #[error("render error: {0}")]
    Codec(#[from] CodecError),
}

/// Protocol-visible error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Io,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Conflict(_) => ErrorKind::Conflict,
            SyncError::Io { .. } | SyncError::Codec(_) => ErrorKind::Io,
        }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io { path, source } => SyncError::Io { path, source },
            other => SyncError::Validation(other.to_string()),
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
