use std::path::PathBuf;

use thiserror::Error;

use variants_sync::{ErrorKind, SyncError};

/// Error surface for the orchestrator, control plane and runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("config error: {0}")]
    Core(#[from] variants_core::CoreError),

    #[error("template error: {0}")]
    Codec(#[from] variants_codec::CodecError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown unit '{0}'")]
    UnitNotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },
}

impl DaemonError {
    /// Protocol-visible classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DaemonError::Sync(err) => err.kind(),
            DaemonError::UnitNotFound(_) => ErrorKind::NotFound,
            DaemonError::InvalidRequest(_) | DaemonError::Json(_) | DaemonError::Core(_) => {
                ErrorKind::Validation
            }
            _ => ErrorKind::Io,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn join_err(task: &'static str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task,
        message: err.to_string(),
    }
}
