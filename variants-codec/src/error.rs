//! Error types for variants-codec.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from rendering manifests or version stubs.
///
/// Parsing never fails; see [`crate::parser`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (string literal encoding).
    #[error("literal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
}
