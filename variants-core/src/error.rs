//! Error types for variants-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from parsing domain values or loading configuration.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A version key did not match `v<major>[_<minor>]`.
    #[error("invalid version key '{0}': expected v<major>[_<minor>]")]
    InvalidVersionKey(String),

    /// A unit name cannot be used to derive file names and identifiers.
    #[error("invalid unit name '{0}': expected an identifier without dots or path separators")]
    InvalidUnitName(String),

    /// A file extension outside the supported set.
    #[error("unsupported extension '{0}'; expected one of tsx, ts, jsx, js")]
    InvalidExtension(String),

    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on config load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config parsed but describes an unusable setup.
    #[error("invalid config at {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
