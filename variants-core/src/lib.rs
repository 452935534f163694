//! variants core library — domain types, naming conventions, configuration, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs
//! - [`naming`] — file-name conventions for version, manifest and scaffolding files
//! - [`config`] — optional `variants.yaml` project configuration
//! - [`error`] — [`CoreError`]

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

pub use config::Config;
pub use error::CoreError;
pub use types::{Extension, UnitName, Version, VersionKey, VersionMetadata};
