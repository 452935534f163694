//! Manifest codec: a tolerant parser for hand-edited manifests and a
//! deterministic tera renderer.
//!
//! - [`parser`] reads preserved `label`/`description` metadata back
//! - [`manifest`] renders a unit's manifest and edits labels in place
//! - [`engine`] owns the embedded templates plus user overrides

pub mod context;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod parser;

pub use engine::TemplateEngine;
pub use error::CodecError;
pub use manifest::{render_manifest, set_label, PendingTransfers};
pub use parser::{parse, parse_document, parse_keys, ManifestDocument, MetadataMap};
