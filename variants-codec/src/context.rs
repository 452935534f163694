//! Template contexts — serializable rendering payloads for the manifest and
//! version-file stubs.

use serde::Serialize;

use variants_core::{naming, Extension, UnitName, VersionKey, VersionMetadata};

use crate::error::CodecError;

/// Rendering payload for `<Unit>.manifest.ts`.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestContext {
    pub unit: String,
    pub entries: Vec<EntryCtx>,
}

/// One `"<key>": { … }` entry. `label` and `description` hold ready-to-emit
/// string literals.
#[derive(Debug, Clone, Serialize)]
pub struct EntryCtx {
    pub key: String,
    pub render_ref: String,
    pub import_path: String,
    pub label: String,
    pub description: Option<String>,
}

impl EntryCtx {
    pub fn new(
        unit: &UnitName,
        key: &VersionKey,
        metadata: &VersionMetadata,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            key: key.to_string(),
            render_ref: naming::render_ref(unit, key),
            import_path: naming::import_specifier(unit, key),
            label: string_literal(metadata.label.as_deref().unwrap_or_default())?,
            description: metadata
                .description
                .as_deref()
                .map(string_literal)
                .transpose()?,
        })
    }
}

/// Rendering payload for a fresh version file.
#[derive(Debug, Clone, Serialize)]
pub struct StubContext {
    pub unit: String,
    pub key: String,
    pub render_ref: String,
    pub extension: String,
}

impl StubContext {
    pub fn new(unit: &UnitName, key: &VersionKey, extension: Extension) -> Self {
        Self {
            unit: unit.to_string(),
            key: key.to_string(),
            render_ref: naming::render_ref(unit, key),
            extension: extension.to_string(),
        }
    }
}

pub(crate) fn to_tera_context<T: Serialize>(ctx: &T) -> Result<tera::Context, CodecError> {
    Ok(tera::Context::from_serialize(ctx)?)
}

/// Encode `value` as a double-quoted JavaScript string literal.
pub fn string_literal(value: &str) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}
