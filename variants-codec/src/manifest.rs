//! Manifest rendering and in-place label edits.

use std::collections::BTreeMap;

use variants_core::{UnitName, VersionKey, VersionMetadata};

use crate::context::{string_literal, EntryCtx, ManifestContext};
use crate::engine::TemplateEngine;
use crate::error::CodecError;
use crate::parser::{self, MetadataMap};

/// One-shot rename transfers, `new key → old key`.
pub type PendingTransfers = BTreeMap<VersionKey, VersionKey>;

/// Previous metadata re-keyed by canonical [`VersionKey`]; raw keys that are
/// not valid version keys are dropped. `"v01"` and `"v1"` collapse to the
/// same key, the later entry winning.
pub fn canonical_metadata(previous: &MetadataMap) -> BTreeMap<VersionKey, VersionMetadata> {
    previous
        .iter()
        .filter_map(|(raw, meta)| raw.parse::<VersionKey>().ok().map(|key| (key, meta.clone())))
        .collect()
}

/// Render the manifest for `unit` declaring `keys` in ascending order.
///
/// Metadata comes from `previous` by key. A transfer targeting a key takes
/// the metadata of its source key instead and is removed from `transfers`
/// once applied. A transfer whose source has no previous metadata leaves the
/// target's own metadata in place and is still consumed.
pub fn render_manifest(
    engine: &TemplateEngine,
    unit: &UnitName,
    keys: &[VersionKey],
    previous: &MetadataMap,
    transfers: &mut PendingTransfers,
) -> Result<String, CodecError> {
    let previous = canonical_metadata(previous);
    let mut sorted = keys.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut entries = Vec::with_capacity(sorted.len());
    for key in &sorted {
        let own = previous.get(key);
        let metadata = match transfers.remove(key) {
            Some(source) => previous.get(&source).or(own),
            None => own,
        };
        let metadata = metadata.cloned().unwrap_or_default();
        entries.push(EntryCtx::new(unit, key, &metadata)?);
    }

    engine.render_manifest(&ManifestContext {
        unit: unit.to_string(),
        entries,
    })
}

/// Replace the `label` of `key` in manifest `text`, touching nothing else.
///
/// Inserts a `label` field at the top of the entry body when the entry has
/// none. Returns `None` when the manifest does not parse, has no entry for
/// `key`, or computes the entry's label from an expression.
pub fn set_label(text: &str, key: &str, label: &str) -> Result<Option<String>, CodecError> {
    let Some(doc) = parser::parse_document(text) else {
        return Ok(None);
    };
    let Some(entry) = doc.entry(key).filter(|entry| !entry.computed_label) else {
        return Ok(None);
    };
    let literal = string_literal(label)?;

    let mut out = String::with_capacity(text.len() + literal.len());
    match &entry.label {
        Some(field) => {
            out.push_str(&text[..field.span.start]);
            out.push_str(&literal);
            out.push_str(&text[field.span.end..]);
        }
        None => {
            let open = entry.body.start + 1;
            out.push_str(&text[..open]);
            out.push_str(" label: ");
            out.push_str(&literal);
            out.push(',');
            out.push_str(&text[open..]);
        }
    }
    Ok(Some(out))
}
