//! File-name and identifier conventions.
//!
//! ```text
//! <dir>/
//!   Widget.manifest.ts      generated manifest (one per unit)
//!   Widget.v1.tsx           version files: <Unit>.v<major>[_<minor>].<ext>
//!   Widget.v1_2.tsx
//!   Widget.switcher.tsx     optional scaffolding, removed on promotion
//! ```
//!
//! Pure string functions; nothing here touches the filesystem.

use std::path::Path;

use crate::error::CoreError;
use crate::types::{Extension, UnitName, VersionKey};

pub const MANIFEST_SUFFIX: &str = ".manifest.ts";
pub const SWITCHER_INFIX: &str = "switcher";

/// `true` when `name` can be used both as a file-name prefix and as the stem
/// of a JavaScript identifier.
pub fn is_valid_unit_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(is_identifier_char)
}

/// Parse and validate a unit name.
pub fn unit_name(raw: &str) -> Result<UnitName, CoreError> {
    if is_valid_unit_name(raw) {
        Ok(UnitName::from(raw))
    } else {
        Err(CoreError::InvalidUnitName(raw.to_string()))
    }
}

/// `Widget` → `Widget.manifest.ts`
pub fn manifest_file_name(unit: &UnitName) -> String {
    format!("{}{MANIFEST_SUFFIX}", unit.0)
}

/// `Widget.manifest.ts` → `Widget`
pub fn parse_manifest_file_name(file_name: &str) -> Option<UnitName> {
    let stem = file_name.strip_suffix(MANIFEST_SUFFIX)?;
    is_valid_unit_name(stem).then(|| UnitName::from(stem))
}

/// Unit owning the manifest at `path`, if `path` names a manifest file.
pub fn manifest_unit(path: &Path) -> Option<UnitName> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(parse_manifest_file_name)
}

/// `(Widget, v1_2, tsx)` → `Widget.v1_2.tsx`
pub fn version_file_name(unit: &UnitName, key: &VersionKey, ext: Extension) -> String {
    format!("{}.{key}.{ext}", unit.0)
}

fn split_version_file_name(file_name: &str) -> Option<(&str, &str, Extension)> {
    let (rest, ext) = file_name.rsplit_once('.')?;
    let ext: Extension = ext.parse().ok()?;
    let (unit, key) = rest.rsplit_once('.')?;
    is_valid_unit_name(unit).then_some((unit, key, ext))
}

fn is_key_shaped(raw: &str) -> bool {
    let Some(rest) = raw.strip_prefix('v') else {
        return false;
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    match rest.split_once('_') {
        Some((major, minor)) => digits(major) && digits(minor),
        None => digits(rest),
    }
}

/// `Widget.v1_2.tsx` → `(Widget, v1_2, tsx)`
///
/// Only canonical keys are accepted: `Widget.v01.tsx` is not a version file,
/// because the manifest would import it as `./Widget.v1`.
pub fn parse_version_file_name(file_name: &str) -> Option<(UnitName, VersionKey, Extension)> {
    let (unit, raw_key, ext) = split_version_file_name(file_name)?;
    let key: VersionKey = raw_key.parse().ok()?;
    (key.to_string() == raw_key).then(|| (UnitName::from(unit), key, ext))
}

/// Unit of a file named like a version file whose key is zero-padded or too
/// large to represent, e.g. `Widget.v01.tsx`.
pub fn rejected_version_file_name(file_name: &str) -> Option<UnitName> {
    let (unit, raw_key, _) = split_version_file_name(file_name)?;
    (is_key_shaped(raw_key) && parse_version_file_name(file_name).is_none())
        .then(|| UnitName::from(unit))
}

/// Version-file triple for `path`, if `path` names a version file.
pub fn version_file(path: &Path) -> Option<(UnitName, VersionKey, Extension)> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(parse_version_file_name)
}

/// Module specifier used by the manifest's import section: `./Widget.v1_2`.
pub fn import_specifier(unit: &UnitName, key: &VersionKey) -> String {
    format!("./{}.{key}", unit.0)
}

/// Render-reference identifier: `(Widget, v1_2)` → `WidgetV1_2`.
pub fn render_ref(unit: &UnitName, key: &VersionKey) -> String {
    format!("{}V{}", unit.0, key.file_version())
}

/// Identifier the unit had before it was versioned.
pub fn base_identifier(unit: &UnitName) -> &str {
    unit.as_str()
}

/// `(Widget, tsx)` → `Widget.tsx`
pub fn base_file_name(unit: &UnitName, ext: Extension) -> String {
    format!("{}.{ext}", unit.0)
}

/// `(Widget, tsx)` → `Widget.switcher.tsx`
pub fn switcher_file_name(unit: &UnitName, ext: Extension) -> String {
    format!("{}.{SWITCHER_INFIX}.{ext}", unit.0)
}

/// Replace every whole-identifier occurrence of `from` in `text` with `to`.
///
/// `WidgetV1` is replaced inside `WidgetV1()` and `<WidgetV1 />` but not
/// inside `WidgetV1_2` or `MyWidgetV1`.
pub fn replace_identifier(text: &str, from: &str, to: &str) -> String {
    if from.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut prev: Option<char> = None;
    while let Some(idx) = rest.find(from) {
        let before = rest[..idx].chars().next_back().or(prev);
        let after = rest[idx + from.len()..].chars().next();
        let bounded = !before.is_some_and(is_identifier_char)
            && !after.is_some_and(is_identifier_char);
        out.push_str(&rest[..idx]);
        if bounded {
            out.push_str(to);
        } else {
            out.push_str(from);
        }
        prev = from.chars().next_back();
        rest = &rest[idx + from.len()..];
    }
    out.push_str(rest);
    out
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
