//! Structured mutations on a unit.
//!
//! Every operation validates its inputs before touching the filesystem,
//! performs all writes before any delete, and regenerates the manifest
//! afterwards.

use std::collections::BTreeMap;

use variants_codec::{context::StubContext, manifest};
use variants_core::{naming, Extension, VersionKey};

use crate::error::{io_err, SyncError};
use crate::unit::{parse_key, UnitManager};
use crate::writer::{atomic_write, create_new};

/// Acknowledgement of a completed mutation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Mutation {
    pub unit: String,
    pub version: VersionKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<VersionKey>,
    pub path: std::path::PathBuf,
}

impl UnitManager {
    /// Next key to allocate: one major above the highest, no minor part.
    pub fn next_version_key(&self) -> Result<VersionKey, SyncError> {
        let Some(highest) = self.version_files()?.iter().map(|f| f.key.major()).max() else {
            return Ok(VersionKey::new(1, None));
        };
        let next = highest.checked_add(1).ok_or_else(|| {
            SyncError::Conflict(format!(
                "unit '{}' has no major version left after v{highest}; pass an explicit key",
                self.name()
            ))
        })?;
        Ok(VersionKey::new(next, None))
    }

    fn resolve_target(&self, requested: Option<&str>) -> Result<VersionKey, SyncError> {
        let key = match requested {
            Some(raw) => parse_key(raw)?,
            None => self.next_version_key()?,
        };
        if self.key_exists(&key)? {
            return Err(SyncError::Conflict(format!(
                "unit '{}' already has version {key}",
                self.name()
            )));
        }
        Ok(key)
    }

    /// Most common extension among existing versions; ties go to the
    /// earlier extension in probe order.
    fn preferred_extension(&self) -> Result<Extension, SyncError> {
        let mut counts: BTreeMap<Extension, usize> = BTreeMap::new();
        for file in self.version_files()? {
            *counts.entry(file.extension).or_default() += 1;
        }
        let best = self
            .extensions()
            .iter()
            .copied()
            .max_by(|a, b| {
                let (ca, cb) = (counts.get(a).copied().unwrap_or(0), counts.get(b).copied().unwrap_or(0));
                // Reverse position so the earlier extension wins ties.
                ca.cmp(&cb).then_with(|| self.rank(*b).cmp(&self.rank(*a)))
            });
        Ok(best.unwrap_or(Extension::Tsx))
    }

    fn rank(&self, ext: Extension) -> usize {
        self.extensions()
            .iter()
            .position(|e| *e == ext)
            .unwrap_or(usize::MAX)
    }

    fn mutation(&self, version: VersionKey, previous: Option<VersionKey>, ext: Extension) -> Mutation {
        Mutation {
            unit: self.name().to_string(),
            version,
            previous,
            path: self
                .dir()
                .join(naming::version_file_name(self.name(), &version, ext)),
        }
    }

    /// Create a stub version file, allocating the key when `version` is `None`.
    pub fn new_version(&mut self, version: Option<&str>) -> Result<Mutation, SyncError> {
        self.ensure_live()?;
        let key = self.resolve_target(version)?;
        let ext = self.preferred_extension()?;
        let content = self
            .engine()
            .render_stub(&StubContext::new(self.name(), &key, ext), ext)?;
        let done = self.mutation(key, None, ext);
        create_new(&done.path, content.as_bytes())?;
        self.regenerate()?;
        tracing::info!(unit = %self.name(), key = %key, "created version");
        Ok(done)
    }

    /// Copy `source` byte-for-byte to `target` (allocated when `None`).
    pub fn duplicate_version(&mut self, source: &str, target: Option<&str>) -> Result<Mutation, SyncError> {
        self.ensure_live()?;
        let from = parse_key(source)?;
        let source = self.find_version(&from)?;
        let to = self.resolve_target(target)?;
        let bytes = std::fs::read(&source.path).map_err(|e| io_err(&source.path, e))?;
        let done = self.mutation(to, Some(from), source.extension);
        create_new(&done.path, &bytes)?;
        self.regenerate()?;
        tracing::info!(unit = %self.name(), from = %from, to = %to, "duplicated version");
        Ok(done)
    }

    /// Delete a version file; the last remaining version cannot be deleted.
    pub fn delete_version(&mut self, version: &str) -> Result<Mutation, SyncError> {
        self.ensure_live()?;
        let key = parse_key(version)?;
        let file = self.find_version(&key)?;
        if self.version_files()?.len() <= 1 {
            return Err(SyncError::Conflict(format!(
                "cannot delete {key}: it is the only version of '{}'",
                self.name()
            )));
        }
        std::fs::remove_file(&file.path).map_err(|e| io_err(&file.path, e))?;
        self.regenerate()?;
        tracing::info!(unit = %self.name(), key = %key, "deleted version");
        Ok(Mutation {
            unit: self.name().to_string(),
            version: key,
            previous: None,
            path: file.path,
        })
    }

    /// Move `version` to `new_version`, rewriting its render reference.
    ///
    /// The new file is written before the old one is removed.
    pub fn rename_version(&mut self, version: &str, new_version: &str) -> Result<Mutation, SyncError> {
        self.ensure_live()?;
        let from = parse_key(version)?;
        let to = parse_key(new_version)?;
        if from == to {
            return Err(SyncError::Validation(format!(
                "{from} and {to} name the same version"
            )));
        }
        let source = self.find_version(&from)?;
        let to = self.resolve_target(Some(new_version))?;

        let text = std::fs::read_to_string(&source.path).map_err(|e| io_err(&source.path, e))?;
        let rewritten = naming::replace_identifier(
            &text,
            &naming::render_ref(self.name(), &from),
            &naming::render_ref(self.name(), &to),
        );
        let done = self.mutation(to, Some(from), source.extension);
        create_new(&done.path, rewritten.as_bytes())?;
        std::fs::remove_file(&source.path).map_err(|e| io_err(&source.path, e))?;

        self.register_transfer(to, from);
        self.regenerate()?;
        tracing::info!(unit = %self.name(), from = %from, to = %to, "renamed version");
        Ok(done)
    }

    /// Set the manifest label of `version` in place.
    ///
    /// Version files are untouched and no regeneration runs.
    pub fn rename_label(&mut self, version: &str, label: &str) -> Result<Mutation, SyncError> {
        self.ensure_live()?;
        let key = parse_key(version)?;
        let file = self.find_version(&key)?;
        let text = self.read_manifest()?.ok_or_else(|| {
            SyncError::NotFound(format!("{} does not exist", self.manifest_path().display()))
        })?;
        let raw_key = key.to_string();
        let Some(edited) = manifest::set_label(&text, &raw_key, label)? else {
            let computed = variants_codec::parse_document(&text)
                .and_then(|doc| doc.entry(&raw_key).map(|entry| entry.computed_label))
                .unwrap_or(false);
            return Err(if computed {
                SyncError::Validation(format!(
                    "label of {key} in '{}' is an expression; edit it by hand",
                    self.name()
                ))
            } else {
                SyncError::NotFound(format!(
                    "manifest of '{}' has no entry for {key}",
                    self.name()
                ))
            });
        };
        atomic_write(self.manifest_path(), &edited)?;
        tracing::info!(unit = %self.name(), key = %key, "relabelled version");
        Ok(Mutation {
            unit: self.name().to_string(),
            version: key,
            previous: None,
            path: file.path,
        })
    }
}
