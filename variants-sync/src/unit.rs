//! Per-unit synchronization state machine.
//!
//! A [`UnitManager`] owns one unit's directory. It discovers version files,
//! regenerates the manifest, and reconciles two kinds of outside change:
//!
//! - version files added/removed on disk ([`UnitManager::handle_file_rename`]),
//!   where a 1:1 swap is read as a rename and carries metadata forward;
//! - keys edited by hand in the manifest
//!   ([`UnitManager::handle_versions_key_change`]), where a 1:1 swap renames
//!   the backing file to match.
//!
//! Snapshots kept here are caches rebuilt from disk; nothing is persisted
//! beyond the files themselves.

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use variants_codec::{manifest, parser, PendingTransfers, TemplateEngine};
use variants_core::{naming, Extension, UnitName, Version, VersionKey};

use crate::discover::{self, VersionFile};
use crate::error::{io_err, SyncError};
use crate::timing::SUPPRESSION_WINDOW;
use crate::writer::{atomic_write, WriteResult};

/// Listing entry for one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
    pub name: UnitName,
    /// Manifest path.
    pub path: PathBuf,
    pub versions: Vec<VersionKey>,
}

/// Result of reconciling the version-file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReconcile {
    /// `(old, new)` when a rename was inferred.
    pub inferred: Option<(VersionKey, VersionKey)>,
    pub added: Vec<VersionKey>,
    pub removed: Vec<VersionKey>,
    pub write: WriteResult,
}

/// Result of reconciling the manifest's key set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyReconcile {
    /// Inside the suppression window of an earlier rename.
    Suppressed,
    /// The manifest is missing or does not parse; tracking left as is.
    Unparsed,
    /// Key set matches the snapshot.
    Unchanged,
    /// Keys changed without a clean 1:1 swap; only tracking was updated.
    Tracked {
        added: Vec<String>,
        removed: Vec<String>,
    },
    /// A hand-edited key drove a file rename.
    Renamed {
        from: VersionKey,
        to: VersionKey,
        write: WriteResult,
    },
}

pub struct UnitManager {
    name: UnitName,
    dir: PathBuf,
    manifest_path: PathBuf,
    extensions: Vec<Extension>,
    engine: Arc<TemplateEngine>,
    last_files: BTreeMap<PathBuf, VersionKey>,
    last_keys: BTreeSet<String>,
    transfers: PendingTransfers,
    suppress_until: Option<Instant>,
    /// Set once the unit stops existing (promoted or manifest removed).
    retired: bool,
}

impl std::fmt::Debug for UnitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitManager")
            .field("name", &self.name)
            .field("manifest_path", &self.manifest_path)
            .field("last_keys", &self.last_keys)
            .field("transfers", &self.transfers)
            .field("retired", &self.retired)
            .finish_non_exhaustive()
    }
}

pub(crate) fn parse_key(raw: &str) -> Result<VersionKey, SyncError> {
    Ok(raw.trim().parse::<VersionKey>()?)
}

impl UnitManager {
    /// Manager for the unit whose manifest lives at `manifest_path`.
    ///
    /// Nothing is read until [`UnitManager::regenerate`] or
    /// [`UnitManager::refresh_snapshot`] runs.
    pub fn new(
        manifest_path: impl Into<PathBuf>,
        extensions: Vec<Extension>,
        engine: Arc<TemplateEngine>,
    ) -> Result<Self, SyncError> {
        let manifest_path = manifest_path.into();
        let name = naming::manifest_unit(&manifest_path).ok_or_else(|| {
            SyncError::Validation(format!(
                "{} is not a manifest file (expected <Unit>{})",
                manifest_path.display(),
                naming::MANIFEST_SUFFIX
            ))
        })?;
        let dir = match manifest_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let extensions = if extensions.is_empty() {
            Extension::DEFAULT_PROBE_ORDER.to_vec()
        } else {
            extensions
        };
        Ok(Self {
            name,
            dir,
            manifest_path,
            extensions,
            engine,
            last_files: BTreeMap::new(),
            last_keys: BTreeSet::new(),
            transfers: PendingTransfers::new(),
            suppress_until: None,
            retired: false,
        })
    }

    /// Mark the unit as gone. Every later reconcile or mutation fails with
    /// `NotFound` and nothing is written again.
    pub fn retire(&mut self) {
        if !self.retired {
            tracing::debug!(unit = %self.name, "unit retired");
        }
        self.retired = true;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn ensure_live(&self) -> Result<(), SyncError> {
        if self.retired {
            return Err(SyncError::NotFound(format!(
                "unit '{}' no longer exists",
                self.name
            )));
        }
        Ok(())
    }

    pub fn name(&self) -> &UnitName {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub(crate) fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub fn pending_transfers(&self) -> &PendingTransfers {
        &self.transfers
    }

    /// Whether `path` is a version file of this unit.
    pub fn owns_version_file(&self, path: &Path) -> bool {
        path.parent() == Some(self.dir.as_path())
            && naming::version_file(path).is_some_and(|(unit, _, ext)| {
                unit == self.name && self.extensions.contains(&ext)
            })
    }

    /// Version files on disk, ascending by key.
    pub fn version_files(&self) -> Result<Vec<VersionFile>, SyncError> {
        discover::version_files(&self.dir, &self.name, &self.extensions)
    }

    /// Versions with the metadata currently preserved in the manifest.
    pub fn versions(&self) -> Result<Vec<Version>, SyncError> {
        let previous = manifest::canonical_metadata(&parser::parse(
            &self.read_manifest()?.unwrap_or_default(),
        ));
        let versions = self
            .version_files()?
            .into_iter()
            .map(|file| {
                let meta = previous.get(&file.key).cloned().unwrap_or_default();
                Version {
                    render_ref: naming::render_ref(&self.name, &file.key),
                    key: file.key,
                    path: file.path,
                    extension: file.extension,
                    label: meta.label.unwrap_or_default(),
                    description: meta.description,
                }
            })
            .collect();
        Ok(versions)
    }

    pub fn summary(&self) -> Result<UnitSummary, SyncError> {
        Ok(UnitSummary {
            name: self.name.clone(),
            path: self.manifest_path.clone(),
            versions: self.version_files()?.into_iter().map(|f| f.key).collect(),
        })
    }

    pub(crate) fn find_version(&self, key: &VersionKey) -> Result<VersionFile, SyncError> {
        self.version_files()?
            .into_iter()
            .find(|file| &file.key == key)
            .ok_or_else(|| SyncError::NotFound(format!("unit '{}' has no version {key}", self.name)))
    }

    /// Any file on disk for `key`, whatever its extension.
    pub(crate) fn key_exists(&self, key: &VersionKey) -> Result<bool, SyncError> {
        Ok(discover::all_version_files(&self.dir, &self.name)?
            .iter()
            .any(|file| &file.key == key))
    }

    pub(crate) fn read_manifest(&self) -> Result<Option<String>, SyncError> {
        match std::fs::read_to_string(&self.manifest_path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&self.manifest_path, err)),
        }
    }

    pub(crate) fn register_transfer(&mut self, new: VersionKey, old: VersionKey) {
        if new != old {
            self.transfers.insert(new, old);
        }
    }

    fn render(
        &self,
        files: &[VersionFile],
        transfers: &mut PendingTransfers,
    ) -> Result<String, SyncError> {
        let previous = parser::parse(&self.read_manifest()?.unwrap_or_default());
        let keys: Vec<VersionKey> = files.iter().map(|f| f.key).collect();
        Ok(manifest::render_manifest(
            &self.engine,
            &self.name,
            &keys,
            &previous,
            transfers,
        )?)
    }

    /// The manifest text a regeneration would write right now.
    pub fn render_current(&self) -> Result<String, SyncError> {
        let files = self.version_files()?;
        let mut transfers = self.transfers.clone();
        self.render(&files, &mut transfers)
    }

    /// Render the manifest from disk state and write it if it changed.
    ///
    /// The full text is rendered before anything is written. Pending
    /// transfers are consumed; any left unapplied are dropped.
    pub fn regenerate(&mut self) -> Result<WriteResult, SyncError> {
        self.ensure_live()?;
        let files = self.version_files()?;
        let mut transfers = std::mem::take(&mut self.transfers);
        let text = self.render(&files, &mut transfers)?;
        if !transfers.is_empty() {
            tracing::debug!(unit = %self.name, leftover = ?transfers, "dropping unapplied transfers");
        }

        let result = atomic_write(&self.manifest_path, &text)?;
        self.last_files = files.iter().map(|f| (f.path.clone(), f.key)).collect();
        self.last_keys = files.iter().map(|f| f.key.to_string()).collect();
        if result.is_written() {
            tracing::info!(unit = %self.name, versions = files.len(), "manifest regenerated");
        }
        Ok(result)
    }

    /// Rebuild the file and key snapshots from disk without writing.
    pub fn refresh_snapshot(&mut self) -> Result<(), SyncError> {
        self.last_files = self
            .version_files()?
            .into_iter()
            .map(|f| (f.path, f.key))
            .collect();
        if let Some(doc) = self.read_manifest()?.as_deref().and_then(parser::parse_document) {
            self.last_keys = doc.keys();
        }
        Ok(())
    }

    /// Reconcile after version files were added or removed on disk.
    ///
    /// Exactly one removal plus one addition is taken as a rename and the old
    /// key's metadata moves to the new key. Any other mix is treated as
    /// independent additions and removals.
    pub fn handle_file_rename(&mut self) -> Result<FileReconcile, SyncError> {
        self.ensure_live()?;
        let current: BTreeMap<PathBuf, VersionKey> = self
            .version_files()?
            .into_iter()
            .map(|f| (f.path, f.key))
            .collect();
        let removed: Vec<VersionKey> = self
            .last_files
            .iter()
            .filter(|(path, _)| !current.contains_key(*path))
            .map(|(_, key)| *key)
            .collect();
        let added: Vec<VersionKey> = current
            .iter()
            .filter(|(path, _)| !self.last_files.contains_key(*path))
            .map(|(_, key)| *key)
            .collect();

        let inferred = match (removed.as_slice(), added.as_slice()) {
            ([old], [new]) => {
                tracing::info!(unit = %self.name, from = %old, to = %new, "inferred version rename");
                self.register_transfer(*new, *old);
                Some((*old, *new))
            }
            ([], _) | (_, []) => None,
            _ => {
                tracing::warn!(
                    unit = %self.name,
                    added = added.len(),
                    removed = removed.len(),
                    "ambiguous file changes; not inferring a rename"
                );
                None
            }
        };

        let write = self.regenerate()?;
        Ok(FileReconcile {
            inferred,
            added,
            removed,
            write,
        })
    }

    /// Whether manifest key changes are currently ignored.
    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppress_until.is_some_and(|until| now < until)
    }

    /// Reconcile after the manifest changed in place.
    ///
    /// A 1:1 key swap whose old key has a file on disk (and whose new key has
    /// none) renames that file, regenerates, and opens the suppression window
    /// starting at `now`.
    pub fn handle_versions_key_change(&mut self, now: Instant) -> Result<KeyReconcile, SyncError> {
        self.ensure_live()?;
        if self.is_suppressed(now) {
            tracing::debug!(unit = %self.name, "manifest change suppressed");
            return Ok(KeyReconcile::Suppressed);
        }
        let Some(doc) = self.read_manifest()?.as_deref().and_then(parser::parse_document) else {
            tracing::debug!(unit = %self.name, "manifest missing or unparsable");
            return Ok(KeyReconcile::Unparsed);
        };

        let keys = doc.keys();
        let removed: Vec<String> = self.last_keys.difference(&keys).cloned().collect();
        let added: Vec<String> = keys.difference(&self.last_keys).cloned().collect();
        if removed.is_empty() && added.is_empty() {
            return Ok(KeyReconcile::Unchanged);
        }

        if let ([old], [new]) = (removed.as_slice(), added.as_slice()) {
            if let Some((from, to)) = self.rename_for_key_swap(old, new)? {
                let write = self.regenerate()?;
                self.suppress_until = Some(now + SUPPRESSION_WINDOW);
                return Ok(KeyReconcile::Renamed { from, to, write });
            }
        }

        self.last_keys = keys;
        Ok(KeyReconcile::Tracked { added, removed })
    }

    fn rename_for_key_swap(
        &mut self,
        old: &str,
        new: &str,
    ) -> Result<Option<(VersionKey, VersionKey)>, SyncError> {
        let (Ok(from), Ok(to)) = (old.parse::<VersionKey>(), new.parse::<VersionKey>()) else {
            return Ok(None);
        };
        let Some(source) = self.version_files()?.into_iter().find(|f| f.key == from) else {
            return Ok(None);
        };
        if from == to {
            return Ok(None);
        }
        if self.key_exists(&to)? {
            tracing::warn!(unit = %self.name, key = %to, "manifest key renamed onto an existing file");
            return Ok(None);
        }

        let target = self
            .dir
            .join(naming::version_file_name(&self.name, &to, source.extension));
        std::fs::rename(&source.path, &target).map_err(|e| io_err(&source.path, e))?;
        tracing::info!(unit = %self.name, from = %from, to = %to, "renamed version file to match manifest");
        Ok(Some((from, to)))
    }
}
