//! Promotion: collapse a unit back into one non-versioned file.

use std::path::PathBuf;

use serde::Serialize;

use variants_core::naming;

use crate::discover;
use crate::error::{io_err, SyncError};
use crate::unit::{parse_key, UnitManager};
use crate::writer::atomic_write;

/// What a promotion wrote and removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromoteReport {
    pub unit: String,
    pub version: String,
    /// The base file now holding the promoted implementation.
    pub base_file: PathBuf,
    pub removed: Vec<PathBuf>,
}

impl UnitManager {
    /// Promote `version` to the unit's base file and delete every version
    /// file, the manifest and any scaffolding.
    ///
    /// The base file is written before anything is deleted. On success the
    /// manager is retired, so a reconcile queued behind the promotion cannot
    /// write the manifest back.
    pub fn promote(&mut self, version: &str) -> Result<PromoteReport, SyncError> {
        self.ensure_live()?;
        let key = parse_key(version)?;
        let source = self.find_version(&key)?;
        let text = std::fs::read_to_string(&source.path).map_err(|e| io_err(&source.path, e))?;
        let promoted = naming::replace_identifier(
            &text,
            &naming::render_ref(self.name(), &key),
            naming::base_identifier(self.name()),
        );

        let base_file = self
            .dir()
            .join(naming::base_file_name(self.name(), source.extension));
        let mut doomed: Vec<PathBuf> = discover::all_version_files(self.dir(), self.name())?
            .into_iter()
            .map(|file| file.path)
            .collect();
        doomed.extend(
            discover::scaffolding_files(self.dir(), self.name())?
                .into_iter()
                .filter(|path| path != &base_file),
        );
        if self.manifest_path().exists() {
            doomed.push(self.manifest_path().to_path_buf());
        }

        atomic_write(&base_file, &promoted)?;
        self.retire();

        let mut removed = Vec::with_capacity(doomed.len());
        for path in doomed {
            match std::fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(io_err(&path, err)),
            }
        }

        tracing::info!(
            unit = %self.name(),
            key = %key,
            base = %base_file.display(),
            removed = removed.len(),
            "promoted version"
        );
        Ok(PromoteReport {
            unit: self.name().to_string(),
            version: key.to_string(),
            base_file,
            removed,
        })
    }
}
