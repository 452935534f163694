//! Filesystem discovery of units and their version files.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use variants_core::{naming, Config, Extension, UnitName, VersionKey};

use crate::error::{io_err, SyncError};

/// A version file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionFile {
    pub key: VersionKey,
    pub path: PathBuf,
    pub extension: Extension,
}

fn file_names(dir: &Path) -> Result<Vec<(String, PathBuf)>, SyncError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(dir, err)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
        if !ty.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push((name.to_string(), entry.path()));
        }
    }
    names.sort();
    Ok(names)
}

/// Every version file of `unit` in `dir`, one per key.
///
/// Only extensions listed in `probe_order` are recognized. When several files
/// share a key, the extension earliest in `probe_order` wins.
pub fn version_files(
    dir: &Path,
    unit: &UnitName,
    probe_order: &[Extension],
) -> Result<Vec<VersionFile>, SyncError> {
    let mut by_key: BTreeMap<VersionKey, (usize, VersionFile)> = BTreeMap::new();
    for file in all_version_files(dir, unit)? {
        let Some(rank) = probe_order.iter().position(|ext| *ext == file.extension) else {
            continue;
        };
        match by_key.get(&file.key) {
            Some((existing, kept)) => {
                tracing::warn!(
                    unit = %unit,
                    key = %file.key,
                    kept = %kept.path.display(),
                    other = %file.path.display(),
                    "several files for one version key"
                );
                if rank < *existing {
                    by_key.insert(file.key, (rank, file));
                }
            }
            None => {
                by_key.insert(file.key, (rank, file));
            }
        }
    }
    Ok(by_key.into_values().map(|(_, file)| file).collect())
}

/// Every file in `dir` named like a version of `unit`, regardless of
/// extension preference or key collisions.
pub fn all_version_files(dir: &Path, unit: &UnitName) -> Result<Vec<VersionFile>, SyncError> {
    let mut files = Vec::new();
    for (name, path) in file_names(dir)? {
        if let Some((owner, key, extension)) = naming::parse_version_file_name(&name) {
            if &owner == unit {
                files.push(VersionFile { key, path, extension });
            }
        } else if naming::rejected_version_file_name(&name).as_ref() == Some(unit) {
            tracing::warn!(
                unit = %unit,
                path = %path.display(),
                "ignoring version file with a zero-padded or out-of-range key"
            );
        }
    }
    Ok(files)
}

/// Switcher files and base files of `unit` in `dir`.
pub fn scaffolding_files(dir: &Path, unit: &UnitName) -> Result<Vec<PathBuf>, SyncError> {
    let mut found = Vec::new();
    for ext in Extension::DEFAULT_PROBE_ORDER {
        for name in [
            naming::switcher_file_name(unit, ext),
            naming::base_file_name(unit, ext),
        ] {
            let path = dir.join(name);
            if path.is_file() {
                found.push(path);
            }
        }
    }
    Ok(found)
}

/// Manifest files under `root`, skipping hidden and ignored directories.
pub fn manifest_files(root: &Path, config: &Config) -> Result<Vec<PathBuf>, SyncError> {
    let mut manifests = Vec::new();
    let mut dirs = vec![root.to_path_buf()];
    let mut cursor = 0;
    while cursor < dirs.len() {
        let current = dirs[cursor].clone();
        cursor += 1;
        let entries = match fs::read_dir(&current) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(io_err(&current, err)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&current, e))?;
            let ty = entry.file_type().map_err(|e| io_err(entry.path(), e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if ty.is_dir() {
                if !config.is_ignored_dir(name) {
                    dirs.push(entry.path());
                }
            } else if ty.is_file() && naming::parse_manifest_file_name(name).is_some() {
                manifests.push(entry.path());
            }
        }
    }
    manifests.sort();
    Ok(manifests)
}

/// Whether `path` lies under an ignored directory relative to `root`.
pub fn is_ignored_path(root: &Path, path: &Path, config: &Config) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };
    let mut components: Vec<_> = relative.components().collect();
    components.pop();
    components.iter().any(|component| {
        component
            .as_os_str()
            .to_str()
            .map(|name| config.is_ignored_dir(name))
            .unwrap_or(true)
    })
}
