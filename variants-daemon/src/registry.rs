//! Unit registry shared by the watcher dispatch path and the control plane.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use variants_core::{naming, Extension, UnitName};
use variants_sync::{SyncError, UnitManager, UnitSummary};

use crate::error::{join_err, DaemonError};

/// One unit behind its own lock; every operation on a unit holds it.
pub type SharedUnit = Arc<Mutex<UnitManager>>;

/// Run blocking unit work on the blocking pool while holding the unit lock.
pub async fn run_locked<T, F>(unit: &SharedUnit, work: F) -> Result<T, DaemonError>
where
    T: Send + 'static,
    F: FnOnce(&mut UnitManager) -> Result<T, SyncError> + Send + 'static,
{
    let mut guard = unit.clone().lock_owned().await;
    let result = tokio::task::spawn_blocking(move || work(&mut *guard))
        .await
        .map_err(|err| join_err("unit", err))?;
    Ok(result?)
}

/// Registry entry: the shared manager plus the immutable facts needed to
/// route events without taking the unit lock.
#[derive(Clone)]
struct Entry {
    manifest_path: PathBuf,
    extensions: Vec<Extension>,
    unit: SharedUnit,
}

/// Registered units, keyed by name.
#[derive(Clone, Default)]
pub struct Registry {
    units: Arc<RwLock<BTreeMap<UnitName, Entry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `manager`. Returns `None` (and keeps the existing unit) when
    /// another directory already registered the same name.
    pub async fn insert(&self, manager: UnitManager) -> Option<SharedUnit> {
        let name = manager.name().clone();
        let mut units = self.units.write().await;
        if let Some(existing) = units.get(&name) {
            if existing.manifest_path != manager.manifest_path() {
                tracing::warn!(
                    unit = %name,
                    kept = %existing.manifest_path.display(),
                    skipped = %manager.manifest_path().display(),
                    "duplicate unit name; ignoring second manifest"
                );
                return None;
            }
        }
        let entry = Entry {
            manifest_path: manager.manifest_path().to_path_buf(),
            extensions: manager.extensions().to_vec(),
            unit: Arc::new(Mutex::new(manager)),
        };
        let shared = entry.unit.clone();
        units.insert(name, entry);
        Some(shared)
    }

    /// Remove `name` only while it still maps to `unit`; a unit registered
    /// again under the same name in the meantime is kept.
    pub async fn remove_unit(&self, name: &UnitName, unit: &SharedUnit) -> bool {
        let mut units = self.units.write().await;
        match units.get(name) {
            Some(entry) if Arc::ptr_eq(&entry.unit, unit) => {
                units.remove(name);
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, name: &UnitName) -> Option<SharedUnit> {
        self.units.read().await.get(name).map(|entry| entry.unit.clone())
    }

    /// Like [`Registry::get`] but as a control-plane error.
    pub async fn require(&self, raw: &str) -> Result<SharedUnit, DaemonError> {
        let name = naming::unit_name(raw.trim())?;
        self.get(&name)
            .await
            .ok_or_else(|| DaemonError::UnitNotFound(name.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.units.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.units.read().await.is_empty()
    }

    pub async fn names(&self) -> Vec<UnitName> {
        self.units.read().await.keys().cloned().collect()
    }

    /// Name of the registered unit whose manifest is exactly `path`.
    pub async fn by_manifest(&self, path: &Path) -> Option<UnitName> {
        let name = naming::manifest_unit(path)?;
        let units = self.units.read().await;
        let entry = units.get(&name)?;
        (entry.manifest_path == path).then_some(name)
    }

    /// Name of the registered unit owning version file `path`.
    pub async fn by_version_file(&self, path: &Path) -> Option<UnitName> {
        let (name, _, ext) = naming::version_file(path)?;
        let units = self.units.read().await;
        let entry = units.get(&name)?;
        let same_dir = path.parent() == entry.manifest_path.parent();
        (same_dir && entry.extensions.contains(&ext)).then_some(name)
    }

    /// Summaries of every live unit, sorted by name.
    pub async fn snapshot(&self) -> Result<Vec<UnitSummary>, DaemonError> {
        let units: Vec<SharedUnit> = self
            .units
            .read()
            .await
            .values()
            .map(|entry| entry.unit.clone())
            .collect();
        let mut summaries = Vec::with_capacity(units.len());
        for unit in units {
            let summary = run_locked(&unit, |manager| {
                if manager.is_retired() {
                    return Ok(None);
                }
                manager.summary().map(Some)
            })
            .await?;
            summaries.extend(summary);
        }
        Ok(summaries)
    }
}
