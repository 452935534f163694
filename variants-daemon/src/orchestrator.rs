//! Synchronization orchestrator.
//!
//! Owns the [`Registry`], turns watcher events into debounced unit
//! reconciliations, executes control-plane commands, and broadcasts the
//! resulting state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use variants_codec::TemplateEngine;
use variants_core::{naming, Config, UnitName, VersionKey};
use variants_sync::{discover, FileReconcile, KeyReconcile, SyncError, UnitManager};

use crate::debounce::Debouncer;
use crate::error::{join_err, DaemonError};
use crate::open::{resolve_tool, EditorPreferences, Launcher};
use crate::protocol::{
    ChangeReason, Command, OpenRequest, OpenResponse, ServerMessage, UnitChanged, UnitEntry,
    UnitsSnapshot,
};
use crate::registry::{run_locked, Registry};

/// Capacity of the push-channel fan-out buffer.
const BROADCAST_CAPACITY: usize = 256;

/// Which reconciliation a debounced event asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reconcile {
    /// Version files changed on disk.
    Files,
    /// The manifest changed in place.
    Manifest,
}

pub type DispatchKey = (UnitName, Reconcile);

pub struct Orchestrator {
    root: PathBuf,
    config: Config,
    engine: Arc<TemplateEngine>,
    registry: Registry,
    events: broadcast::Sender<ServerMessage>,
}

impl Orchestrator {
    /// Build an orchestrator for `root`; nothing is scanned until
    /// [`Orchestrator::discover`].
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Result<Self, DaemonError> {
        let root = root.into();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        let engine = TemplateEngine::new(config.templates_dir_at(&root).as_deref())?;
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);
        Ok(Self {
            root,
            config,
            engine: Arc::new(engine),
            registry: Registry::new(),
            events,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    fn manager_for(&self, manifest_path: &Path) -> Result<UnitManager, DaemonError> {
        Ok(UnitManager::new(
            manifest_path,
            self.config.extensions.clone(),
            self.engine.clone(),
        )?)
    }

    /// Register and regenerate every unit under the root.
    pub async fn discover(&self) -> Result<usize, DaemonError> {
        let root = self.root.clone();
        let config = self.config.clone();
        let manifests = tokio::task::spawn_blocking(move || discover::manifest_files(&root, &config))
            .await
            .map_err(|err| join_err("discovery", err))??;

        let mut count = 0;
        for manifest in manifests {
            if self.register(&manifest).await?.is_some() {
                count += 1;
            }
        }
        tracing::info!(root = %self.root.display(), units = count, "discovered units");
        Ok(count)
    }

    /// Create, regenerate and register the unit for `manifest_path`.
    async fn register(&self, manifest_path: &Path) -> Result<Option<UnitName>, DaemonError> {
        let manager = self.manager_for(manifest_path)?;
        let name = manager.name().clone();
        let Some(unit) = self.registry.insert(manager).await else {
            return Ok(None);
        };
        run_locked(&unit, |manager| {
            manager.regenerate()?;
            manager.refresh_snapshot()
        })
        .await?;
        Ok(Some(name))
    }

    /// Push the full snapshot plus a change notice for `unit`.
    pub async fn broadcast(&self, unit: &UnitName, reason: ChangeReason) {
        match self.snapshot().await {
            Ok(snapshot) => {
                let _ = self.events.send(ServerMessage::UnitsSnapshot(snapshot));
            }
            Err(err) => tracing::warn!(error = %err, "failed to build units snapshot"),
        }
        let _ = self.events.send(ServerMessage::UnitChanged(UnitChanged {
            unit: unit.to_string(),
            reason,
        }));
    }

    pub async fn snapshot(&self) -> Result<UnitsSnapshot, DaemonError> {
        Ok(UnitsSnapshot {
            units: self
                .registry
                .snapshot()
                .await?
                .into_iter()
                .map(UnitEntry::from)
                .collect(),
        })
    }

    // -----------------------------------------------------------------------
    // Watcher dispatch
    // -----------------------------------------------------------------------

    /// Route one watcher event. Manifest additions and removals are handled
    /// immediately; everything else is debounced per unit.
    pub async fn handle_event(&self, event: Event, debouncer: &mut Debouncer<DispatchKey>) {
        if !is_relevant_event_kind(&event.kind) {
            return;
        }
        for path in event.paths {
            if let Err(err) = self.handle_path(&path, debouncer).await {
                tracing::error!(path = %path.display(), error = %err, "event dispatch failed");
            }
        }
    }

    async fn handle_path(
        &self,
        path: &Path,
        debouncer: &mut Debouncer<DispatchKey>,
    ) -> Result<(), DaemonError> {
        if discover::is_ignored_path(&self.root, path, &self.config) {
            return Ok(());
        }

        if let Some(name) = naming::manifest_unit(path) {
            let registered = self.registry.by_manifest(path).await;
            match (registered, path.is_file()) {
                (Some(name), true) => debouncer.schedule((name, Reconcile::Manifest)),
                (Some(name), false) => {
                    debouncer.cancel(&(name.clone(), Reconcile::Manifest));
                    debouncer.cancel(&(name.clone(), Reconcile::Files));
                    let Some(unit) = self.registry.get(&name).await else {
                        return Ok(());
                    };
                    run_locked(&unit, |m| {
                        m.retire();
                        Ok(())
                    })
                    .await?;
                    if self.registry.remove_unit(&name, &unit).await {
                        tracing::info!(unit = %name, "manifest removed; unit unregistered");
                        self.broadcast(&name, ChangeReason::Removed).await;
                    }
                }
                (None, true) => {
                    if let Some(name) = self.register(path).await? {
                        tracing::info!(unit = %name, path = %path.display(), "new unit");
                        self.broadcast(&name, ChangeReason::Created).await;
                    }
                }
                (None, false) => {
                    tracing::debug!(unit = %name, "ignoring removal of unregistered manifest");
                }
            }
            return Ok(());
        }

        if let Some(name) = self.registry.by_version_file(path).await {
            debouncer.schedule((name, Reconcile::Files));
        }
        Ok(())
    }

    /// Run a fired debounce timer. A unit retired while the timer waited
    /// for its lock is left alone.
    pub async fn reconcile(&self, key: DispatchKey) -> Result<(), DaemonError> {
        let (name, kind) = key;
        let Some(unit) = self.registry.get(&name).await else {
            return Ok(());
        };
        let changed = match kind {
            Reconcile::Files => {
                run_locked(&unit, |m| {
                    if m.is_retired() {
                        return Ok(false);
                    }
                    let outcome: FileReconcile = m.handle_file_rename()?;
                    Ok(outcome.write.is_written()
                        || !outcome.added.is_empty()
                        || !outcome.removed.is_empty())
                })
                .await?
            }
            Reconcile::Manifest => {
                let now = tokio::time::Instant::now().into_std();
                let outcome = run_locked(&unit, move |m| {
                    if m.is_retired() {
                        return Ok(None);
                    }
                    m.handle_versions_key_change(now).map(Some)
                })
                .await?;
                tracing::debug!(unit = %name, outcome = ?outcome, "manifest reconciled");
                matches!(
                    outcome,
                    Some(KeyReconcile::Renamed { .. } | KeyReconcile::Tracked { .. })
                )
            }
        };
        if changed {
            self.broadcast(&name, ChangeReason::Updated).await;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Control plane
    // -----------------------------------------------------------------------

    /// Execute a mutation command and broadcast the result.
    pub async fn execute(&self, command: Command) -> Result<Value, DaemonError> {
        let name = naming::unit_name(command.unit().trim())?;
        let unit = self.registry.require(name.as_str()).await?;
        let command_name = command.name();

        let result = match command {
            Command::NewVersion { version, .. } => {
                let done = run_locked(&unit, move |m| m.new_version(version.as_deref())).await?;
                serde_json::to_value(done)?
            }
            Command::DuplicateVersion {
                version,
                new_version,
                ..
            } => {
                let done = run_locked(&unit, move |m| {
                    m.duplicate_version(&version, new_version.as_deref())
                })
                .await?;
                serde_json::to_value(done)?
            }
            Command::DeleteVersion { version, .. } => {
                let done = run_locked(&unit, move |m| m.delete_version(&version)).await?;
                serde_json::to_value(done)?
            }
            Command::RenameVersion {
                version,
                new_version,
                ..
            } => {
                let done =
                    run_locked(&unit, move |m| m.rename_version(&version, &new_version)).await?;
                serde_json::to_value(done)?
            }
            Command::RenameLabel {
                version, new_label, ..
            } => {
                let done = run_locked(&unit, move |m| m.rename_label(&version, &new_label)).await?;
                serde_json::to_value(done)?
            }
            Command::PromoteVersion { version, .. } => {
                let report = run_locked(&unit, move |m| m.promote(&version)).await?;
                self.registry.remove_unit(&name, &unit).await;
                self.broadcast(&name, ChangeReason::Promoted).await;
                tracing::info!(unit = %name, command = command_name, "command executed");
                return Ok(serde_json::to_value(report)?);
            }
        };

        self.broadcast(&name, ChangeReason::Updated).await;
        tracing::info!(unit = %name, command = command_name, "command executed");
        Ok(result)
    }

    /// Resolve the file and tool for an open request, then launch it.
    pub async fn open(
        &self,
        request: OpenRequest,
        launcher: Arc<dyn Launcher>,
    ) -> Result<OpenResponse, DaemonError> {
        let unit = self.registry.require(&request.unit).await?;
        let key: VersionKey = request.version.trim().parse()?;
        let version = run_locked(&unit, |m| m.versions())
            .await?
            .into_iter()
            .find(|v| v.key == key)
            .ok_or_else(|| {
                SyncError::NotFound(format!("unit '{}' has no version {key}", request.unit))
            })?;

        let prefs = EditorPreferences::from_env(self.config.editor.clone());
        let tool = resolve_tool(request.tool.as_deref(), &prefs);
        let label = tool.label();
        let path = version.path.clone();
        tokio::task::spawn_blocking(move || launcher.launch(&tool, &path))
            .await
            .map_err(|err| join_err("launcher", err))?
            .map_err(|source| DaemonError::Launch {
                tool: label.clone(),
                source,
            })?;
        tracing::info!(path = %version.path.display(), tool = %label, "opened version");
        Ok(OpenResponse {
            success: true,
            file_path: version.path,
            tool: label,
        })
    }

    /// Summary used by health checks.
    pub async fn health(&self) -> Value {
        json!({
            "ok": true,
            "root": self.root.display().to_string(),
            "units": self.registry.len().await,
        })
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
