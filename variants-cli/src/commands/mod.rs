pub mod diff;
pub mod list;
pub mod mutate;
pub mod open;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use variants_codec::TemplateEngine;
use variants_core::{config, naming, Config};
use variants_sync::{discover, UnitManager};

/// Where commands run: a project root, optionally fronted by a daemon.
#[derive(Debug)]
pub struct Session {
    root: PathBuf,
    server: Option<String>,
}

impl Session {
    pub fn new(root: PathBuf, server: Option<String>) -> Self {
        Self {
            root,
            server: server.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn config(&self) -> Result<Config> {
        config::load_at(&self.root)
            .with_context(|| format!("failed to load config under {}", self.root.display()))
    }

    /// Manifest path for `target`: a manifest file, a version file, a
    /// directory holding exactly one manifest, or a unit name under root.
    pub fn resolve_manifest(&self, target: &str) -> Result<PathBuf> {
        let config = self.config()?;
        if let Some(path) = self.existing_path(target) {
            return manifest_for_path(&path, &config);
        }

        let name = naming::unit_name(target.trim())
            .with_context(|| format!("'{target}' is neither a path nor a unit name"))?;
        let matches: Vec<PathBuf> = discover::manifest_files(&self.root, &config)
            .context("failed to scan for manifests")?
            .into_iter()
            .filter(|path| naming::manifest_unit(path).as_ref() == Some(&name))
            .collect();
        match matches.as_slice() {
            [] => bail!("no unit named '{name}' under {}", self.root.display()),
            [one] => Ok(one.clone()),
            many => bail!(
                "unit name '{name}' is ambiguous: {}",
                many.iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    fn existing_path(&self, target: &str) -> Option<PathBuf> {
        let direct = PathBuf::from(target);
        if direct.exists() {
            return Some(direct);
        }
        let under_root = self.root.join(target);
        under_root.exists().then_some(under_root)
    }

    /// Unit name for `target` as the daemon knows it.
    pub fn unit_name(&self, target: &str) -> Result<String> {
        if self.existing_path(target).is_some() {
            let manifest = self.resolve_manifest(target)?;
            let name = naming::manifest_unit(&manifest)
                .ok_or_else(|| anyhow!("{} is not a manifest", manifest.display()))?;
            return Ok(name.to_string());
        }
        Ok(target.trim().to_string())
    }

    /// A unit manager working directly on the files of `target`.
    pub fn manager(&self, target: &str) -> Result<UnitManager> {
        let config = self.config()?;
        let manifest = self.resolve_manifest(target)?;
        let engine = TemplateEngine::new(config.templates_dir_at(&self.root).as_deref())
            .context("failed to load templates")?;
        UnitManager::new(&manifest, config.extensions.clone(), Arc::new(engine))
            .with_context(|| format!("failed to open unit at {}", manifest.display()))
    }

    fn url(&self, server: &str, route: &str) -> String {
        format!("{server}/api/{route}")
    }

    /// GET a control-plane route.
    pub fn get(&self, server: &str, route: &str) -> Result<Value> {
        let url = self.url(server, route);
        let response = ureq::get(&url)
            .call()
            .with_context(|| format!("request to {url} failed"))?;
        response
            .into_json()
            .with_context(|| format!("invalid JSON from {url}"))
    }

    /// POST a JSON body; error statuses come back as `Err` with the
    /// server's message.
    pub fn post(&self, server: &str, route: &str, body: &Value) -> Result<Value> {
        let url = self.url(server, route);
        match ureq::post(&url).send_json(body) {
            Ok(response) => response
                .into_json()
                .with_context(|| format!("invalid JSON from {url}")),
            Err(ureq::Error::Status(code, response)) => {
                let body: Value = response.into_json().unwrap_or(Value::Null);
                bail!("server returned {code}: {}", error_message(&body))
            }
            Err(err) => Err(err).with_context(|| format!("request to {url} failed")),
        }
    }
}

fn error_message(body: &Value) -> String {
    body.pointer("/payload/message")
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn manifest_for_path(path: &Path, config: &Config) -> Result<PathBuf> {
    if path.is_dir() {
        let manifests: Vec<PathBuf> = std::fs::read_dir(path)
            .with_context(|| format!("failed to read {}", path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && naming::manifest_unit(p).is_some())
            .collect();
        return match manifests.as_slice() {
            [one] => Ok(one.clone()),
            [] => bail!("no manifest in {}", path.display()),
            _ => bail!("{} holds more than one manifest", path.display()),
        };
    }

    if naming::manifest_unit(path).is_some() {
        return Ok(path.to_path_buf());
    }
    if let Some((name, _, ext)) = naming::version_file(path) {
        if !config.extensions.contains(&ext) {
            bail!("{} uses an extension not in the probe order", path.display());
        }
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let manifest = dir.join(naming::manifest_file_name(&name));
        if manifest.is_file() {
            return Ok(manifest);
        }
        bail!("{} has no manifest next to it", path.display());
    }
    bail!("{} is not a manifest or version file", path.display())
}
