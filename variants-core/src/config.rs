//! Optional per-project configuration, `<root>/variants.yaml`.
//!
//! # Example
//!
//! ```yaml
//! server:
//!   host: 127.0.0.1
//!   port: 7411
//! extensions: [tsx, jsx]
//! ignore: [storybook-static]
//! editor: code
//! templates_dir: .variants/templates
//! log:
//!   json: false
//! ```
//!
//! Every field is optional; a missing file yields [`Config::default`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};
use crate::types::Extension;

pub const CONFIG_FILE: &str = "variants.yaml";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 7411;

/// Directory names never descended into during discovery, on top of hidden
/// directories.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &["node_modules", "dist", "build", "target"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Extension probe order for version files.
    pub extensions: Vec<Extension>,
    /// Extra directory names to skip.
    pub ignore: Vec<String>,
    /// Preferred tool for opening version files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor: Option<String>,
    /// Directory with `.tera` overrides for version-file stubs, relative to root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            extensions: Extension::DEFAULT_PROBE_ORDER.to_vec(),
            ignore: Vec::new(),
            editor: None,
            templates_dir: None,
            log: LogConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Whether discovery and watching should skip a directory named `name`.
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        name.starts_with('.')
            || DEFAULT_IGNORED_DIRS.contains(&name)
            || self.ignore.iter().any(|ignored| ignored == name)
    }

    /// `templates_dir` resolved against `root`.
    pub fn templates_dir_at(&self, root: &Path) -> Option<PathBuf> {
        self.templates_dir.as_ref().map(|dir| root.join(dir))
    }
}

/// `<root>/variants.yaml` — pure, no I/O.
pub fn config_path_at(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Load `<root>/variants.yaml`, falling back to defaults when absent.
///
/// Returns `CoreError::Parse` (with path + line context) if malformed YAML and
/// `CoreError::InvalidConfig` if the extension list is empty or repeats itself.
pub fn load_at(root: &Path) -> Result<Config, CoreError> {
    let path = config_path_at(root);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    let config: Config =
        serde_yaml::from_str(&contents).map_err(|e| CoreError::Parse { path: path.clone(), source: e })?;
    validate(&path, &config)?;
    Ok(config)
}

fn validate(path: &Path, config: &Config) -> Result<(), CoreError> {
    if config.extensions.is_empty() {
        return Err(CoreError::InvalidConfig {
            path: path.to_path_buf(),
            message: "extensions must list at least one of tsx, ts, jsx, js".to_string(),
        });
    }
    let mut seen = HashSet::new();
    for ext in &config.extensions {
        if !seen.insert(ext) {
            return Err(CoreError::InvalidConfig {
                path: path.to_path_buf(),
                message: format!("extension '{ext}' listed more than once"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
