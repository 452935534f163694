//! Open-in-tool resolution.
//!
//! The control plane only resolves which file to open and with what; the
//! process launch itself goes through a [`Launcher`].

use std::path::Path;
use std::process::{Command, Stdio};

/// Environment variable naming the preferred tool, checked before the
/// config file's `editor`.
pub const EDITOR_ENV: &str = "VARIANTS_EDITOR";

/// How a file should be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    /// A command line such as `code` or `code -g`; the file path is appended.
    Named(String),
    /// The operating system's default opener.
    SystemDefault,
}

impl Tool {
    /// Label reported back to clients.
    pub fn label(&self) -> String {
        match self {
            Tool::Named(command) => command.clone(),
            Tool::SystemDefault => system_opener().0.to_string(),
        }
    }
}

/// Editor preferences outside the request itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorPreferences {
    /// `VARIANTS_EDITOR`
    pub env_editor: Option<String>,
    /// `editor` from `variants.yaml`
    pub config_editor: Option<String>,
    /// `EDITOR`
    pub editor: Option<String>,
}

impl EditorPreferences {
    pub fn from_env(config_editor: Option<String>) -> Self {
        Self {
            env_editor: std::env::var(EDITOR_ENV).ok(),
            config_editor,
            editor: std::env::var("EDITOR").ok(),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Requested tool, then configured tool, then the OS default opener.
pub fn resolve_tool(requested: Option<&str>, prefs: &EditorPreferences) -> Tool {
    non_blank(requested)
        .or_else(|| non_blank(prefs.env_editor.as_deref()))
        .or_else(|| non_blank(prefs.config_editor.as_deref()))
        .or_else(|| non_blank(prefs.editor.as_deref()))
        .map(|tool| Tool::Named(tool.to_string()))
        .unwrap_or(Tool::SystemDefault)
}

fn system_opener() -> (&'static str, &'static [&'static str]) {
    if cfg!(target_os = "macos") {
        ("open", &[])
    } else if cfg!(windows) {
        ("cmd", &["/C", "start", ""])
    } else {
        ("xdg-open", &[])
    }
}

/// Launches a tool on a file.
pub trait Launcher: Send + Sync {
    fn launch(&self, tool: &Tool, path: &Path) -> std::io::Result<()>;
}

/// Spawns a detached child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, tool: &Tool, path: &Path) -> std::io::Result<()> {
        let mut command = match tool {
            Tool::Named(line) => {
                let mut parts = line.split_whitespace();
                let program = parts.next().ok_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty tool command")
                })?;
                let mut command = Command::new(program);
                command.args(parts);
                command
            }
            Tool::SystemDefault => {
                let (program, args) = system_opener();
                let mut command = Command::new(program);
                command.args(args);
                command
            }
        };
        command
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs(env: Option<&str>, config: Option<&str>, editor: Option<&str>) -> EditorPreferences {
        EditorPreferences {
            env_editor: env.map(Into::into),
            config_editor: config.map(Into::into),
            editor: editor.map(Into::into),
        }
    }

    #[test]
    fn requested_tool_wins() {
        let tool = resolve_tool(Some("zed"), &prefs(Some("code"), Some("vim"), Some("nano")));
        assert_eq!(tool, Tool::Named("zed".into()));
    }

    #[test]
    fn fallback_order_is_env_then_config_then_editor() {
        assert_eq!(resolve_tool(None, &prefs(Some("code"), Some("vim"), None)), Tool::Named("code".into()));
        assert_eq!(resolve_tool(Some("  "), &prefs(None, Some("vim"), Some("nano"))), Tool::Named("vim".into()));
        assert_eq!(resolve_tool(None, &prefs(None, None, Some("nano"))), Tool::Named("nano".into()));
        assert_eq!(resolve_tool(None, &prefs(None, None, None)), Tool::SystemDefault);
    }
}
