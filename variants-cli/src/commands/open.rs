//! `variants open <unit> <version>` — open a version file in an editor.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::json;

use variants_core::VersionKey;
use variants_daemon::{resolve_tool, EditorPreferences, Launcher, SystemLauncher};

use super::Session;

#[derive(Args, Debug)]
pub struct OpenArgs {
    pub unit: String,
    pub version: String,
    /// Tool to open the file with; falls back to VARIANTS_EDITOR, the
    /// configured editor, EDITOR and finally the system opener.
    #[arg(long)]
    pub tool: Option<String>,
}

impl OpenArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        if let Some(server) = session.server() {
            let body = json!({
                "unit": session.unit_name(&self.unit)?,
                "version": self.version,
                "tool": self.tool,
            });
            let reply = session.post(server, "open", &body)?;
            println!(
                "{} {} with {}",
                "opened".green().bold(),
                reply["filePath"].as_str().unwrap_or_default(),
                reply["tool"].as_str().unwrap_or_default()
            );
            return Ok(());
        }

        let manager = session.manager(&self.unit)?;
        let key: VersionKey = self
            .version
            .trim()
            .parse()
            .with_context(|| format!("invalid version '{}'", self.version))?;
        let version = manager
            .versions()?
            .into_iter()
            .find(|v| v.key == key)
            .ok_or_else(|| anyhow!("unit '{}' has no version {key}", manager.name()))?;

        let prefs = EditorPreferences::from_env(session.config()?.editor);
        let tool = resolve_tool(self.tool.as_deref(), &prefs);
        SystemLauncher
            .launch(&tool, &version.path)
            .with_context(|| format!("failed to launch {}", tool.label()))?;
        println!(
            "{} {} with {}",
            "opened".green().bold(),
            version.path.display(),
            tool.label()
        );
        Ok(())
    }
}
