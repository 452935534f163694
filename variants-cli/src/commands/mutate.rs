//! Mutation commands: `new`, `fork`, `rename`, `label`, `delete`, `promote`.
//!
//! With `--server` the command travels to the daemon as a control-plane
//! envelope; otherwise it runs against the unit's files directly.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use variants_daemon::Command;

use super::Session;

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Unit name or path.
    pub unit: String,
    /// Key for the new version (defaults to the next major).
    #[arg(long)]
    pub version: Option<String>,
}

#[derive(Args, Debug)]
pub struct ForkArgs {
    pub unit: String,
    /// Version to copy.
    pub version: String,
    /// Key for the copy (defaults to the next major).
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Args, Debug)]
pub struct RenameArgs {
    pub unit: String,
    pub version: String,
    /// New key.
    pub new_version: String,
}

#[derive(Args, Debug)]
pub struct LabelArgs {
    pub unit: String,
    pub version: String,
    pub label: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub unit: String,
    pub version: String,
}

#[derive(Args, Debug)]
pub struct PromoteArgs {
    pub unit: String,
    pub version: String,
}

impl NewArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let target = self.unit.clone();
        let result = dispatch(session, &target, |unit| Command::NewVersion {
            unit,
            version: self.version,
        })?;
        report("created", &result)
    }
}

impl ForkArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let target = self.unit.clone();
        let result = dispatch(session, &target, |unit| Command::DuplicateVersion {
            unit,
            version: self.version,
            new_version: self.to,
        })?;
        report("forked", &result)
    }
}

impl RenameArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let target = self.unit.clone();
        let result = dispatch(session, &target, |unit| Command::RenameVersion {
            unit,
            version: self.version,
            new_version: self.new_version,
        })?;
        report("renamed", &result)
    }
}

impl LabelArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let target = self.unit.clone();
        let result = dispatch(session, &target, |unit| Command::RenameLabel {
            unit,
            version: self.version,
            new_label: self.label,
        })?;
        report("labelled", &result)
    }
}

impl DeleteArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let target = self.unit.clone();
        let result = dispatch(session, &target, |unit| Command::DeleteVersion {
            unit,
            version: self.version,
        })?;
        report("deleted", &result)
    }
}

impl PromoteArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let target = self.unit.clone();
        let result = dispatch(session, &target, |unit| Command::PromoteVersion {
            unit,
            version: self.version,
        })?;
        let base = result["base_file"].as_str().unwrap_or_default();
        let removed = result["removed"].as_array().map_or(0, Vec::len);
        println!(
            "{} {} {} into {} ({} files removed)",
            "promoted".green().bold(),
            result["unit"].as_str().unwrap_or_default(),
            result["version"].as_str().unwrap_or_default(),
            base,
            removed
        );
        Ok(())
    }
}

/// Build the command for `target` and run it remotely or locally.
fn dispatch(
    session: &Session,
    target: &str,
    build: impl FnOnce(String) -> Command,
) -> Result<Value> {
    match session.server() {
        Some(server) => {
            let command = build(session.unit_name(target)?);
            let envelope = serde_json::to_value(&command).context("failed to encode command")?;
            let reply = session.post(server, "command", &envelope)?;
            reply
                .pointer("/payload/result")
                .cloned()
                .ok_or_else(|| anyhow!("server reply carries no result: {reply}"))
        }
        None => {
            let mut manager = session.manager(target)?;
            let command = build(manager.name().to_string());
            let result = match command {
                Command::NewVersion { version, .. } => {
                    serde_json::to_value(manager.new_version(version.as_deref())?)?
                }
                Command::DuplicateVersion {
                    version,
                    new_version,
                    ..
                } => serde_json::to_value(
                    manager.duplicate_version(&version, new_version.as_deref())?,
                )?,
                Command::DeleteVersion { version, .. } => {
                    serde_json::to_value(manager.delete_version(&version)?)?
                }
                Command::RenameVersion {
                    version,
                    new_version,
                    ..
                } => serde_json::to_value(manager.rename_version(&version, &new_version)?)?,
                Command::RenameLabel {
                    version, new_label, ..
                } => serde_json::to_value(manager.rename_label(&version, &new_label)?)?,
                Command::PromoteVersion { version, .. } => {
                    serde_json::to_value(manager.promote(&version)?)?
                }
            };
            Ok(result)
        }
    }
}

fn report(verb: &str, result: &Value) -> Result<()> {
    let unit = result["unit"].as_str().unwrap_or_default();
    let version = result["version"].as_str().unwrap_or_default();
    let path = result["path"].as_str().unwrap_or_default();
    match result["previous"].as_str() {
        Some(previous) => println!(
            "{} {unit} {previous} -> {version} ({path})",
            verb.green().bold()
        ),
        None => println!("{} {unit} {version} ({path})", verb.green().bold()),
    }
    Ok(())
}
