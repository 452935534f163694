//! `variants list` — units and their version keys.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use variants_codec::TemplateEngine;
use variants_daemon::protocol::{UnitEntry, UnitsSnapshot};
use variants_sync::{discover, UnitManager};

use super::Session;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "unit")]
    unit: String,
    #[tabled(rename = "versions")]
    versions: String,
    #[tabled(rename = "manifest")]
    manifest: String,
}

impl ListArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let snapshot = match session.server() {
            Some(server) => serde_json::from_value(session.get(server, "units")?)
                .context("unexpected units payload")?,
            None => local_snapshot(session)?,
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&snapshot).context("failed to serialize units")?
            );
            return Ok(());
        }
        print_table(session.root(), snapshot);
        Ok(())
    }
}

fn local_snapshot(session: &Session) -> Result<UnitsSnapshot> {
    let config = session.config()?;
    let engine = Arc::new(
        TemplateEngine::new(config.templates_dir_at(session.root()).as_deref())
            .context("failed to load templates")?,
    );
    let mut units = Vec::new();
    for manifest in discover::manifest_files(session.root(), &config)
        .context("failed to scan for manifests")?
    {
        let manager = UnitManager::new(&manifest, config.extensions.clone(), engine.clone())?;
        let summary = manager
            .summary()
            .with_context(|| format!("failed to read unit at {}", manifest.display()))?;
        units.push(UnitEntry::from(summary));
    }
    units.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(UnitsSnapshot { units })
}

fn print_table(root: &Path, snapshot: UnitsSnapshot) {
    if snapshot.units.is_empty() {
        println!("No units under {}.", root.display());
        return;
    }
    println!(
        "{} {}",
        snapshot.units.len().to_string().bold(),
        if snapshot.units.len() == 1 { "unit" } else { "units" }
    );
    let rows: Vec<UnitRow> = snapshot
        .units
        .into_iter()
        .map(|unit| UnitRow {
            versions: if unit.versions.is_empty() {
                "-".bright_black().to_string()
            } else {
                unit.versions.join(", ")
            },
            manifest: unit
                .path
                .strip_prefix(root)
                .unwrap_or(&unit.path)
                .display()
                .to_string(),
            unit: unit.name,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
