//! `variants diff <unit>` — show what regeneration would change.

use anyhow::{Context, Result};
use clap::Args;

use variants_sync::diff_unit;

use super::Session;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Unit name or path.
    pub unit: String,
}

impl DiffArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        let manager = session.manager(&self.unit)?;
        let diff = diff_unit(&manager).with_context(|| format!("diff failed for '{}'", self.unit))?;

        let Some(diff) = diff else {
            println!("No differences for '{}'.", manager.name());
            return Ok(());
        };
        print!("{}", diff.unified_diff);
        if !diff.unified_diff.ends_with('\n') {
            println!();
        }
        Ok(())
    }
}
