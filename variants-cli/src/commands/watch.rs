//! `variants watch` — run the synchronization daemon in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use variants_daemon::{start_blocking, RunOptions};

use super::Session;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Port for the control plane (defaults to `server.port` in variants.yaml).
    #[arg(long)]
    pub port: Option<u16>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl WatchArgs {
    pub fn run(self, session: &Session) -> Result<()> {
        start_blocking(RunOptions {
            root: session.root().to_path_buf(),
            port: self.port,
            log_json: self.log_json,
        })
        .context("daemon exited with error")
    }
}
