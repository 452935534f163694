//! variants — keep interchangeable implementations of a UI unit in sync.
//!
//! # Usage
//!
//! ```text
//! variants [--root <dir>] [--server <url>] watch [--port N] [--log-json]
//! variants list [--json]
//! variants new <unit> [--version vN]
//! variants fork <unit> <version> [--to vN]
//! variants rename <unit> <version> <new>
//! variants label <unit> <version> <label>
//! variants delete <unit> <version>
//! variants promote <unit> <version>
//! variants diff <unit>
//! variants open <unit> <version> [--tool T]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs,
    list::ListArgs,
    mutate::{DeleteArgs, ForkArgs, LabelArgs, NewArgs, PromoteArgs, RenameArgs},
    open::OpenArgs,
    watch::WatchArgs,
    Session,
};

#[derive(Parser, Debug)]
#[command(
    name = "variants",
    version,
    about = "Manage interchangeable versions of UI units and their generated manifests",
    long_about = None,
)]
struct Cli {
    /// Project root holding the units.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Send commands to a running daemon instead of editing files directly.
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the root and serve the control plane.
    Watch(WatchArgs),

    /// List units and their versions.
    List(ListArgs),

    /// Create a new version from the stub template.
    New(NewArgs),

    /// Duplicate an existing version.
    Fork(ForkArgs),

    /// Move a version to a new key.
    Rename(RenameArgs),

    /// Set the manifest label of a version.
    Label(LabelArgs),

    /// Delete a version.
    Delete(DeleteArgs),

    /// Replace the unit with one of its versions and remove the rest.
    Promote(PromoteArgs),

    /// Show what regeneration would change in a manifest.
    Diff(DiffArgs),

    /// Open a version file in an editor.
    Open(OpenArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let session = Session::new(cli.root, cli.server);
    match cli.command {
        Commands::Watch(args) => args.run(&session),
        Commands::List(args) => args.run(&session),
        Commands::New(args) => args.run(&session),
        Commands::Fork(args) => args.run(&session),
        Commands::Rename(args) => args.run(&session),
        Commands::Label(args) => args.run(&session),
        Commands::Delete(args) => args.run(&session),
        Commands::Promote(args) => args.run(&session),
        Commands::Diff(args) => args.run(&session),
        Commands::Open(args) => args.run(&session),
    }
}
