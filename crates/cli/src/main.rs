//! Stockroom CLI - snapshot provisioning and inspection.
//!
//! # Usage
//!
//! ```bash
//! # Create an empty snapshot for a first start
//! stockroom snapshot init
//!
//! # Replace an existing snapshot with an empty one
//! stockroom snapshot init --force
//!
//! # Print bootstrap flag and record counts
//! stockroom snapshot show
//!
//! # Check the snapshot loads (exit 1 if not)
//! stockroom snapshot verify --path /var/lib/stockroom/catalog.json
//!
//! # Clear products so the next start re-seeds
//! stockroom snapshot empty
//! ```
//!
//! The snapshot path comes from `--path` or `STOCKROOM_SNAPSHOT_PATH`
//! (default: `data/catalog.json`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(author, version, about = "Stockroom CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the catalog snapshot file
    Snapshot {
        /// Snapshot file path
        #[arg(
            short,
            long,
            global = true,
            env = "STOCKROOM_SNAPSHOT_PATH",
            default_value = "data/catalog.json"
        )]
        path: PathBuf,

        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// Create an empty, not-yet-bootstrapped snapshot
    Init {
        /// Overwrite an existing snapshot
        #[arg(long)]
        force: bool,
    },
    /// Print the bootstrap flag and record counts
    Show,
    /// Check that the snapshot loads
    Verify,
    /// Clear all products and the bootstrap flag, keeping users
    Empty,
}

fn main() {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), commands::snapshot::SnapshotCommandError> {
    match cli.command {
        Commands::Snapshot { path, action } => match action {
            SnapshotAction::Init { force } => commands::snapshot::init(&path, force),
            SnapshotAction::Show => commands::snapshot::show(&path).map(|_| ()),
            SnapshotAction::Verify => commands::snapshot::verify(&path).map(|_| ()),
            SnapshotAction::Empty => commands::snapshot::empty(&path),
        },
    }
}
