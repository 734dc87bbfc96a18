//! lsync: live directory mirroring driven by inotify.
//!
//! # Usage
//!
//! ```text
//! lsync init <source> <target> [--name <name>] [--per-directory] [--config <path>]
//! lsync check [--json] [--config <path>]
//! lsync run [--config <path>]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{check::CheckArgs, init::InitArgs, run::RunArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "lsync",
    version,
    about = "Mirror directory trees by running a sync command on every change",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add an rsync-backed root to the configuration.
    Init(InitArgs),

    /// Validate the configuration and show what would be watched.
    Check(CheckArgs),

    /// Run the daemon in the foreground until SIGTERM or SIGINT.
    Run(RunArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Run(args) => args.run(),
    }
}
