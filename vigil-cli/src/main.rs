//! Vigil: reactive file monitoring and YAML state documents from the terminal.
//!
//! # Usage
//!
//! ```text
//! vigil watch <dir> [--ext jpg,png,tif,tiff] [--state-dir <dir>]
//! vigil store get <file> <key>
//! vigil store set <file> <key> <yaml-value>
//! vigil store delete <file> <key>
//! vigil store show <file> [--json]
//! vigil store follow <file>
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{store::StoreCommand, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "vigil",
    version,
    about = "Watch a directory and keep per-file state in YAML documents",
    long_about = None,
)]
struct Cli {
    /// Show debugging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reactively track every matching file in a directory.
    Watch(WatchArgs),

    /// Read, write, or follow a state document.
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Watch(args) => args.run(),
        Commands::Store { command } => commands::store::run(command),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
