//! Harvest: incremental content-ingestion CLI.
//!
//! # Usage
//!
//! ```text
//! harvest init [--catalog <path|url>] [--environment production|staging] [--workers N]
//! harvest run [--catalog <path|url>] [--dry-run] [--json] [--workers N]
//! harvest status [--json]
//! harvest pending [--limit N]
//! harvest daemon start [--interval-secs N]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    daemon::DaemonCommand, init::InitArgs, pending::PendingArgs, run::RunArgs,
    status::StatusArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "harvest",
    version,
    about = "Reconcile a content catalog into a local record store",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default ~/.harvest/config.yaml.
    Init(InitArgs),

    /// Run one reconciliation pass over the catalog.
    Run(RunArgs),

    /// Summarize the record store.
    Status(StatusArgs),

    /// List records waiting for summary regeneration.
    Pending(PendingArgs),

    /// Run scheduled reconciliation in the foreground.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    harvest_daemon::init_tracing();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Run(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Pending(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
