//! `harvest daemon`: scheduled reconciliation.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Subcommand;

use harvest_daemon::start_blocking;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the scheduler in the foreground until ctrl-c.
    Start {
        /// Seconds between runs (overrides config `interval_secs`).
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start { interval_secs } => {
            let interval = interval_secs.map(|secs| Duration::from_secs(secs.max(1)));
            start_blocking(&home, interval).context("daemon exited with error")?;
        }
    }
    Ok(())
}
