//! `harvest pending`: records whose summary is empty or missing.

use anyhow::{Context, Result};
use clap::Args;

use harvest_core::config;
use harvest_sync::JsonRecordStore;

#[derive(Args, Debug)]
pub struct PendingArgs {
    /// Show at most N records.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl PendingArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load config")?;
        let store = JsonRecordStore::open_at(&home, &config).context("failed to open record store")?;

        let pending = store.pending_summary()?;
        if pending.is_empty() {
            println!("No records waiting for a summary.");
            return Ok(());
        }

        let total = pending.len();
        let limit = self.limit.unwrap_or(total);
        for record in pending.iter().take(limit) {
            println!(
                "{}\t{}\t{}",
                record.identity,
                record.modified_at.as_deref().unwrap_or("-"),
                record.locator
            );
        }
        if total > limit {
            println!("… {} more", total - limit);
        }
        Ok(())
    }
}
