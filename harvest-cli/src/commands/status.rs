//! `harvest status`: record store and scheduler visibility.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use harvest_core::{config, HarvestConfig};
use harvest_daemon::RunSummary;
use harvest_sync::{JsonRecordStore, StoreSummary};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    environment: String,
    store: String,
    records: usize,
    pending_summary: usize,
    unclassified: usize,
    legacy: usize,
    saved_at: Option<DateTime<Utc>>,
    last_run: Option<RunSummary>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load_at(&home).context("failed to load config")?;
        let store = JsonRecordStore::open_at(&home, &config).context("failed to open record store")?;
        let summary = store.summary()?;
        let last_run = RunSummary::load(&home).context("failed to read last run summary")?;

        if self.json {
            let payload = StatusJson {
                environment: config.environment.to_string(),
                store: store.path().display().to_string(),
                records: summary.records,
                pending_summary: summary.pending_summary,
                unclassified: summary.unclassified,
                legacy: summary.legacy,
                saved_at: summary.saved_at,
                last_run,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
            );
            return Ok(());
        }

        print_table(&config, &store, &summary, last_run.as_ref());
        Ok(())
    }
}

fn print_table(
    config: &HarvestConfig,
    store: &JsonRecordStore,
    summary: &StoreSummary,
    last_run: Option<&RunSummary>,
) {
    println!(
        "Harvest v{} | {} | {}",
        env!("CARGO_PKG_VERSION"),
        config.environment.to_string().bold(),
        store.path().display()
    );
    let saved = summary
        .saved_at
        .map(|at| format!("{} ago", format_datetime_age(at)))
        .unwrap_or_else(|| "never".to_string());
    println!("Store saved: {saved}");

    let rows = vec![
        StatusRow { metric: "records", count: summary.records },
        StatusRow { metric: "pending summary", count: summary.pending_summary },
        StatusRow { metric: "unclassified", count: summary.unclassified },
        StatusRow { metric: "legacy (no modified_at)", count: summary.legacy },
    ];
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    match last_run {
        None => println!("Daemon: {}", "no scheduled run yet".bright_black()),
        Some(run) => {
            let age = Utc
                .timestamp_opt(run.finished_at_unix as i64, 0)
                .single()
                .map(format_datetime_age)
                .unwrap_or_else(|| "?".to_string());
            match (&run.counters, &run.error) {
                (Some(c), _) => println!(
                    "Daemon: {} {age} ago ({} created, {} changed, {} errors)",
                    "■".green().bold(),
                    c.created,
                    c.changed,
                    c.errors
                ),
                (None, error) => println!(
                    "Daemon: {} {age} ago: {}",
                    "■".red().bold(),
                    error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
    }

    if summary.pending_summary > 0 {
        println!("Run 'harvest pending' to list records awaiting a summary.");
    }
}

/// Age of `timestamp` relative to now, e.g. `42s`, `5m`, `3h`, `2d`.
fn format_datetime_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
