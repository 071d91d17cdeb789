//! `harvest run`: one reconciliation pass.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use harvest_core::Identity;
use harvest_sync::{
    pipeline::{self, RunRequest},
    DocumentFailure, RunCounters, RunReport,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Catalog file path or http(s) URL (overrides config).
    #[arg(long)]
    pub catalog: Option<String>,

    /// Classify every document without writing the store.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,

    /// Worker threads (overrides config).
    #[arg(long)]
    pub workers: Option<usize>,
}

#[derive(Serialize)]
struct RunReportJson<'a> {
    dry_run: bool,
    counters: RunCounters,
    needing_summary: &'a [Identity],
    failures: &'a [DocumentFailure],
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let request = RunRequest {
            catalog: self.catalog,
            dry_run: self.dry_run,
            workers: self.workers,
        };
        let report = pipeline::run(&home, &request).context("reconciliation run failed")?;

        if self.json {
            let payload = RunReportJson {
                dry_run: report.dry_run,
                counters: report.counters,
                needing_summary: &report.needing_summary,
                failures: &report.failures,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize run JSON")?
            );
            return Ok(());
        }

        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let c = &report.counters;
    let mark = if c.errors == 0 {
        "✓".green().bold()
    } else {
        "!".yellow().bold()
    };
    println!(
        "{prefix}{mark} {} documents: {} created, {} updated ({} changed, {} unchanged), {} errors",
        c.total,
        c.created.to_string().green(),
        c.updated,
        c.changed.to_string().yellow(),
        c.unchanged,
        error_count(c.errors),
    );
    println!(
        "{prefix}  {} need summary regeneration, {} need classification",
        c.needing_summary, c.needing_classification
    );

    for failure in &report.failures {
        let who = failure
            .identity
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| format!("entry #{}", failure.position));
        println!("  {}  {who}: {}", "✗".red(), failure.error);
    }
}

fn error_count(errors: usize) -> String {
    if errors == 0 {
        errors.to_string()
    } else {
        errors.to_string().red().bold().to_string()
    }
}
