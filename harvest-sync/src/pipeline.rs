//! Shared run entrypoint used by the CLI and the daemon.

use std::path::Path;

use chrono::Utc;

use harvest_catalog::{load_catalog, Discovery};
use harvest_core::config;
use harvest_renderer::Renderer;

use crate::aggregator::{run_reconciliation, RunOptions, RunReport};
use crate::error::SyncError;
use crate::record_store::JsonRecordStore;

/// Per-run overrides on top of `config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Catalog path or URL; falls back to the configured one.
    pub catalog: Option<String>,
    pub dry_run: bool,
    /// Worker count; falls back to the configured one.
    pub workers: Option<usize>,
}

/// Run one reconciliation pass over the configured catalog.
///
/// Run-level failures (config, catalog, template, store open/save) abort
/// before or after reconciliation; per-document failures are only counted in
/// the returned report. A dry run never saves the store.
pub fn run(home: &Path, request: &RunRequest) -> Result<RunReport, SyncError> {
    let config = config::load_at(home)?;
    let location = request
        .catalog
        .clone()
        .or_else(|| config.catalog.clone())
        .ok_or(SyncError::NoCatalog)?;

    let store_path = config.store_path_at(home);
    let store = JsonRecordStore::open(&store_path).map_err(|source| SyncError::StoreInit {
        path: store_path.clone(),
        source,
    })?;

    let renderer = Renderer::with_user_templates(&config::templates_dir_at(home))?;
    let entries = load_catalog(&location, &config.sitemap_filter)?;
    if entries.is_empty() {
        return Err(SyncError::EmptyCatalog { location });
    }

    let options = RunOptions {
        dry_run: request.dry_run,
        workers: request.workers.unwrap_or(config.workers).max(1),
        crawled_at: Utc::now(),
    };
    let discovery = Discovery::new(&config, &renderer, options.crawled_at)?;
    tracing::info!(
        "reconciling {} catalog entries from {location} into {} ({} worker(s){})",
        entries.len(),
        store_path.display(),
        options.workers,
        if options.dry_run { ", dry-run" } else { "" }
    );

    let report = run_reconciliation(&store, discovery.descriptors(entries), &options);

    if !options.dry_run {
        store.save()?;
    }

    let c = &report.counters;
    tracing::info!(
        "run finished: total={} processed={} created={} updated={} changed={} unchanged={} needing_summary={} needing_classification={} errors={}",
        c.total,
        c.processed,
        c.created,
        c.updated,
        c.changed,
        c.unchanged,
        c.needing_summary,
        c.needing_classification,
        c.errors
    );
    Ok(report)
}
