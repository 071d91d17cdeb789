//! Run aggregation: drives [`reconcile`] over a catalog and folds outcomes
//! into [`RunCounters`].
//!
//! No per-document failure escapes a run: each becomes a counted, logged
//! [`DocumentFailure`]. Results are folded in input order by a single writer,
//! so counters and lists are identical for sequential and pooled runs.
//!
//! Guarantees on the returned counters:
//! - `created + updated == processed`
//! - `needing_summary == needing_classification == created + changed`
//! - `processed + errors == total`
//!
//! An identity is reconciled at most once per run. A later descriptor with the
//! same identity is not classified: it fails with
//! [`ReconcileError::DuplicateIdentity`] and counts as an error. Which
//! occurrence wins is decided in input order, also in pooled runs, so the
//! outcome never depends on worker scheduling.

use std::collections::HashSet;
use std::fmt;
use std::sync::{mpsc, Mutex};
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harvest_core::{DocumentDescriptor, Identity};

use crate::error::ReconcileError;
use crate::reconciler::{reconcile, ReconciliationOutcome};
use crate::record_store::RecordStore;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Run-level counters. Only [`run_reconciliation`] mutates them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCounters {
    /// Descriptors pulled from the source, including failures.
    pub total: usize,
    /// Descriptors classified and written (or, in dry-run, classified).
    pub processed: usize,
    pub created: usize,
    /// Existing records touched: `changed + unchanged`.
    pub updated: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub needing_summary: usize,
    /// Records whose classification was cleared or never set.
    pub needing_classification: usize,
    pub errors: usize,
}

impl RunCounters {
    fn record(&mut self, outcome: &ReconciliationOutcome) {
        self.processed += 1;
        match outcome {
            ReconciliationOutcome::Created { .. } => {
                self.created += 1;
                self.needing_summary += 1;
                self.needing_classification += 1;
            }
            ReconciliationOutcome::Changed { .. } => {
                self.updated += 1;
                self.changed += 1;
                self.needing_summary += 1;
                self.needing_classification += 1;
            }
            ReconciliationOutcome::Unchanged { .. } => {
                self.updated += 1;
                self.unchanged += 1;
            }
        }
    }
}

/// A document that could not be reconciled or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    /// 1-based position in the source sequence.
    pub position: usize,
    pub identity: Option<Identity>,
    pub error: String,
}

/// A successfully reconciled document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReport {
    pub identity: Identity,
    pub outcome: ReconciliationOutcome,
}

/// Everything a run produced, in source order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub counters: RunCounters,
    /// Documents whose summary was invalidated or never set, once each.
    pub needing_summary: Vec<Identity>,
    pub failures: Vec<DocumentFailure>,
    pub documents: Vec<DocumentReport>,
    pub dry_run: bool,
}

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Classify without applying any write.
    pub dry_run: bool,
    /// Worker threads; `0` and `1` both mean sequential.
    pub workers: usize,
    /// Bookkeeping timestamp written to every touched record.
    pub crawled_at: DateTime<Utc>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            workers: 1,
            crawled_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// run_reconciliation
// ---------------------------------------------------------------------------

enum DocumentResult {
    Done(DocumentReport),
    Failed(DocumentFailure),
}

/// Reconcile every item from `source` against `store`.
///
/// Source items that are `Err` are counted as malformed descriptors.
pub fn run_reconciliation<S, I, E>(store: &S, source: I, options: &RunOptions) -> RunReport
where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = Result<DocumentDescriptor, E>>,
    I::IntoIter: Send,
    E: fmt::Display,
{
    let results = if options.workers <= 1 {
        process_sequential(store, source, options)
    } else {
        process_pooled(store, source, options)
    };
    fold(results, options.dry_run)
}

/// Pulls the next item and claims its identity for this run. Both happen under
/// the caller's lock so claims follow input order.
struct Feed<It> {
    items: std::iter::Enumerate<It>,
    seen: HashSet<Identity>,
}

impl<It, E> Feed<It>
where
    It: Iterator<Item = Result<DocumentDescriptor, E>>,
{
    fn new(items: It) -> Self {
        Self {
            items: items.enumerate(),
            seen: HashSet::new(),
        }
    }

    /// `(position, item, first_sighting)`
    fn next(&mut self) -> Option<(usize, Result<DocumentDescriptor, E>, bool)> {
        let (index, item) = self.items.next()?;
        let first = match &item {
            Ok(d) if !d.identity.is_empty() => self.seen.insert(d.identity.clone()),
            _ => true,
        };
        Some((index + 1, item, first))
    }
}

fn process_sequential<S, I, E>(
    store: &S,
    source: I,
    options: &RunOptions,
) -> Vec<(usize, DocumentResult)>
where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = Result<DocumentDescriptor, E>>,
    E: fmt::Display,
{
    let mut feed = Feed::new(source.into_iter());
    let mut results = Vec::new();
    while let Some((position, item, first)) = feed.next() {
        results.push((position, process(store, position, item, first, options)));
    }
    results
}

fn process_pooled<S, I, E>(
    store: &S,
    source: I,
    options: &RunOptions,
) -> Vec<(usize, DocumentResult)>
where
    S: RecordStore + ?Sized,
    I: IntoIterator<Item = Result<DocumentDescriptor, E>>,
    I::IntoIter: Send,
    E: fmt::Display,
{
    let feed = Mutex::new(Feed::new(source.into_iter()));
    let (tx, rx) = mpsc::channel();

    thread::scope(|scope| {
        for _ in 0..options.workers {
            let tx = tx.clone();
            let feed = &feed;
            scope.spawn(move || loop {
                let next = {
                    let mut feed = feed.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                    feed.next()
                };
                let Some((position, item, first)) = next else {
                    break;
                };
                let result = process(store, position, item, first, options);
                if tx.send((position, result)).is_err() {
                    break;
                }
            });
        }
        drop(tx);
        let mut results: Vec<_> = rx.into_iter().collect();
        results.sort_by_key(|(position, _)| *position);
        results
    })
}

fn process<S, E>(
    store: &S,
    position: usize,
    item: Result<DocumentDescriptor, E>,
    first_sighting: bool,
    options: &RunOptions,
) -> DocumentResult
where
    S: RecordStore + ?Sized,
    E: fmt::Display,
{
    let descriptor = match item {
        Ok(descriptor) => descriptor,
        Err(err) => {
            let error = ReconcileError::MalformedDescriptor {
                reason: err.to_string(),
            };
            return failed(position, None, error);
        }
    };
    let identity = descriptor.identity.clone();

    if !first_sighting {
        let error = ReconcileError::DuplicateIdentity {
            identity: identity.clone(),
        };
        return failed(position, Some(identity), error);
    }

    let reconciliation = match reconcile(store, &descriptor, options.crawled_at) {
        Ok(r) => r,
        Err(error) => {
            let identity = (!identity.is_empty()).then_some(identity);
            return failed(position, identity, error);
        }
    };

    if !options.dry_run {
        if let Err(source) = store.upsert(&reconciliation.intent) {
            let error = ReconcileError::StoreUnavailable {
                identity: identity.clone(),
                source,
            };
            return failed(position, Some(identity), error);
        }
    }

    log_outcome(&identity, &reconciliation.outcome, options.dry_run);
    DocumentResult::Done(DocumentReport {
        identity,
        outcome: reconciliation.outcome,
    })
}

fn failed(position: usize, identity: Option<Identity>, error: ReconcileError) -> DocumentResult {
    match &identity {
        Some(id) => tracing::warn!("[{position}] {id}: {error}"),
        None => tracing::warn!("[{position}] {error}"),
    }
    DocumentResult::Failed(DocumentFailure {
        position,
        identity,
        error: error.to_string(),
    })
}

fn log_outcome(identity: &Identity, outcome: &ReconciliationOutcome, dry_run: bool) {
    let prefix = if dry_run { "[dry-run] " } else { "" };
    let previous = outcome.previous().unwrap_or("<missing>");
    let current = outcome.current().unwrap_or("<missing>");
    match outcome {
        ReconciliationOutcome::Unchanged { .. } => {
            tracing::debug!("{prefix}unchanged: {identity} (modified_at {current})");
        }
        _ => {
            tracing::info!(
                "{prefix}{}: {identity} (modified_at {previous} -> {current})",
                outcome.label()
            );
        }
    }
}

fn fold(results: Vec<(usize, DocumentResult)>, dry_run: bool) -> RunReport {
    let mut report = RunReport {
        dry_run,
        ..RunReport::default()
    };
    for (_, result) in results {
        report.counters.total += 1;
        match result {
            DocumentResult::Done(doc) => {
                report.counters.record(&doc.outcome);
                if doc.outcome.needs_summary() {
                    report.needing_summary.push(doc.identity.clone());
                }
                report.documents.push(doc);
            }
            DocumentResult::Failed(failure) => {
                report.counters.errors += 1;
                report.failures.push(failure);
            }
        }
    }
    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
