//! # harvest-sync
//!
//! Change detection and idempotent upsert of discovered documents.
//!
//! [`reconcile`] classifies one descriptor against its stored record and
//! returns the write to apply; [`run_reconciliation`] drives it over a whole
//! catalog and aggregates [`RunCounters`]; [`pipeline::run`] wires config,
//! catalog and the JSON record store together for one scheduled run.

pub mod aggregator;
pub mod error;
pub mod pipeline;
pub mod reconciler;
pub mod record_store;

pub use aggregator::{run_reconciliation, DocumentFailure, RunCounters, RunOptions, RunReport};
pub use error::{ReconcileError, StoreError, SyncError};
pub use reconciler::{reconcile, Reconciliation, ReconciliationOutcome};
pub use record_store::{JsonRecordStore, RecordStore, StoreSummary};
