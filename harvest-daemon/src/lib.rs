//! Scheduled reconciliation runs: interval loop + blocking pipeline + ctrl-c shutdown.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{init_tracing, run, run_once, start_blocking, RunSummary};
