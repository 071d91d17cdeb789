//! Error types for harvest-sync.

use std::path::PathBuf;

use thiserror::Error;

use harvest_catalog::CatalogError;
use harvest_core::{ConfigError, Identity};
use harvest_renderer::RenderError;

/// Record store adapter failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (store file).
    #[error("record store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A writer panicked while holding the store lock.
    #[error("record store lock poisoned")]
    Poisoned,

    /// The adapter refused a read or write (throttling, permissions, ...).
    #[error("record store rejected '{identity}': {reason}")]
    Rejected { identity: Identity, reason: String },
}

/// Per-document failures. Counted and logged, never propagated out of a run.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("malformed descriptor: {reason}")]
    MalformedDescriptor { reason: String },

    #[error("record store unavailable for '{identity}': {source}")]
    StoreUnavailable {
        identity: Identity,
        #[source]
        source: StoreError,
    },

    /// Only the first occurrence of an identity in a run is reconciled.
    #[error("identity '{identity}' appeared earlier in this run")]
    DuplicateIdentity { identity: Identity },
}

/// Run-level failures: nothing was reconciled.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("no catalog configured; pass --catalog or set `catalog` in config.yaml")]
    NoCatalog,

    #[error("catalog {location} contained no documents")]
    EmptyCatalog { location: String },

    #[error("cannot open record store at {path}: {source}")]
    StoreInit {
        path: PathBuf,
        #[source]
        source: StoreError,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
