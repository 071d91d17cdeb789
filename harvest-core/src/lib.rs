//! Harvest core library: record model, write intents, config, errors.
//!
//! - [`types`]: descriptors, persisted records, partial-update intents
//! - [`config`]: `~/.harvest/config.yaml` load / save / init
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Environment, HarvestConfig};
pub use error::ConfigError;
pub use types::{
    Classification, DerivedFields, DocumentDescriptor, FieldWrite, Identity, PersistedRecord,
    WriteIntent,
};
