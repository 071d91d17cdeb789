//! Error types for harvest-catalog.

use std::path::PathBuf;

use thiserror::Error;

use harvest_renderer::RenderError;

/// Whole-catalog failures. Any of these means discovery produced nothing.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch catalog {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("failed to read catalog body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse sitemap {location}: {source}")]
    Xml {
        location: String,
        #[source]
        source: quick_xml::DeError,
    },

    /// Templates failed on a sample document, so every document would fail.
    #[error("derived-field templates unusable: {0}")]
    Render(#[from] RenderError),
}

/// A single catalog entry that cannot become a descriptor.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("catalog entry #{position} has no <loc>")]
    MissingLocator { position: usize },

    #[error("cannot derive an identity from locator '{locator}'")]
    NoIdentity { locator: String },

    #[error("rendering derived fields for '{locator}' failed: {source}")]
    Render {
        locator: String,
        #[source]
        source: RenderError,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CatalogError {
    CatalogError::Io {
        path: path.into(),
        source,
    }
}
