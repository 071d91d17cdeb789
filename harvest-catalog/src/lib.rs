//! Discovery source for `harvest`.
//!
//! [`load_catalog`] reads the catalog (a sitemap or JSON export, local file or
//! `http(s)` URL) into [`CatalogEntry`] values, following a sitemap index one
//! level; [`Discovery`] turns them into
//! [`DocumentDescriptor`](harvest_core::DocumentDescriptor)s, applying the
//! keyword filter, identity derivation and the missing-`lastmod` fallback.

pub mod discovery;
pub mod entry;
pub mod error;
pub mod identity;
pub mod sitemap;

pub use discovery::Discovery;
pub use entry::{load_catalog, parse_catalog, CatalogEntry};
pub use error::{CatalogError, DiscoveryError};
pub use identity::identity_from_locator;
pub use sitemap::{parse_sitemap, Sitemap};
