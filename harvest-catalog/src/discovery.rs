//! Catalog entries → document descriptors.

use chrono::{DateTime, SecondsFormat, Utc};

use harvest_core::{DocumentDescriptor, HarvestConfig};
use harvest_renderer::{FieldsContext, Renderer};

use crate::entry::CatalogEntry;
use crate::error::{CatalogError, DiscoveryError};
use crate::identity::identity_from_locator;

/// Probe locator rendered once at construction to surface template errors
/// before any document is processed.
const SAMPLE_LOCATOR: &str = "https://example.invalid/sample-document";

/// Builds descriptors for one run. `now` is the run's wall clock, used for
/// entries with no `lastmod`.
pub struct Discovery<'a> {
    config: &'a HarvestConfig,
    renderer: &'a Renderer,
    now: DateTime<Utc>,
    keywords: Vec<String>,
}

impl<'a> Discovery<'a> {
    pub fn new(
        config: &'a HarvestConfig,
        renderer: &'a Renderer,
        now: DateTime<Utc>,
    ) -> Result<Self, CatalogError> {
        renderer.render(&FieldsContext::new(SAMPLE_LOCATOR, config))?;
        let keywords = config
            .include_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Ok(Self {
            config,
            renderer,
            now,
            keywords,
        })
    }

    /// Keyword filter over locator and title. An empty keyword list accepts all.
    pub fn is_included(&self, locator: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let title = harvest_renderer::title_from_slug(locator);
        let text = format!("{locator} {title}").to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Turn one entry into a descriptor. `position` is the 1-based catalog
    /// position, used in error messages.
    pub fn descriptor(
        &self,
        position: usize,
        entry: CatalogEntry,
    ) -> Result<DocumentDescriptor, DiscoveryError> {
        let Some(locator) = entry.loc else {
            return Err(DiscoveryError::MissingLocator { position });
        };
        let identity = identity_from_locator(&self.config.identity_prefix, &locator)
            .ok_or_else(|| DiscoveryError::NoIdentity {
                locator: locator.clone(),
            })?;
        let derived = self
            .renderer
            .render(&FieldsContext::new(&locator, self.config))
            .map_err(|source| DiscoveryError::Render {
                locator: locator.clone(),
                source,
            })?;

        let modified_at = match entry.lastmod {
            Some(lastmod) => lastmod,
            None => {
                let fallback = self.now.to_rfc3339_opts(SecondsFormat::Secs, true);
                tracing::warn!(
                    "no lastmod for {locator}; using current time {fallback} (document will be treated as changed)"
                );
                fallback
            }
        };

        Ok(DocumentDescriptor {
            identity,
            locator,
            modified_at: Some(modified_at),
            derived,
        })
    }

    /// Lazily map catalog entries to descriptors in catalog order, dropping
    /// entries rejected by the keyword filter.
    pub fn descriptors<I>(
        &'a self,
        entries: I,
    ) -> impl Iterator<Item = Result<DocumentDescriptor, DiscoveryError>> + 'a
    where
        I: IntoIterator<Item = CatalogEntry>,
        I::IntoIter: 'a,
    {
        entries
            .into_iter()
            .enumerate()
            .filter(move |(_, entry)| match entry.loc.as_deref() {
                Some(loc) => self.is_included(loc),
                None => true,
            })
            .map(move |(index, entry)| self.descriptor(index + 1, entry))
    }
}
