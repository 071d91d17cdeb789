//! sitemaps.org XML (`http://www.sitemaps.org/schemas/sitemap/0.9`).
//!
//! Two document kinds are read:
//!
//! ```xml
//! <sitemapindex><sitemap><loc>https://…/sitemaps/articles/1.xml</loc></sitemap></sitemapindex>
//! <urlset><url><loc>https://…/content/…</loc><lastmod>2024-01-15</lastmod></url></urlset>
//! ```
//!
//! A `<urlset>` may itself act as an index: its `<loc>`s that match the
//! nested-sitemap filter point at further sitemaps rather than documents.

use serde::Deserialize;

use crate::entry::CatalogEntry;
use crate::error::CatalogError;

#[derive(Debug, Deserialize)]
struct SitemapRef {
    #[serde(default)]
    loc: Option<String>,
}

/// Root element of either kind. The root name itself is not checked.
#[derive(Debug, Default, Deserialize)]
struct SitemapXml {
    #[serde(rename = "url", default)]
    urls: Vec<CatalogEntry>,
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<SitemapRef>,
}

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sitemap {
    /// Locations of nested sitemaps to read next.
    Index(Vec<String>),
    /// Document entries.
    UrlSet(Vec<CatalogEntry>),
}

/// Parse one sitemap document.
///
/// `nested_filter` selects which `<loc>`s are nested sitemaps. `<sitemap>`
/// children of a `<sitemapindex>` must match it too; an empty filter accepts
/// every `<sitemap>` and treats no `<url>` as nested.
pub fn parse_sitemap(
    location: &str,
    text: &str,
    nested_filter: &str,
) -> Result<Sitemap, CatalogError> {
    let parsed: SitemapXml = quick_xml::de::from_str(text).map_err(|e| CatalogError::Xml {
        location: location.to_string(),
        source: e,
    })?;

    if !parsed.sitemaps.is_empty() {
        let children = parsed
            .sitemaps
            .into_iter()
            .filter_map(|s| clean(s.loc))
            .filter(|loc| nested_filter.is_empty() || loc.contains(nested_filter))
            .collect();
        return Ok(Sitemap::Index(children));
    }

    let entries: Vec<CatalogEntry> = parsed.urls.into_iter().map(CatalogEntry::normalized).collect();
    if !nested_filter.is_empty() {
        let nested: Vec<String> = entries
            .iter()
            .filter_map(|e| e.loc.as_deref())
            .filter(|loc| loc.contains(nested_filter))
            .map(str::to_string)
            .collect();
        if !nested.is_empty() {
            return Ok(Sitemap::Index(nested));
        }
    }
    Ok(Sitemap::UrlSet(entries))
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
