//! Catalog entries and catalog loading.
//!
//! A catalog is a sitemaps.org XML document (see [`crate::sitemap`]) or a
//! JSON export in one of these shapes:
//!
//! ```json
//! { "urls": [ { "loc": "https://…", "lastmod": "2024-01-15" } ] }
//! [ { "loc": "https://…" } ]
//! ```
//!
//! The bare array is the older export format and is still read.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CatalogError};
use crate::sitemap::{parse_sitemap, Sitemap};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One `<url>` of the discovery catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CatalogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
}

impl CatalogEntry {
    pub fn new(loc: &str, lastmod: Option<&str>) -> Self {
        Self {
            loc: Some(loc.to_string()),
            lastmod: lastmod.map(str::to_string),
        }
    }

    /// Trim whitespace and collapse blank values to `None`.
    pub(crate) fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            loc: clean(self.loc),
            lastmod: clean(self.lastmod),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogCompat {
    Structured { urls: Vec<CatalogEntry> },
    Legacy(Vec<CatalogEntry>),
}

/// Parse a catalog JSON export. `location` is only used for error messages.
pub fn parse_catalog(location: &str, text: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    let parsed = serde_json::from_str::<CatalogCompat>(text).map_err(|e| CatalogError::Parse {
        location: location.to_string(),
        source: e,
    })?;
    let entries = match parsed {
        CatalogCompat::Structured { urls } => urls,
        CatalogCompat::Legacy(entries) => entries,
    };
    Ok(entries.into_iter().map(CatalogEntry::normalized).collect())
}

/// Load the catalog from a file path or an `http(s)://` URL.
///
/// XML documents are read as sitemaps. An index (a `<sitemapindex>`, or a
/// `<urlset>` whose locations match `nested_filter`) is followed one level:
/// each nested sitemap is loaded and the entries are concatenated in index
/// order. A nested sitemap that fails is logged and skipped; the load fails
/// only when every nested sitemap failed.
///
/// No retries: a failed fetch is a run-level failure for the caller to report.
pub fn load_catalog(location: &str, nested_filter: &str) -> Result<Vec<CatalogEntry>, CatalogError> {
    let text = read_location(location)?;
    let entries = if !looks_like_xml(&text) {
        parse_catalog(location, &text)?
    } else {
        match parse_sitemap(location, &text, nested_filter)? {
            Sitemap::UrlSet(entries) => entries,
            Sitemap::Index(children) => load_nested(location, &children, nested_filter)?,
        }
    };
    tracing::info!("loaded {} catalog entries from {location}", entries.len());
    Ok(entries)
}

fn load_nested(
    index: &str,
    children: &[String],
    nested_filter: &str,
) -> Result<Vec<CatalogEntry>, CatalogError> {
    tracing::info!("{index}: following {} nested sitemaps", children.len());
    let mut entries = Vec::new();
    let mut first_error = None;
    let mut loaded = 0usize;
    for child in children {
        let location = resolve_child(index, child);
        let result = read_location(&location).and_then(|text| {
            match parse_sitemap(&location, &text, nested_filter)? {
                Sitemap::UrlSet(found) => Ok(found),
                Sitemap::Index(_) => {
                    tracing::warn!("{location}: nested index ignored (only one level is followed)");
                    Ok(Vec::new())
                }
            }
        });
        match result {
            Ok(found) => {
                tracing::debug!("{location}: {} entries", found.len());
                loaded += 1;
                entries.extend(found);
            }
            Err(err) => {
                tracing::warn!("skipping sitemap {location}: {err}");
                first_error.get_or_insert(err);
            }
        }
    }
    match first_error {
        Some(err) if loaded == 0 => Err(err),
        _ => Ok(entries),
    }
}

fn read_location(location: &str) -> Result<String, CatalogError> {
    if is_remote(location) {
        fetch(location)
    } else {
        let path = Path::new(location);
        std::fs::read_to_string(path).map_err(|e| io_err(path, e))
    }
}

/// Relative child paths of a local index resolve against the index's directory.
fn resolve_child(index: &str, child: &str) -> String {
    if is_remote(child) || is_remote(index) || Path::new(child).is_absolute() {
        return child.to_string();
    }
    let base = Path::new(index).parent().map(Path::to_path_buf).unwrap_or_else(PathBuf::new);
    base.join(child).to_string_lossy().into_owned()
}

fn looks_like_xml(text: &str) -> bool {
    text.trim_start_matches('\u{feff}').trim_start().starts_with('<')
}

fn is_remote(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn fetch(url: &str) -> Result<String, CatalogError> {
    let response = ureq::get(url)
        .timeout(FETCH_TIMEOUT)
        .call()
        .map_err(|e| CatalogError::Http {
            url: url.to_string(),
            source: Box::new(e),
        })?;
    response.into_string().map_err(|e| CatalogError::Body {
        url: url.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn structured_shape_parses() {
        let entries = parse_catalog(
            "inline",
            r#"{"urls":[{"loc":"https://x/a","lastmod":"2024-01-15"},{"loc":"https://x/b"}]}"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], CatalogEntry::new("https://x/a", Some("2024-01-15")));
        assert_eq!(entries[1].lastmod, None);
    }

    #[test]
    fn legacy_array_shape_parses() {
        let entries = parse_catalog("inline", r#"[{"loc":"https://x/a"}]"#).unwrap();
        assert_eq!(entries, vec![CatalogEntry::new("https://x/a", None)]);
    }

    #[test]
    fn blank_values_become_none() {
        let entries =
            parse_catalog("inline", r#"[{"loc":"  https://x/a ","lastmod":"   "}]"#).unwrap();
        assert_eq!(entries[0], CatalogEntry::new("https://x/a", None));
    }

    #[test]
    fn garbage_reports_location() {
        let err = parse_catalog("catalog.json", "not a catalog").unwrap_err();
        assert!(err.to_string().contains("catalog.json"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.json");
        let err = load_catalog(&path.to_string_lossy(), ARTICLES).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    const ARTICLES: &str = "/sitemaps/articles/";

    fn write(dir: &TempDir, name: &str, body: &str) -> String {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn urlset(locs: &[(&str, &str)]) -> String {
        let urls: String = locs
            .iter()
            .map(|(loc, lastmod)| format!("<url><loc>{loc}</loc><lastmod>{lastmod}</lastmod></url>"))
            .collect();
        format!(r#"<?xml version="1.0"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{urls}</urlset>"#)
    }

    #[test]
    fn xml_urlset_file_loads() {
        let tmp = TempDir::new().unwrap();
        let location = write(
            &tmp,
            "sitemap.xml",
            &urlset(&[("https://builder.aws.com/content/1/euc-a", "2024-01-15")]),
        );
        let entries = load_catalog(&location, ARTICLES).unwrap();
        assert_eq!(
            entries,
            vec![CatalogEntry::new("https://builder.aws.com/content/1/euc-a", Some("2024-01-15"))]
        );
    }

    #[test]
    fn index_is_followed_into_article_sitemaps() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp,
            "sitemaps/articles/1.xml",
            &urlset(&[("https://builder.aws.com/content/1/euc-a", "2024-01-01")]),
        );
        write(
            &tmp,
            "sitemaps/articles/2.xml",
            &urlset(&[
                ("https://builder.aws.com/content/2/euc-b", "2024-01-02"),
                ("https://builder.aws.com/content/3/euc-c", "2024-01-03"),
            ]),
        );
        let index = write(
            &tmp,
            "sitemap.xml",
            r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>./sitemaps/articles/1.xml</loc></url>
                <url><loc>./sitemaps/tags.xml</loc></url>
                <url><loc>./sitemaps/articles/2.xml</loc></url>
            </urlset>"#,
        );

        let entries = load_catalog(&index, ARTICLES).unwrap();
        let locs: Vec<_> = entries.iter().filter_map(|e| e.loc.as_deref()).collect();
        assert_eq!(
            locs,
            vec![
                "https://builder.aws.com/content/1/euc-a",
                "https://builder.aws.com/content/2/euc-b",
                "https://builder.aws.com/content/3/euc-c",
            ]
        );
    }

    #[test]
    fn failing_nested_sitemap_is_skipped() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp,
            "sitemaps/articles/1.xml",
            &urlset(&[("https://builder.aws.com/content/1/euc-a", "2024-01-01")]),
        );
        let index = write(
            &tmp,
            "index.xml",
            r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <sitemap><loc>./sitemaps/articles/missing.xml</loc></sitemap>
                <sitemap><loc>./sitemaps/articles/1.xml</loc></sitemap>
            </sitemapindex>"#,
        );
        assert_eq!(load_catalog(&index, ARTICLES).unwrap().len(), 1);
    }

    #[test]
    fn index_fails_when_every_nested_sitemap_fails() {
        let tmp = TempDir::new().unwrap();
        let index = write(
            &tmp,
            "index.xml",
            r#"<sitemapindex><sitemap><loc>./sitemaps/articles/missing.xml</loc></sitemap></sitemapindex>"#,
        );
        let err = load_catalog(&index, ARTICLES).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }

    #[test]
    fn relative_children_resolve_against_local_index() {
        assert_eq!(
            resolve_child("/srv/maps/index.xml", "articles/1.xml"),
            "/srv/maps/articles/1.xml"
        );
        assert_eq!(
            resolve_child("https://x/sitemap.xml", "https://x/sitemaps/articles/1.xml"),
            "https://x/sitemaps/articles/1.xml"
        );
    }

    #[test]
    fn remote_detection() {
        assert!(is_remote("HTTPS://example.com/catalog.json"));
        assert!(!is_remote("/srv/catalog.json"));
    }
}
