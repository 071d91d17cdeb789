//! Tera rendering engine: [`Renderer`].
//!
//! | Field     | Source                                  |
//! |-----------|-----------------------------------------|
//! | `title`   | URL slug ([`crate::title_from_slug`])   |
//! | `authors` | config `default_authors`                |
//! | `tags`    | `fields/tags.tera`                      |
//! | `content` | `fields/content.tera`                   |
//! | `source`  | config `source_label`                   |
//!
//! A `.tera` file with the same name under a user template directory replaces
//! the embedded template.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use harvest_core::DerivedFields;

use crate::context::FieldsContext;
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const CONTENT_TEMPLATE: &str = "fields/content.tera";
const TAGS_TEMPLATE: &str = "fields/tags.tera";

const TPLS: &[(&str, &str)] = &[
    (CONTENT_TEMPLATE, include_str!("templates/content.tera")),
    (TAGS_TEMPLATE, include_str!("templates/tags.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    files.sort();
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(
            normalize_template_name(Path::new(name)),
            (*content).to_string(),
        );
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.autoescape_on(vec![]);
    let items: Vec<(String, String)> = templates.into_iter().collect();
    tera.add_raw_templates(items)?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Renders [`DerivedFields`] for a document.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Renderer over the embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Self { tera: build_tera(None)? })
    }

    /// Renderer whose embedded templates may be replaced by `.tera` files in
    /// `dir` (e.g. `<dir>/fields/content.tera`). A missing `dir` is ignored.
    pub fn with_user_templates(dir: &Path) -> Result<Self, RenderError> {
        Ok(Self { tera: build_tera(Some(dir))? })
    }

    /// Render all templated fields for one document.
    pub fn render(&self, ctx: &FieldsContext) -> Result<DerivedFields, RenderError> {
        let tera_ctx = ctx.to_tera()?;
        let content = self.tera.render(CONTENT_TEMPLATE, &tera_ctx)?;
        let tags = self.tera.render(TAGS_TEMPLATE, &tera_ctx)?;
        Ok(DerivedFields {
            title: ctx.title.clone(),
            authors: ctx.authors.clone(),
            tags: tags.trim().to_string(),
            content: content.trim().to_string(),
            source: ctx.source.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::HarvestConfig;
    use tempfile::TempDir;

    fn ctx(locator: &str) -> FieldsContext {
        FieldsContext::new(locator, &HarvestConfig::default())
    }

    #[test]
    fn embedded_content_mentions_site() {
        let renderer = Renderer::new().unwrap();
        let fields = renderer
            .render(&ctx("https://builder.aws.com/content/1/appstream-tips"))
            .unwrap();
        assert_eq!(
            fields.content,
            "Builder.AWS article. Visit the full article on Builder.AWS for detailed information and insights."
        );
        assert_eq!(fields.tags, "End User Computing, Builder.AWS");
        assert_eq!(fields.title, "AppStream Tips");
    }

    #[test]
    fn user_template_overrides_embedded() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("fields")).unwrap();
        std::fs::write(
            dir.path().join("fields").join("content.tera"),
            "Read {{ title }} on {{ source }}.",
        )
        .unwrap();

        let renderer = Renderer::with_user_templates(dir.path()).unwrap();
        let fields = renderer.render(&ctx("https://x/vdi-basics")).unwrap();
        assert_eq!(fields.content, "Read VDI Basics on builder.aws.com.");
    }

    #[test]
    fn missing_user_dir_falls_back_to_embedded() {
        let dir = TempDir::new().unwrap();
        let renderer = Renderer::with_user_templates(&dir.path().join("absent")).unwrap();
        assert!(renderer.render(&ctx("https://x/euc")).is_ok());
    }
}
