//! Template context: serializable rendering payload for one document.

use serde::{Deserialize, Serialize};

use harvest_core::HarvestConfig;

use crate::error::RenderError;
use crate::slug::title_from_slug;

/// Inputs for the field templates.
///
/// Holds nothing time-varying: no crawl timestamps, no catalog dates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsContext {
    pub locator: String,
    pub title: String,
    pub authors: String,
    pub tags: String,
    /// Source label stored on the record, e.g. `builder.aws.com`.
    pub source: String,
    /// Display name used in prose, e.g. `Builder.AWS`.
    pub site_name: String,
}

impl FieldsContext {
    pub fn new(locator: &str, config: &HarvestConfig) -> Self {
        Self {
            locator: locator.to_string(),
            title: title_from_slug(locator),
            authors: config.default_authors.clone(),
            tags: config.tags.clone(),
            source: config.source_label.clone(),
            site_name: site_name(&config.source_label),
        }
    }

    pub fn to_tera(&self) -> Result<tera::Context, RenderError> {
        Ok(tera::Context::from_serialize(self)?)
    }
}

/// `builder.aws.com` → `Builder.AWS`; drops the TLD and capitalises labels.
fn site_name(source: &str) -> String {
    let mut labels: Vec<&str> = source.split('.').filter(|l| !l.is_empty()).collect();
    if labels.len() > 1 {
        labels.pop();
    }
    labels
        .into_iter()
        .map(|label| {
            if label.len() <= 3 {
                label.to_ascii_uppercase()
            } else {
                let mut chars = label.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
