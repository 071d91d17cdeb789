//! Domain types for ingestion reconciliation.
//!
//! Optional record fields are real `Option`s so that "absent", "present but
//! empty" and "present" stay distinguishable after a serde round trip. Legacy
//! rows written before a field existed deserialize with that field as `None`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable record key derived from a document's canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Templated content carried into a record on create and on confirmed change.
///
/// Never used as a change signal; only `modified_at` is compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFields {
    pub title: String,
    pub authors: String,
    pub tags: String,
    pub content: String,
    pub source: String,
}

/// A document discovered in the current run's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDescriptor {
    pub identity: Identity,
    pub locator: String,
    /// Catalog modification time; the discovery source fills absent values
    /// with wall-clock time before the descriptor reaches the reconciler.
    pub modified_at: Option<String>,
    pub derived: DerivedFields,
}

// ---------------------------------------------------------------------------
// Persisted record
// ---------------------------------------------------------------------------

/// Downstream classifier output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    #[serde(default)]
    pub confidence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// One stored document, keyed by `identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub identity: Identity,
    #[serde(default)]
    pub locator: String,
    /// Last-seen catalog modification time. `None` on legacy rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedFields>,
    /// `Some("")` marks the summary as pending regeneration; `None` means it
    /// was never written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_crawled_at: Option<DateTime<Utc>>,
}

impl PersistedRecord {
    /// Build a brand-new record from the intent of a first sighting.
    pub fn create_from(intent: &WriteIntent) -> Self {
        let mut record = PersistedRecord {
            identity: intent.identity.clone(),
            locator: String::new(),
            modified_at: None,
            published_at: None,
            derived: None,
            summary: None,
            classification: None,
            first_seen_at: Some(intent.crawled_at),
            last_crawled_at: None,
        };
        record.apply(intent);
        record
    }

    /// Apply a partial update. Fields the intent leaves as [`FieldWrite::Keep`]
    /// are not touched, and `summary` is only written when the intent
    /// invalidates derived artifacts.
    pub fn apply(&mut self, intent: &WriteIntent) {
        self.locator = intent.locator.clone();
        self.last_crawled_at = Some(intent.crawled_at);
        self.first_seen_at.get_or_insert(intent.crawled_at);
        intent.modified_at.apply_to(&mut self.modified_at);
        intent.published_at.apply_to(&mut self.published_at);
        intent.derived.apply_to(&mut self.derived);
        if intent.invalidate_derived {
            self.summary = Some(String::new());
            self.classification = None;
        }
    }

    /// True when the downstream summarizer should pick this record up.
    pub fn needs_summary(&self) -> bool {
        self.summary.as_deref().map_or(true, str::is_empty)
    }

    pub fn needs_classification(&self) -> bool {
        self.classification
            .as_ref()
            .map_or(true, |c| c.label.is_empty())
    }

    /// Rows written before `modified_at` was tracked.
    pub fn is_legacy(&self) -> bool {
        self.modified_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Write intent
// ---------------------------------------------------------------------------

/// How a single optional field is written by an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWrite<T> {
    /// Leave the stored value as it is.
    Keep,
    /// Replace the stored value.
    Overwrite(T),
    /// Write only when the stored value is absent.
    FillIfMissing(T),
}

impl<T: Clone> FieldWrite<T> {
    pub fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            FieldWrite::Keep => {}
            FieldWrite::Overwrite(value) => *slot = Some(value.clone()),
            FieldWrite::FillIfMissing(value) => {
                if slot.is_none() {
                    *slot = Some(value.clone());
                }
            }
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldWrite::Keep)
    }
}

/// The exact set of fields one reconciliation decides to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteIntent {
    pub identity: Identity,
    pub locator: String,
    /// Bookkeeping timestamp, written on every path.
    pub crawled_at: DateTime<Utc>,
    pub modified_at: FieldWrite<String>,
    pub published_at: FieldWrite<String>,
    pub derived: FieldWrite<DerivedFields>,
    /// Clear `summary` to `""` and drop the classification.
    pub invalidate_derived: bool,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: &str) -> DerivedFields {
        DerivedFields {
            title: title.to_string(),
            authors: "AWS Builder Community".to_string(),
            tags: "End User Computing".to_string(),
            content: "placeholder".to_string(),
            source: "builder.aws.com".to_string(),
        }
    }

    fn intent(modified_at: FieldWrite<String>, invalidate: bool) -> WriteIntent {
        WriteIntent {
            identity: Identity::from("builder-x"),
            locator: "https://example.com/articles/x".to_string(),
            crawled_at: Utc::now(),
            modified_at,
            published_at: FieldWrite::Keep,
            derived: FieldWrite::Keep,
            invalidate_derived: invalidate,
        }
    }

    fn summarized_record() -> PersistedRecord {
        PersistedRecord {
            identity: Identity::from("builder-x"),
            locator: "https://example.com/articles/x".to_string(),
            modified_at: Some("2024-01-15".to_string()),
            published_at: Some("2024-01-01".to_string()),
            derived: Some(fields("X")),
            summary: Some("old summary".to_string()),
            classification: Some(Classification {
                label: "How-To".to_string(),
                confidence: 90,
                generated_at: None,
            }),
            first_seen_at: None,
            last_crawled_at: None,
        }
    }

    #[test]
    fn identity_display_and_emptiness() {
        assert_eq!(Identity::from("builder-a").to_string(), "builder-a");
        assert!(Identity::from("  ").is_empty());
        assert!(!Identity::from("a").is_empty());
    }

    #[test]
    fn keep_leaves_summary_and_timestamp_untouched() {
        let mut record = summarized_record();
        record.apply(&intent(FieldWrite::Keep, false));
        assert_eq!(record.summary.as_deref(), Some("old summary"));
        assert_eq!(record.modified_at.as_deref(), Some("2024-01-15"));
        assert!(record.classification.is_some());
        assert!(record.last_crawled_at.is_some());
    }

    #[test]
    fn invalidate_clears_summary_and_classification() {
        let mut record = summarized_record();
        record.apply(&intent(FieldWrite::Overwrite("2024-01-20".to_string()), true));
        assert_eq!(record.summary.as_deref(), Some(""));
        assert!(record.classification.is_none());
        assert_eq!(record.modified_at.as_deref(), Some("2024-01-20"));
        assert!(record.needs_summary());
        assert!(record.needs_classification());
    }

    #[test]
    fn fill_if_missing_only_fills_holes() {
        let mut present = Some("kept".to_string());
        FieldWrite::FillIfMissing("new".to_string()).apply_to(&mut present);
        assert_eq!(present.as_deref(), Some("kept"));

        let mut absent: Option<String> = None;
        FieldWrite::FillIfMissing("new".to_string()).apply_to(&mut absent);
        assert_eq!(absent.as_deref(), Some("new"));
    }

    #[test]
    fn create_from_sets_first_seen_and_pending_summary() {
        let mut create = intent(FieldWrite::Overwrite("2024-01-15".to_string()), true);
        create.derived = FieldWrite::Overwrite(fields("A"));
        let record = PersistedRecord::create_from(&create);
        assert_eq!(record.first_seen_at, Some(create.crawled_at));
        assert_eq!(record.summary.as_deref(), Some(""));
        assert_eq!(record.derived, Some(fields("A")));
    }

    #[test]
    fn legacy_json_without_modified_at_deserializes_as_none() {
        let json = r#"{"identity":"builder-d","locator":"https://x/d","summary":"s"}"#;
        let record: PersistedRecord = serde_json::from_str(json).expect("parse");
        assert!(record.modified_at.is_none());
        assert!(record.is_legacy());
        assert!(!record.needs_summary());
    }

    #[test]
    fn empty_and_absent_summary_stay_distinct() {
        let pending: PersistedRecord =
            serde_json::from_str(r#"{"identity":"a","summary":""}"#).expect("parse");
        let never: PersistedRecord = serde_json::from_str(r#"{"identity":"a"}"#).expect("parse");
        assert_eq!(pending.summary.as_deref(), Some(""));
        assert_eq!(never.summary, None);
        assert!(pending.needs_summary() && never.needs_summary());

        let back = serde_json::to_string(&pending).expect("serialize");
        assert!(back.contains(r#""summary":"""#));
    }
}
