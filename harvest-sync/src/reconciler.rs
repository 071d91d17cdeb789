//! Per-document change classification.
//!
//! ## Decision table
//!
//! | stored record | stored `modified_at` vs incoming | outcome     | summary       |
//! |---------------|----------------------------------|-------------|---------------|
//! | absent        | -                                | `Created`   | set to `""`   |
//! | present       | both present and byte-equal      | `Unchanged` | not written   |
//! | present       | anything else                    | `Changed`   | set to `""`   |
//!
//! Comparison is exact inequality, not recency: a backdated timestamp is still
//! a change. An absent value never equals anything, including another absent
//! value.
//!
//! The reconciler only reads the store. The caller applies the returned
//! [`WriteIntent`].

use chrono::{DateTime, Utc};

use harvest_core::{DocumentDescriptor, FieldWrite, PersistedRecord, WriteIntent};

use crate::error::ReconcileError;
use crate::record_store::RecordStore;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Classification of one document in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// No record existed.
    Created { modified_at: Option<String> },
    /// The stored timestamp differs from the catalog's (or either is absent).
    Changed {
        previous: Option<String>,
        current: Option<String>,
    },
    /// Stored and catalog timestamps are present and equal.
    Unchanged { modified_at: String },
}

impl ReconciliationOutcome {
    /// Whether this outcome invalidates the derived summary.
    pub fn needs_summary(&self) -> bool {
        !matches!(self, ReconciliationOutcome::Unchanged { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Created { .. } => "created",
            ReconciliationOutcome::Changed { .. } => "changed",
            ReconciliationOutcome::Unchanged { .. } => "unchanged",
        }
    }

    /// Stored timestamp before this run.
    pub fn previous(&self) -> Option<&str> {
        match self {
            ReconciliationOutcome::Created { .. } => None,
            ReconciliationOutcome::Changed { previous, .. } => previous.as_deref(),
            ReconciliationOutcome::Unchanged { modified_at } => Some(modified_at),
        }
    }

    /// Catalog timestamp seen in this run.
    pub fn current(&self) -> Option<&str> {
        match self {
            ReconciliationOutcome::Created { modified_at } => modified_at.as_deref(),
            ReconciliationOutcome::Changed { current, .. } => current.as_deref(),
            ReconciliationOutcome::Unchanged { modified_at } => Some(modified_at),
        }
    }
}

/// The decision for one document plus the write that implements it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub outcome: ReconciliationOutcome,
    pub intent: WriteIntent,
}

// ---------------------------------------------------------------------------
// reconcile
// ---------------------------------------------------------------------------

/// Classify `descriptor` against its stored record and build the write.
///
/// A store read failure is returned as [`ReconcileError::StoreUnavailable`];
/// the document is not classified.
pub fn reconcile<S>(
    store: &S,
    descriptor: &DocumentDescriptor,
    crawled_at: DateTime<Utc>,
) -> Result<Reconciliation, ReconcileError>
where
    S: RecordStore + ?Sized,
{
    validate(descriptor)?;

    let existing = store
        .get(&descriptor.identity)
        .map_err(|source| ReconcileError::StoreUnavailable {
            identity: descriptor.identity.clone(),
            source,
        })?;

    Ok(match existing {
        None => created(descriptor, crawled_at),
        Some(record) => classify_existing(&record, descriptor, crawled_at),
    })
}

/// `true` only when both timestamps are present and byte-equal.
pub fn timestamps_match(stored: Option<&str>, incoming: Option<&str>) -> bool {
    matches!((stored, incoming), (Some(a), Some(b)) if a == b)
}

fn validate(descriptor: &DocumentDescriptor) -> Result<(), ReconcileError> {
    if descriptor.identity.is_empty() {
        return Err(ReconcileError::MalformedDescriptor {
            reason: format!("empty identity for locator '{}'", descriptor.locator),
        });
    }
    if descriptor.locator.trim().is_empty() {
        return Err(ReconcileError::MalformedDescriptor {
            reason: format!("empty locator for identity '{}'", descriptor.identity),
        });
    }
    Ok(())
}

fn created(descriptor: &DocumentDescriptor, crawled_at: DateTime<Utc>) -> Reconciliation {
    let modified_at = descriptor.modified_at.clone();
    Reconciliation {
        intent: WriteIntent {
            identity: descriptor.identity.clone(),
            locator: descriptor.locator.clone(),
            crawled_at,
            modified_at: overwrite_if_present(&modified_at),
            published_at: overwrite_if_present(&modified_at),
            derived: FieldWrite::Overwrite(descriptor.derived.clone()),
            invalidate_derived: true,
        },
        outcome: ReconciliationOutcome::Created { modified_at },
    }
}

fn classify_existing(
    record: &PersistedRecord,
    descriptor: &DocumentDescriptor,
    crawled_at: DateTime<Utc>,
) -> Reconciliation {
    let previous = record.modified_at.clone();
    let current = descriptor.modified_at.clone();

    if timestamps_match(previous.as_deref(), current.as_deref()) {
        let modified_at = current.unwrap_or_default();
        return Reconciliation {
            intent: WriteIntent {
                identity: descriptor.identity.clone(),
                locator: descriptor.locator.clone(),
                crawled_at,
                modified_at: FieldWrite::Keep,
                published_at: FieldWrite::FillIfMissing(modified_at.clone()),
                derived: FieldWrite::FillIfMissing(descriptor.derived.clone()),
                invalidate_derived: false,
            },
            outcome: ReconciliationOutcome::Unchanged { modified_at },
        };
    }

    Reconciliation {
        intent: WriteIntent {
            identity: descriptor.identity.clone(),
            locator: descriptor.locator.clone(),
            crawled_at,
            modified_at: overwrite_if_present(&current),
            published_at: current
                .clone()
                .map_or(FieldWrite::Keep, FieldWrite::FillIfMissing),
            derived: FieldWrite::Overwrite(descriptor.derived.clone()),
            invalidate_derived: true,
        },
        outcome: ReconciliationOutcome::Changed { previous, current },
    }
}

fn overwrite_if_present(value: &Option<String>) -> FieldWrite<String> {
    value.clone().map_or(FieldWrite::Keep, FieldWrite::Overwrite)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::{DerivedFields, Identity};
    use rstest::rstest;
    use tempfile::TempDir;

    use crate::error::StoreError;
    use crate::record_store::JsonRecordStore;

    fn fields() -> DerivedFields {
        DerivedFields {
            title: "T".to_string(),
            authors: "AWS Builder Community".to_string(),
            tags: "End User Computing".to_string(),
            content: "placeholder".to_string(),
            source: "builder.aws.com".to_string(),
        }
    }

    fn descriptor(id: &str, modified_at: Option<&str>) -> DocumentDescriptor {
        DocumentDescriptor {
            identity: Identity::from(id),
            locator: format!("https://builder.aws.com/content/{id}"),
            modified_at: modified_at.map(str::to_string),
            derived: fields(),
        }
    }

    /// Store holding one record for `id`; `modified_at: None` seeds a legacy row.
    fn store_with(id: &str, modified_at: Option<&str>) -> (TempDir, JsonRecordStore) {
        let tmp = TempDir::new().unwrap();
        let store = JsonRecordStore::open(tmp.path().join("posts.json")).unwrap();
        let intent = WriteIntent {
            identity: Identity::from(id),
            locator: format!("https://builder.aws.com/content/{id}"),
            crawled_at: Utc::now(),
            modified_at: overwrite_if_present(&modified_at.map(str::to_string)),
            published_at: FieldWrite::Keep,
            derived: FieldWrite::Keep,
            invalidate_derived: false,
        };
        store.upsert(&intent).unwrap();
        (tmp, store)
    }

    struct UnreachableStore;

    impl RecordStore for UnreachableStore {
        fn get(&self, identity: &Identity) -> Result<Option<PersistedRecord>, StoreError> {
            Err(StoreError::Rejected {
                identity: identity.clone(),
                reason: "throttled".to_string(),
            })
        }

        fn upsert(&self, _intent: &WriteIntent) -> Result<(), StoreError> {
            unreachable!("reconcile never writes")
        }
    }

    #[rstest]
    #[case::equal(Some("2024-01-15"), Some("2024-01-15"), true)]
    #[case::newer(Some("2024-01-15"), Some("2024-01-20"), false)]
    #[case::backdated(Some("2024-01-20"), Some("2024-01-15"), false)]
    #[case::stored_missing(None, Some("2024-01-15"), false)]
    #[case::incoming_missing(Some("2024-01-15"), None, false)]
    #[case::both_missing(None, None, false)]
    #[case::format_differs(Some("2024-01-15"), Some("2024-01-15T00:00:00Z"), false)]
    fn exact_match_policy(
        #[case] stored: Option<&str>,
        #[case] incoming: Option<&str>,
        #[case] unchanged: bool,
    ) {
        assert_eq!(timestamps_match(stored, incoming), unchanged);

        let (_tmp, store) = store_with("x", stored);
        let result = reconcile(&store, &descriptor("x", incoming), Utc::now()).unwrap();
        match result.outcome {
            ReconciliationOutcome::Unchanged { .. } => assert!(unchanged),
            ReconciliationOutcome::Changed { .. } => assert!(!unchanged),
            ReconciliationOutcome::Created { .. } => panic!("record was seeded"),
        }
        assert_eq!(result.intent.invalidate_derived, !unchanged);
    }

    #[test]
    fn missing_record_is_created_with_pending_summary() {
        let tmp = TempDir::new().unwrap();
        let store = JsonRecordStore::open(tmp.path().join("posts.json")).unwrap();
        let result = reconcile(&store, &descriptor("a", Some("2024-01-15")), Utc::now()).unwrap();

        assert_eq!(
            result.outcome,
            ReconciliationOutcome::Created {
                modified_at: Some("2024-01-15".to_string())
            }
        );
        assert!(result.intent.invalidate_derived);
        assert_eq!(
            result.intent.modified_at,
            FieldWrite::Overwrite("2024-01-15".to_string())
        );
        assert_eq!(result.intent.derived, FieldWrite::Overwrite(fields()));
    }

    #[test]
    fn unchanged_intent_never_touches_timestamp_or_summary() {
        let (_tmp, store) = store_with("b", Some("2024-01-15"));
        let result = reconcile(&store, &descriptor("b", Some("2024-01-15")), Utc::now()).unwrap();
        assert!(result.intent.modified_at.is_keep());
        assert!(!result.intent.invalidate_derived);
        assert!(!result.outcome.needs_summary());
    }

    #[test]
    fn reconcile_does_not_write() {
        let tmp = TempDir::new().unwrap();
        let store = JsonRecordStore::open(tmp.path().join("posts.json")).unwrap();
        reconcile(&store, &descriptor("a", Some("2024-01-15")), Utc::now()).unwrap();
        assert!(store.get(&Identity::from("a")).unwrap().is_none());
    }

    #[test]
    fn store_failure_is_not_classified() {
        let err = reconcile(&UnreachableStore, &descriptor("a", Some("2024-01-15")), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::StoreUnavailable { .. }));
    }

    #[test]
    fn empty_identity_is_malformed() {
        let err = reconcile(&UnreachableStore, &descriptor("", Some("2024-01-15")), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedDescriptor { .. }));
    }

    #[test]
    fn outcome_exposes_both_timestamps() {
        let outcome = ReconciliationOutcome::Changed {
            previous: None,
            current: Some("2024-02-01".to_string()),
        };
        assert_eq!(outcome.previous(), None);
        assert_eq!(outcome.current(), Some("2024-02-01"));
        assert_eq!(outcome.label(), "changed");
    }
}
