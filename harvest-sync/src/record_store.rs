//! Record store: the persistence boundary keyed by document identity.
//!
//! [`JsonRecordStore`] keeps every record in memory and persists a
//! `StoreFile` JSON document with the same atomic `.tmp` + rename pattern as
//! the config file. Writes between [`JsonRecordStore::open`] and
//! [`JsonRecordStore::save`] are visible to `get` immediately.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harvest_core::{HarvestConfig, Identity, PersistedRecord, WriteIntent};

use crate::error::{io_err, StoreError};

/// Get-by-key and partial-field upsert.
///
/// Implementations must leave fields the intent does not name untouched; the
/// unchanged path depends on it to preserve `summary`.
pub trait RecordStore: Send + Sync {
    fn get(&self, identity: &Identity) -> Result<Option<PersistedRecord>, StoreError>;

    fn upsert(&self, intent: &WriteIntent) -> Result<(), StoreError>;
}

/// On-disk store payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFile {
    pub saved_at: DateTime<Utc>,
    pub records: Vec<PersistedRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoreCompat {
    Structured(StoreStructuredCompat),
    Legacy(Vec<PersistedRecord>),
}

#[derive(Debug, Deserialize)]
struct StoreStructuredCompat {
    pub saved_at: Option<DateTime<Utc>>,
    pub records: Vec<PersistedRecord>,
}

/// Aggregate view used by `harvest status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub records: usize,
    pub pending_summary: usize,
    pub unclassified: usize,
    pub legacy: usize,
    pub saved_at: Option<DateTime<Utc>>,
}

/// File-backed store. Cheap to share across worker threads by reference.
///
/// `upsert` only changes the in-memory map. Nothing reaches disk until
/// [`JsonRecordStore::save`], so a run interrupted before saving loses all of
/// its writes and the next run classifies those documents again.
#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    saved_at: Option<DateTime<Utc>>,
    records: Mutex<BTreeMap<Identity, PersistedRecord>>,
}

impl JsonRecordStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let (saved_at, records) = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            match serde_json::from_str::<StoreCompat>(&contents)? {
                StoreCompat::Structured(file) => (file.saved_at, file.records),
                StoreCompat::Legacy(records) => (None, records),
            }
        } else {
            (None, Vec::new())
        };

        let records = records
            .into_iter()
            .map(|r| (r.identity.clone(), r))
            .collect();
        Ok(Self {
            path,
            saved_at,
            records: Mutex::new(records),
        })
    }

    /// Open the store selected by `config` under `home`.
    pub fn open_at(home: &Path, config: &HarvestConfig) -> Result<Self, StoreError> {
        Self::open(config.store_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the store file was last written, if ever.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }

    /// Save atomically: write `<path>.tmp` then rename to `<path>`.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid record store path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let file = StoreFile {
            saved_at: Utc::now(),
            records: self.records()?,
        };
        let json = serde_json::to_string_pretty(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        Ok(())
    }

    /// Snapshot of every record, sorted by identity.
    pub fn records(&self) -> Result<Vec<PersistedRecord>, StoreError> {
        Ok(self.lock()?.values().cloned().collect())
    }

    /// Records the downstream summarizer should pick up, sorted by identity.
    pub fn pending_summary(&self) -> Result<Vec<PersistedRecord>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .filter(|r| r.needs_summary())
            .cloned()
            .collect())
    }

    pub fn summary(&self) -> Result<StoreSummary, StoreError> {
        let records = self.lock()?;
        Ok(StoreSummary {
            records: records.len(),
            pending_summary: records.values().filter(|r| r.needs_summary()).count(),
            unclassified: records.values().filter(|r| r.needs_classification()).count(),
            legacy: records.values().filter(|r| r.is_legacy()).count(),
            saved_at: self.saved_at,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<Identity, PersistedRecord>>, StoreError> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl RecordStore for JsonRecordStore {
    fn get(&self, identity: &Identity) -> Result<Option<PersistedRecord>, StoreError> {
        Ok(self.lock()?.get(identity).cloned())
    }

    fn upsert(&self, intent: &WriteIntent) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        match records.get_mut(&intent.identity) {
            Some(record) => record.apply(intent),
            None => {
                records.insert(intent.identity.clone(), PersistedRecord::create_from(intent));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::FieldWrite;
    use tempfile::TempDir;

    fn intent(id: &str) -> WriteIntent {
        WriteIntent {
            identity: Identity::from(id),
            locator: format!("https://x/{id}"),
            crawled_at: Utc::now(),
            modified_at: FieldWrite::Overwrite("2024-01-15".to_string()),
            published_at: FieldWrite::Keep,
            derived: FieldWrite::Keep,
            invalidate_derived: true,
        }
    }

    #[test]
    fn empty_store_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let store = JsonRecordStore::open(tmp.path().join("posts.json")).unwrap();
        assert!(store.records().unwrap().is_empty());
        assert!(store.saved_at().is_none());
    }

    #[test]
    fn save_then_reopen_keeps_records() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store").join("posts.json");
        let store = JsonRecordStore::open(&path).unwrap();
        store.upsert(&intent("builder-a")).unwrap();
        store.upsert(&intent("builder-b")).unwrap();
        store.save().unwrap();

        let reopened = JsonRecordStore::open(&path).unwrap();
        let ids: Vec<_> = reopened
            .records()
            .unwrap()
            .into_iter()
            .map(|r| r.identity.0)
            .collect();
        assert_eq!(ids, vec!["builder-a", "builder-b"]);
        assert!(reopened.saved_at().is_some());
    }

    #[test]
    fn writes_are_durable_only_after_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("posts.json");
        let store = JsonRecordStore::open(&path).unwrap();
        store.upsert(&intent("builder-a")).unwrap();
        assert_eq!(store.records().unwrap().len(), 1);

        let unsaved = JsonRecordStore::open(&path).unwrap();
        assert!(unsaved.records().unwrap().is_empty());
        assert!(!path.exists());

        store.save().unwrap();
        let saved = JsonRecordStore::open(&path).unwrap();
        assert_eq!(saved.records().unwrap().len(), 1);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("posts.json");
        let store = JsonRecordStore::open(&path).unwrap();
        store.save().unwrap();
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn legacy_array_file_loads_without_saved_at() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("posts.json");
        std::fs::write(
            &path,
            r#"[{"identity":"builder-d","locator":"https://x/d","summary":"old"}]"#,
        )
        .unwrap();

        let store = JsonRecordStore::open(&path).unwrap();
        let record = store.get(&Identity::from("builder-d")).unwrap().unwrap();
        assert!(record.modified_at.is_none());
        assert_eq!(record.summary.as_deref(), Some("old"));
        assert!(store.saved_at().is_none());
    }

    #[test]
    fn corrupt_file_fails_to_open() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("posts.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonRecordStore::open(&path),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn summary_counts_pending_and_legacy() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("posts.json");
        std::fs::write(
            &path,
            r#"{"saved_at":"2024-01-01T00:00:00Z","records":[
                {"identity":"a","modified_at":"2024-01-01","summary":"done",
                 "classification":{"label":"How-To","confidence":80}},
                {"identity":"b","modified_at":"2024-01-01","summary":""},
                {"identity":"c","summary":"legacy"}
            ]}"#,
        )
        .unwrap();

        let store = JsonRecordStore::open(&path).unwrap();
        let summary = store.summary().unwrap();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.pending_summary, 1);
        assert_eq!(summary.unclassified, 2);
        assert_eq!(summary.legacy, 1);
        assert!(summary.saved_at.is_some());

        let pending = store.pending_summary().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].identity.as_str(), "b");
    }
}
