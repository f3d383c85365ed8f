//! Record store and file catalog seams
//!
//! Persistent storage proper (schema, migrations, CRUD) is an external
//! collaborator; the engine only needs these narrow contracts. Two
//! implementations ship: an in-memory store for tests and a JSON-file store
//! for the CLI. Backups follow the single-slot rule: at most one live backup
//! per record, latest wins, consumed on restore.

use crate::error::{EngineError, Result};
use arca_core::domain::{CuratedRecord, MetadataBackup, RecordStatus};
use arca_core::version::compare_version_labels;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Role of a file registered in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    /// The record's primary data file
    Main,
    /// A file derived by a pipeline step
    Derived,
}

/// Local store of curated records and their metadata backups
pub trait RecordStore: Send + Sync {
    fn get(&self, record_id: &str) -> Result<CuratedRecord>;

    fn save(&self, record: &CuratedRecord) -> Result<()>;

    /// Stores a backup, overwriting any prior unused backup for the record
    fn save_backup(&self, backup: &MetadataBackup) -> Result<()>;

    /// Removes and returns the record's backup, if one exists
    fn take_backup(&self, record_id: &str) -> Result<Option<MetadataBackup>>;

    /// The most recent published record for a concept id, if any
    fn find_latest_published(&self, concept_id: &str) -> Result<Option<CuratedRecord>>;
}

/// External file catalog: step outputs and version-sync uploads register here
pub trait FileCatalog: Send + Sync {
    fn register(&self, path: &Path, role: FileRole, record_id: Option<&str>) -> Result<()>;
}

// =============================================================================
// In-memory implementations
// =============================================================================

/// Mutex-guarded in-memory store
#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<HashMap<String, CuratedRecord>>,
    backups: Mutex<HashMap<String, MetadataBackup>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for InMemoryStore {
    fn get(&self, record_id: &str) -> Result<CuratedRecord> {
        self.records
            .lock()
            .unwrap()
            .get(record_id)
            .cloned()
            .ok_or_else(|| EngineError::RecordNotFound(record_id.to_string()))
    }

    fn save(&self, record: &CuratedRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn save_backup(&self, backup: &MetadataBackup) -> Result<()> {
        self.backups
            .lock()
            .unwrap()
            .insert(backup.record_id.clone(), backup.clone());
        Ok(())
    }

    fn take_backup(&self, record_id: &str) -> Result<Option<MetadataBackup>> {
        Ok(self.backups.lock().unwrap().remove(record_id))
    }

    fn find_latest_published(&self, concept_id: &str) -> Result<Option<CuratedRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .values()
            .filter(|r| {
                r.status == RecordStatus::Published && r.concept_id.as_deref() == Some(concept_id)
            })
            .max_by(|a, b| compare_version_labels(&a.version, &b.version))
            .cloned())
    }
}

/// Catalog that only records registrations in memory (tests, dry runs)
#[derive(Default)]
pub struct InMemoryCatalog {
    entries: Mutex<Vec<CatalogEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl FileCatalog for InMemoryCatalog {
    fn register(&self, path: &Path, role: FileRole, record_id: Option<&str>) -> Result<()> {
        self.entries.lock().unwrap().push(CatalogEntry {
            path: path.to_path_buf(),
            role,
            record_id: record_id.map(String::from),
            registered_at: chrono::Utc::now(),
        });
        Ok(())
    }
}

/// One catalog registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub path: PathBuf,
    pub role: FileRole,
    pub record_id: Option<String>,
    pub registered_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// JSON-file implementations
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonStoreState {
    records: HashMap<String, CuratedRecord>,
    backups: HashMap<String, MetadataBackup>,
}

/// Record store backed by a single JSON file, written atomically
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<JsonStoreState>,
}

impl JsonStore {
    /// Opens (or creates) a store at the given path
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => JsonStoreState::default(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn persist(&self, state: &JsonStoreState) -> Result<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl RecordStore for JsonStore {
    fn get(&self, record_id: &str) -> Result<CuratedRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(record_id)
            .cloned()
            .ok_or_else(|| EngineError::RecordNotFound(record_id.to_string()))
    }

    fn save(&self, record: &CuratedRecord) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.records.insert(record.id.clone(), record.clone());
        self.persist(&state)
    }

    fn save_backup(&self, backup: &MetadataBackup) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.backups.insert(backup.record_id.clone(), backup.clone());
        self.persist(&state)
    }

    fn take_backup(&self, record_id: &str) -> Result<Option<MetadataBackup>> {
        let mut state = self.state.lock().unwrap();
        let backup = state.backups.remove(record_id);
        if backup.is_some() {
            self.persist(&state)?;
        }
        Ok(backup)
    }

    fn find_latest_published(&self, concept_id: &str) -> Result<Option<CuratedRecord>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .values()
            .filter(|r| {
                r.status == RecordStatus::Published && r.concept_id.as_deref() == Some(concept_id)
            })
            .max_by(|a, b| compare_version_labels(&a.version, &b.version))
            .cloned())
    }
}

/// File catalog appending registrations to a JSON file
pub struct JsonCatalog {
    path: PathBuf,
    entries: Mutex<Vec<CatalogEntry>>,
}

impl JsonCatalog {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }
}

impl FileCatalog for JsonCatalog {
    fn register(&self, path: &Path, role: FileRole, record_id: Option<&str>) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.push(CatalogEntry {
            path: path.to_path_buf(),
            role,
            record_id: record_id.map(String::from),
            registered_at: chrono::Utc::now(),
        });
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&*entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backup_single_slot_latest_wins() {
        let store = InMemoryStore::new();
        let mut record = CuratedRecord::new("r1");
        record.metadata = serde_json::json!({"title": "first"});
        store.save_backup(&MetadataBackup::of(&record)).unwrap();

        record.metadata = serde_json::json!({"title": "second"});
        store.save_backup(&MetadataBackup::of(&record)).unwrap();

        let backup = store.take_backup("r1").unwrap().unwrap();
        assert_eq!(backup.metadata["title"], "second");
        // Consumed: a second take finds nothing
        assert!(store.take_backup("r1").unwrap().is_none());
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = JsonStore::open(&path).unwrap();
            let mut record = CuratedRecord::new("r1");
            record.title = "Survey".to_string();
            record.status = RecordStatus::Prepared;
            store.save(&record).unwrap();
        }

        let store = JsonStore::open(&path).unwrap();
        let record = store.get("r1").unwrap();
        assert_eq!(record.title, "Survey");
        assert_eq!(record.status, RecordStatus::Prepared);
        assert!(matches!(
            store.get("missing"),
            Err(EngineError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_find_latest_published_by_concept() {
        let store = InMemoryStore::new();
        for (id, version, status) in [
            ("r1", "0.0.1", RecordStatus::Published),
            ("r2", "0.0.2", RecordStatus::Published),
            ("r3", "0.0.3", RecordStatus::Draft),
        ] {
            let mut record = CuratedRecord::new(id);
            record.concept_id = Some("c1".to_string());
            record.version = version.to_string();
            record.status = status;
            store.save(&record).unwrap();
        }

        let latest = store.find_latest_published("c1").unwrap().unwrap();
        assert_eq!(latest.id, "r2");
        assert!(store.find_latest_published("c2").unwrap().is_none());
    }

    #[test]
    fn test_latest_published_orders_versions_numerically() {
        // Lexicographic order would put 0.0.9 above 0.0.10
        let store = InMemoryStore::new();
        for (id, version) in [("r1", "0.0.9"), ("r2", "0.0.10")] {
            let mut record = CuratedRecord::new(id);
            record.concept_id = Some("c1".to_string());
            record.version = version.to_string();
            record.status = RecordStatus::Published;
            store.save(&record).unwrap();
        }

        let latest = store.find_latest_published("c1").unwrap().unwrap();
        assert_eq!(latest.id, "r2");
        assert_eq!(latest.version, "0.0.10");
    }

    #[test]
    fn test_json_catalog_appends_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");

        {
            let catalog = JsonCatalog::open(&path).unwrap();
            catalog
                .register(Path::new("/data/a.csv"), FileRole::Main, Some("r1"))
                .unwrap();
        }

        let catalog = JsonCatalog::open(&path).unwrap();
        catalog
            .register(Path::new("/data/b.csv"), FileRole::Derived, Some("r1"))
            .unwrap();

        let entries: Vec<CatalogEntry> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].role, FileRole::Derived);
    }
}
