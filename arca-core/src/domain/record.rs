//! Curated record and lifecycle state types
//!
//! A record moves through none -> prepared -> draft -> published (or back to
//! prepared via discard). Published records can spawn a new draft version
//! sharing the same concept id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Lifecycle state of a curated record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    None,
    Prepared,
    Draft,
    Published,
    Discarded,
}

/// A locally-managed record and its remote deposition state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratedRecord {
    /// Local record id
    pub id: String,
    /// Stable identifier shared by all versions of the same logical record;
    /// assigned by the remote service on first draft
    pub concept_id: Option<String>,
    /// Denormalized from the metadata blob for listing and backup/restore
    pub title: String,
    /// Denormalized version label, advanced only by the versioning transition
    pub version: String,
    pub status: RecordStatus,
    /// Full metadata blob sent to (and confirmed by) the remote service
    pub metadata: serde_json::Value,
    /// Remote-assigned deposition id, present once drafted
    pub remote_id: Option<String>,
    pub doi: Option<String>,
    /// Action links from the most recent remote response; every lifecycle
    /// action resolves its URL from here, never from a template
    #[serde(default)]
    pub links: HashMap<String, String>,
    /// Per-file upload status, tracked independently
    #[serde(default)]
    pub files: Vec<UploadedFile>,
}

impl CuratedRecord {
    /// Creates an empty record with no lifecycle history
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            concept_id: None,
            title: String::new(),
            version: String::new(),
            status: RecordStatus::None,
            metadata: serde_json::Value::Null,
            remote_id: None,
            doi: None,
            links: HashMap::new(),
            files: Vec::new(),
        }
    }

    /// Looks up an action link by name from the latest remote response
    pub fn link(&self, name: &str) -> Option<&str> {
        self.links.get(name).map(String::as_str)
    }

    /// Clears all remote-assigned state (used by discard/restore)
    pub fn clear_remote_state(&mut self) {
        self.remote_id = None;
        self.doi = None;
        self.links.clear();
        self.files.clear();
    }
}

/// Upload state of a single file attached to a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub path: PathBuf,
    pub status: UploadStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Uploaded,
    Failed,
}

/// Snapshot of a record's metadata taken before a mutating lifecycle action
///
/// At most one backup exists per record (latest wins); restore consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataBackup {
    pub record_id: String,
    pub metadata: serde_json::Value,
    pub title: String,
    pub version: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl MetadataBackup {
    /// Snapshots a record's current metadata and denormalized fields
    pub fn of(record: &CuratedRecord) -> Self {
        Self {
            record_id: record.id.clone(),
            metadata: record.metadata.clone(),
            title: record.title.clone(),
            version: record.version.clone(),
            created_at: chrono::Utc::now(),
        }
    }
}
