//! Record lifecycle manager
//!
//! Drives a curated record through prepared -> draft -> uploaded ->
//! published, or back to prepared via discard, with backup/restore
//! compensation. Every action that will overwrite the record's metadata
//! first snapshots it as the record's sole backup; discard restores and
//! consumes that backup.
//!
//! All remote actions resolve their URL from the `links` map of the most
//! recently stored response; link availability depends on the record's
//! current remote state, so URLs are never constructed from templates.

use crate::error::{EngineError, Result};
use crate::store::{FileCatalog, FileRole, RecordStore};
use arca_client::{ClientError, DepositionApi};
use arca_core::domain::{CuratedRecord, MetadataBackup, RecordStatus, UploadStatus, UploadedFile};
use arca_core::dto::deposition::{DepositionRecord, links};
use arca_core::version::next_version_label;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Known upload types accepted by the deposition service
const UPLOAD_TYPES: &[&str] = &[
    "dataset",
    "image",
    "model",
    "publication",
    "software",
    "other",
];

/// Validates a metadata blob, returning the complete list of violations
pub fn validate_metadata(metadata: &Value) -> Vec<String> {
    let mut violations = Vec::new();

    match metadata.get("title").and_then(|v| v.as_str()) {
        Some(title) if !title.trim().is_empty() => {}
        Some(_) => violations.push("title must not be empty".to_string()),
        None => violations.push("title is required".to_string()),
    }

    match metadata.get("version").and_then(|v| v.as_str()) {
        Some(version) if !version.trim().is_empty() => {}
        Some(_) => violations.push("version must not be empty".to_string()),
        None => violations.push("version is required".to_string()),
    }

    if let Some(upload_type) = metadata.get("upload_type").and_then(|v| v.as_str()) {
        if !UPLOAD_TYPES.contains(&upload_type) {
            violations.push(format!("unknown upload_type '{}'", upload_type));
        }
    }

    violations
}

/// The record lifecycle state machine
pub struct RecordLifecycle {
    store: Arc<dyn RecordStore>,
    api: Arc<dyn DepositionApi>,
    catalog: Arc<dyn FileCatalog>,
}

impl RecordLifecycle {
    pub fn new(
        store: Arc<dyn RecordStore>,
        api: Arc<dyn DepositionApi>,
        catalog: Arc<dyn FileCatalog>,
    ) -> Self {
        Self {
            store,
            api,
            catalog,
        }
    }

    /// Validates and stores metadata, moving the record to `prepared`
    ///
    /// Returns every violation at once, never just the first.
    pub fn prepare(&self, record_id: &str, metadata: Value) -> Result<CuratedRecord> {
        let violations = validate_metadata(&metadata);
        if !violations.is_empty() {
            return Err(EngineError::validation(violations));
        }

        let mut record = match self.store.get(record_id) {
            Ok(record) => record,
            Err(EngineError::RecordNotFound(_)) => CuratedRecord::new(record_id),
            Err(e) => return Err(e),
        };

        record.title = metadata
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        record.version = metadata
            .get("version")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        record.metadata = metadata;
        record.status = RecordStatus::Prepared;

        self.store.save(&record)?;
        Ok(record)
    }

    /// Snapshots the record's metadata as its sole backup (latest wins)
    pub fn backup(&self, record_id: &str) -> Result<()> {
        let record = self.store.get(record_id)?;
        self.store.save_backup(&MetadataBackup::of(&record))?;
        debug!("Backed up metadata for record {}", record_id);
        Ok(())
    }

    /// Creates a remote draft from a prepared record
    pub async fn create_draft(&self, record_id: &str) -> Result<CuratedRecord> {
        let mut record = self.store.get(record_id)?;
        if record.status != RecordStatus::Prepared {
            return Err(EngineError::InvalidState {
                record_id: record.id,
                status: record.status,
                expected: "prepared",
            });
        }

        // Snapshot before the first draft-producing action
        self.store.save_backup(&MetadataBackup::of(&record))?;

        let response = self.api.create_draft(&record.metadata).await?;
        apply_remote(&mut record, &response);
        record.status = RecordStatus::Draft;
        self.store.save(&record)?;

        info!(
            "Created draft {} for record {}",
            response.id, record_id
        );
        Ok(record)
    }

    /// Applies metadata overrides extracted from step outputs
    ///
    /// With a live draft the merge goes through the remote update call and
    /// the local copy is replaced with the server-confirmed response, never
    /// the locally-computed guess. Without a draft the overrides are folded
    /// into the static metadata and preparation is re-run.
    pub async fn apply_overrides(
        &self,
        record_id: &str,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<CuratedRecord> {
        let mut record = self.store.get(record_id)?;
        if overrides.is_empty() {
            return Ok(record);
        }

        let merged = merge_overrides(&record.metadata, overrides);

        if record.status == RecordStatus::Draft {
            let link = require_link(&record, links::SELF)?;
            let response = self.api.update_draft(&link, &merged).await?;
            apply_remote(&mut record, &response);
            self.store.save(&record)?;
            info!(
                "Applied {} override(s) to draft for record {}",
                overrides.len(),
                record_id
            );
            Ok(record)
        } else {
            info!(
                "No draft for record {}; folding {} override(s) into static metadata",
                record_id,
                overrides.len()
            );
            self.prepare(record_id, merged)
        }
    }

    /// Uploads files into the draft's bucket, tracking per-file status
    ///
    /// A failed file does not block the others; the returned record carries
    /// the individual outcomes.
    pub async fn upload_files(&self, record_id: &str, paths: &[&Path]) -> Result<CuratedRecord> {
        let mut record = self.store.get(record_id)?;
        if record.status != RecordStatus::Draft {
            return Err(EngineError::InvalidState {
                record_id: record.id,
                status: record.status,
                expected: "draft",
            });
        }
        let bucket = require_link(&record, links::BUCKET)?;

        for path in paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());

            let mut entry = UploadedFile {
                name: name.clone(),
                path: path.to_path_buf(),
                status: UploadStatus::Pending,
                error: None,
            };

            match self.api.upload_file(&bucket, &name, path).await {
                Ok(_) => {
                    entry.status = UploadStatus::Uploaded;
                    debug!("Uploaded {} for record {}", name, record_id);
                }
                Err(e) => {
                    warn!("Upload of {} failed for record {}: {}", name, record_id, e);
                    entry.status = UploadStatus::Failed;
                    entry.error = Some(e.to_string());
                }
            }
            record.files.push(entry);
        }

        self.store.save(&record)?;
        Ok(record)
    }

    /// Publishes the draft, with re-verification on an ambiguous error
    ///
    /// The remote service can apply a publish durably while still returning
    /// a transient server error on the triggering call. On a 5xx the
    /// lifecycle issues a read-only fetch of the public record endpoint; if
    /// that succeeds the record is committed as published using the fetched
    /// data, otherwise the item fails.
    pub async fn publish(&self, record_id: &str) -> Result<CuratedRecord> {
        let mut record = self.store.get(record_id)?;
        if record.status != RecordStatus::Draft {
            return Err(EngineError::InvalidState {
                record_id: record.id,
                status: record.status,
                expected: "draft",
            });
        }
        let link = require_link(&record, links::PUBLISH)?;

        let response = match self.api.publish(&link).await {
            Ok(response) => response,
            Err(e) if e.is_server_error() => {
                warn!(
                    "Publish for record {} returned a server error, re-verifying: {}",
                    record_id, e
                );
                let remote_id = record.remote_id.clone().ok_or_else(|| {
                    EngineError::Remote(ClientError::MissingLink(links::SELF.to_string()))
                })?;
                match self.api.fetch_record(&remote_id).await {
                    Ok(response) => {
                        info!(
                            "Record {} confirmed published via re-verification",
                            record_id
                        );
                        response
                    }
                    Err(fetch_err) => {
                        debug!("Re-verification fetch also failed: {}", fetch_err);
                        return Err(e.into());
                    }
                }
            }
            Err(e) => return Err(e.into()),
        };

        apply_remote(&mut record, &response);
        record.status = RecordStatus::Published;
        self.store.save(&record)?;

        info!(
            "Record {} published (remote id {}, doi {:?})",
            record_id, response.id, record.doi
        );
        Ok(record)
    }

    /// Discards the draft and restores the pre-draft metadata
    ///
    /// Restores the backup if one exists, otherwise only resets status;
    /// the backup is deleted after use. Never raises when called twice.
    /// Published records are immutable and cannot be discarded.
    pub async fn discard(&self, record_id: &str) -> Result<CuratedRecord> {
        let mut record = self.store.get(record_id)?;
        if record.status == RecordStatus::Published {
            return Err(EngineError::InvalidState {
                record_id: record.id,
                status: record.status,
                expected: "draft or prepared",
            });
        }

        if record.status == RecordStatus::Draft {
            if let Some(link) = record.link(links::DISCARD) {
                // Best effort; local restore is the compensation either way
                if let Err(e) = self.api.discard(link).await {
                    warn!("Remote discard failed for record {}: {}", record_id, e);
                }
            }
        }

        match self.store.take_backup(record_id)? {
            Some(backup) => {
                record.metadata = backup.metadata;
                record.title = backup.title;
                record.version = backup.version;
                info!("Restored pre-draft metadata for record {}", record_id);
            }
            None => {
                info!(
                    "No backup for record {}; status reset without data recovery",
                    record_id
                );
            }
        }

        record.clear_remote_state();
        record.status = RecordStatus::Prepared;
        self.store.save(&record)?;
        Ok(record)
    }

    /// Creates a new draft version of the latest published record for a
    /// concept id
    ///
    /// Follows the published record's new-version link to obtain the draft
    /// shell, computes the next version label locally (the remote service
    /// does not auto-increment) and immediately patches the draft with it,
    /// storing the patched response as the authoritative record.
    pub async fn new_version(&self, concept_id: &str) -> Result<CuratedRecord> {
        let latest = self
            .store
            .find_latest_published(concept_id)?
            .ok_or_else(|| EngineError::NoPublishedVersion(concept_id.to_string()))?;
        let nv_link = require_link(&latest, links::NEW_VERSION)?;

        let shell = self.api.new_version(&nv_link).await?;
        let next_label = next_version_label(&latest.version);

        let mut metadata = if shell.metadata.is_null() {
            latest.metadata.clone()
        } else {
            shell.metadata.clone()
        };
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("version".to_string(), Value::String(next_label.clone()));
        }

        let update_link = shell
            .link(links::LATEST_DRAFT)
            .or_else(|| shell.link(links::SELF))
            .ok_or_else(|| {
                EngineError::Remote(ClientError::MissingLink(links::LATEST_DRAFT.to_string()))
            })?
            .to_string();

        let response = self.api.update_draft(&update_link, &metadata).await?;

        let mut record = CuratedRecord::new(response.id.clone());
        apply_remote(&mut record, &response);
        if record.concept_id.is_none() {
            record.concept_id = Some(concept_id.to_string());
        }
        if record.version.is_empty() {
            record.version = next_label.clone();
        }
        if record.title.is_empty() {
            record.title = latest.title.clone();
        }
        record.status = RecordStatus::Draft;
        self.store.save(&record)?;

        info!(
            "Created version {} draft ({}) for concept {}",
            record.version, record.id, concept_id
        );
        Ok(record)
    }

    /// Manifest-driven file sync for a freshly-versioned draft
    ///
    /// Deletes every remote file not named in the keep-list, uploads the new
    /// source file, and points the catalog at it as the record's main file.
    pub async fn sync_version_files(
        &self,
        record_id: &str,
        keep: &[String],
        new_source: &Path,
    ) -> Result<CuratedRecord> {
        let mut record = self.store.get(record_id)?;
        if record.status != RecordStatus::Draft {
            return Err(EngineError::InvalidState {
                record_id: record.id,
                status: record.status,
                expected: "draft",
            });
        }

        let files_link = require_link(&record, links::FILES)?;
        let remote_files = self.api.list_files(&files_link).await?;

        for file in &remote_files {
            if keep.contains(&file.filename) {
                continue;
            }
            match file.self_link() {
                Some(link) => {
                    self.api.delete_file(link).await?;
                    debug!(
                        "Deleted stale file {} from record {}",
                        file.filename, record_id
                    );
                }
                None => warn!(
                    "File {} on record {} has no self link, cannot delete",
                    file.filename, record_id
                ),
            }
        }

        let bucket = require_link(&record, links::BUCKET)?;
        let name = new_source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| new_source.to_string_lossy().into_owned());
        self.api.upload_file(&bucket, &name, new_source).await?;
        self.catalog
            .register(new_source, FileRole::Main, Some(record_id))?;

        record.files.push(UploadedFile {
            name,
            path: new_source.to_path_buf(),
            status: UploadStatus::Uploaded,
            error: None,
        });
        self.store.save(&record)?;
        Ok(record)
    }
}

/// Resolves an action link or fails with a typed missing-link error
fn require_link(record: &CuratedRecord, name: &str) -> Result<String> {
    record
        .link(name)
        .map(String::from)
        .ok_or_else(|| EngineError::Remote(ClientError::MissingLink(name.to_string())))
}

/// Folds the latest remote response into the local record
///
/// Identifiers and links always come from the response; metadata and the
/// denormalized fields are taken from it when present so the local copy is
/// always the server-confirmed version.
fn apply_remote(record: &mut CuratedRecord, response: &DepositionRecord) {
    record.remote_id = Some(response.id.clone());
    if response.concept_id.is_some() {
        record.concept_id = response.concept_id.clone();
    }
    if response.doi.is_some() {
        record.doi = response.doi.clone();
    }
    record.links = response.links.clone();
    if !response.metadata.is_null() {
        record.metadata = response.metadata.clone();
        if let Some(title) = response.metadata.get("title").and_then(|v| v.as_str()) {
            record.title = title.to_string();
        }
        if let Some(version) = response.version() {
            record.version = version.to_string();
        }
    }
}

/// Merges override values onto a metadata blob (last write wins)
fn merge_overrides(metadata: &Value, overrides: &BTreeMap<String, Value>) -> Value {
    let mut merged = if metadata.is_object() {
        metadata.clone()
    } else {
        Value::Object(Default::default())
    };
    if let Some(obj) = merged.as_object_mut() {
        for (field, value) in overrides {
            obj.insert(field.clone(), value.clone());
        }
    }
    merged
}
