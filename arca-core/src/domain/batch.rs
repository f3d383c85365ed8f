//! Batch processing types
//!
//! A batch is a list of items processed independently; one failing item never
//! aborts the batch. The report distinguishes succeeded from failed items so
//! a caller can retry only the failed subset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default conceptual id under which an item's source file is seeded
pub const SOURCE_FILE_ID: &str = "source";

/// One record processed end-to-end by one orchestrator pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Local record id
    pub record_id: String,
    /// The item's original data file
    pub source_file: PathBuf,
    /// Conceptual id under which `source_file` is registered
    #[serde(default = "default_source_file_id")]
    pub source_file_id: String,
}

fn default_source_file_id() -> String {
    SOURCE_FILE_ID.to_string()
}

/// One versioning-mode item: spawn a new draft version of a published record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRequest {
    /// Concept id whose latest published version is to be versioned
    pub concept_id: String,
    /// New source file for the new version
    pub source_file: PathBuf,
    /// Remote filenames to keep during the manifest sync
    #[serde(default)]
    pub keep_files: Vec<String>,
    /// Run the manifest-driven file sync before pipeline processing
    #[serde(default)]
    pub sync_files: bool,
}

/// A failed item and its error message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub message: String,
}

/// End-of-batch report
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    /// Overall success: every item succeeded
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn record_success(&mut self, item_id: impl Into<String>) {
        self.succeeded.push(item_id.into());
    }

    pub fn record_failure(&mut self, item_id: impl Into<String>, message: impl Into<String>) {
        self.failed.push(ItemFailure {
            item_id: item_id.into(),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_success_only_when_no_failures() {
        let mut report = BatchReport::default();
        report.record_success("a");
        assert!(report.success());

        report.record_failure("b", "boom");
        assert!(!report.success());
        assert_eq!(report.succeeded, vec!["a"]);
        assert_eq!(report.failed[0].item_id, "b");
        assert_eq!(report.failed[0].message, "boom");
    }
}
