//! Deposition service wire types
//!
//! The remote repository exposes a hypermedia-style API: every response
//! embeds the action links valid in the record's current state. Consumers
//! must resolve the next action from the latest response's `links` map,
//! never from a statically constructed URL.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known link names used by the lifecycle transitions
pub mod links {
    /// Update the draft's metadata
    pub const SELF: &str = "self";
    /// Publish the draft
    pub const PUBLISH: &str = "publish";
    /// Discard the draft
    pub const DISCARD: &str = "discard";
    /// Create a new draft version of a published record
    pub const NEW_VERSION: &str = "newversion";
    /// File upload bucket
    pub const BUCKET: &str = "bucket";
    /// File listing for the draft
    pub const FILES: &str = "files";
    /// Draft created by a new-version action
    pub const LATEST_DRAFT: &str = "latest_draft";
}

/// A deposition record as returned by the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositionRecord {
    pub id: String,
    /// Concept id shared across all versions
    #[serde(default)]
    pub concept_id: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    /// Remote lifecycle state, e.g. "unsubmitted" or "done"
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Action links valid for the record's current state
    #[serde(default)]
    pub links: HashMap<String, String>,
    #[serde(default)]
    pub files: Vec<DepositionFile>,
}

impl DepositionRecord {
    /// Looks up an action link by name
    pub fn link(&self, name: &str) -> Option<&str> {
        self.links.get(name).map(String::as_str)
    }

    /// Version label carried in the response metadata, if any
    pub fn version(&self) -> Option<&str> {
        self.metadata.get("version").and_then(|v| v.as_str())
    }
}

/// A file attached to a deposition record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositionFile {
    #[serde(default)]
    pub id: Option<String>,
    pub filename: String,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub links: HashMap<String, String>,
}

impl DepositionFile {
    /// Link used to delete this file from its draft
    pub fn self_link(&self) -> Option<&str> {
        self.links.get(links::SELF).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_deserializes_with_partial_fields() {
        let raw = json!({
            "id": "10042",
            "links": {"publish": "https://repo.example/api/deposit/10042/publish"}
        });
        let record: DepositionRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.id, "10042");
        assert!(record.link(links::PUBLISH).is_some());
        assert!(record.link(links::DISCARD).is_none());
        assert!(record.files.is_empty());
        assert!(record.version().is_none());
    }

    #[test]
    fn test_version_from_metadata() {
        let raw = json!({"id": "1", "metadata": {"version": "0.2.0"}});
        let record: DepositionRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.version(), Some("0.2.0"));
    }
}
