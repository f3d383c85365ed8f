//! Output mapping extraction
//!
//! Reads structured step-output files and extracts metadata override values
//! via dotted key paths. A missing key at any depth is logged and skipped,
//! never an error; later rules for the same target field overwrite earlier
//! ones, deterministic by step order.

use crate::error::{EngineError, Result};
use crate::resolver::ExecutionFileMap;
use arca_core::domain::Pipeline;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Collects metadata overrides from every step output flagged for mapping
pub fn collect_overrides(
    pipeline: &Pipeline,
    files: &ExecutionFileMap,
) -> Result<BTreeMap<String, Value>> {
    let mut overrides = BTreeMap::new();

    for step in &pipeline.steps {
        for output in &step.outputs {
            if !output.maps_to_metadata() {
                continue;
            }

            let Some(path) = files.get(&output.file_id) else {
                // The producing step may have been skipped; mapping is
                // best-effort by contract
                warn!(
                    "Step {}: output '{}' not in file map, skipping metadata rules",
                    step.sequence, output.file_id
                );
                continue;
            };

            let text = std::fs::read_to_string(path)?;
            let parsed: Value =
                serde_json::from_str(&text).map_err(|e| EngineError::OutputParse {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;

            for rule in &output.metadata_rules {
                match lookup_key_path(&parsed, &rule.key_path) {
                    Some(value) => {
                        debug!(
                            "Step {}: override {} = {} (from {})",
                            step.sequence, rule.target_field, value, rule.key_path
                        );
                        overrides.insert(rule.target_field.clone(), value.clone());
                    }
                    None => {
                        debug!(
                            "Step {}: key path '{}' not found in {}, skipped",
                            step.sequence,
                            rule.key_path,
                            path.display()
                        );
                    }
                }
            }
        }
    }

    Ok(overrides)
}

/// Walks a dotted key path segment-by-segment through parsed data
fn lookup_key_path<'a>(value: &'a Value, key_path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in key_path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_core::domain::{MetadataRule, OutputDecl, Step};
    use serde_json::json;
    use std::io::Write;

    fn rule(target: &str, key_path: &str) -> MetadataRule {
        MetadataRule {
            target_field: target.to_string(),
            key_path: key_path.to_string(),
        }
    }

    fn pipeline_with_output(file_id: &str, rules: Vec<MetadataRule>) -> Pipeline {
        Pipeline {
            id: "p".to_string(),
            description: None,
            steps: vec![Step {
                sequence: 1,
                component: "analyze".to_string(),
                inputs: Default::default(),
                outputs: vec![OutputDecl {
                    file_id: file_id.to_string(),
                    filename: "stats.json".to_string(),
                    metadata_rules: rules,
                }],
                parameters: Value::Null,
                timeout_seconds: 60,
                on_error: Default::default(),
            }],
            create_draft: false,
            upload_files: false,
            publish: false,
        }
    }

    fn write_output(dir: &tempfile::TempDir, content: &Value) -> std::path::PathBuf {
        let path = dir.path().join("stats.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_extracts_value_by_dotted_key_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_output(&dir, &json!({"a": {"b": 5}}));

        let pipeline = pipeline_with_output("stats", vec![rule("count", "a.b")]);
        let mut files = ExecutionFileMap::default();
        files.insert("stats", path);

        let overrides = collect_overrides(&pipeline, &files).unwrap();
        assert_eq!(overrides["count"], json!(5));
    }

    #[test]
    fn test_missing_key_path_is_skipped_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_output(&dir, &json!({"a": {"b": 5}}));

        let pipeline = pipeline_with_output("stats", vec![rule("count", "a.c")]);
        let mut files = ExecutionFileMap::default();
        files.insert("stats", path);

        let overrides = collect_overrides(&pipeline, &files).unwrap();
        assert!(!overrides.contains_key("count"));
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_later_rule_overwrites_earlier_for_same_field() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_output(&dir, &json!({"first": "a", "second": "b"}));

        let pipeline = pipeline_with_output(
            "stats",
            vec![rule("title", "first"), rule("title", "second")],
        );
        let mut files = ExecutionFileMap::default();
        files.insert("stats", path);

        let overrides = collect_overrides(&pipeline, &files).unwrap();
        assert_eq!(overrides["title"], json!("b"));
    }

    #[test]
    fn test_unmapped_output_file_is_skipped() {
        // The output is not in the file map (its step was skipped)
        let pipeline = pipeline_with_output("stats", vec![rule("count", "a.b")]);
        let files = ExecutionFileMap::default();

        let overrides = collect_overrides(&pipeline, &files).unwrap();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_malformed_output_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, "not json").unwrap();

        let pipeline = pipeline_with_output("stats", vec![rule("count", "a.b")]);
        let mut files = ExecutionFileMap::default();
        files.insert("stats", path);

        assert!(matches!(
            collect_overrides(&pipeline, &files),
            Err(EngineError::OutputParse { .. })
        ));
    }
}
