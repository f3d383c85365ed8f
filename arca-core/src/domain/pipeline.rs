//! Pipeline definition types
//!
//! A pipeline is an ordered list of steps, each invoking an external
//! component. Step inputs reference files by conceptual id; the engine
//! resolves them to real paths only at execution time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub description: Option<String>,
    pub steps: Vec<Step>,
    /// Create a remote draft before running steps
    #[serde(default)]
    pub create_draft: bool,
    /// Upload the run's files to the draft after all steps complete
    #[serde(default)]
    pub upload_files: bool,
    /// Publish the draft after uploading
    #[serde(default)]
    pub publish: bool,
}

/// One step of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Position in the pipeline, used in error messages and ordering
    pub sequence: u32,
    /// Name of the external component to run (resolvable as a command)
    pub component: String,
    /// Named inputs passed to the component as command-line parameters
    #[serde(default)]
    pub inputs: HashMap<String, StepInput>,
    /// Files this step is expected to produce
    #[serde(default)]
    pub outputs: Vec<OutputDecl>,
    /// Extra component parameters, passed through as flags
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Maximum wall-clock seconds before the step is failed
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub on_error: OnErrorPolicy,
}

fn default_timeout() -> u64 {
    600
}

/// Source of a single step input value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum StepInput {
    /// A file produced by an earlier step (or the item's source file),
    /// referenced by conceptual id
    PipelineFile { file_id: String },
    /// A literal value passed through unchanged
    Literal { value: String },
    /// A path outside the pipeline's file map
    ExternalPath { path: PathBuf },
}

/// A file a step declares it will produce
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDecl {
    /// Conceptual id under which the file is registered for later steps
    pub file_id: String,
    /// Filename inside the run's output directory
    pub filename: String,
    /// Rules extracting metadata overrides from this output file
    #[serde(default)]
    pub metadata_rules: Vec<MetadataRule>,
}

impl OutputDecl {
    /// Whether this output feeds metadata back into the record
    pub fn maps_to_metadata(&self) -> bool {
        !self.metadata_rules.is_empty()
    }
}

/// Extracts one metadata override from a structured step output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataRule {
    /// Record metadata field to overwrite
    pub target_field: String,
    /// Dotted path into the parsed output file, e.g. "summary.count"
    pub key_path: String,
}

/// What to do when a step fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnErrorPolicy {
    /// Abort the current item (default)
    Fail,
    /// Log and continue without the step's outputs
    Skip,
    /// Retry once, then fail
    Retry,
    /// Like skip, but logged at warning level
    Warn,
}

impl Default for OnErrorPolicy {
    fn default() -> Self {
        Self::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_input_tagged_deserialization() {
        let json = r#"{"source": "pipeline_file", "file_id": "cleaned"}"#;
        let input: StepInput = serde_json::from_str(json).unwrap();
        match input {
            StepInput::PipelineFile { file_id } => assert_eq!(file_id, "cleaned"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn test_step_defaults() {
        let json = r#"{"sequence": 1, "component": "normalize"}"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.timeout_seconds, 600);
        assert_eq!(step.on_error, OnErrorPolicy::Fail);
        assert!(step.inputs.is_empty());
        assert!(step.outputs.is_empty());
    }
}
