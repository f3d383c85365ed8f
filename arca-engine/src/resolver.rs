//! Step input resolution
//!
//! Maps declarative step input references to concrete filesystem paths. The
//! file map is scoped to exactly one batch-item run: seeded with the item's
//! source file, extended as each step completes, never shared across items.
//! Decoupling steps from the filesystem layout lets one step's output become
//! the next step's input purely by conceptual id.

use crate::error::{EngineError, Result};
use arca_core::domain::{Step, StepInput};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Conceptual file id -> absolute path, for one batch-item run
#[derive(Debug, Clone, Default)]
pub struct ExecutionFileMap {
    files: HashMap<String, PathBuf>,
}

impl ExecutionFileMap {
    /// Creates a map seeded with the item's source file
    pub fn seeded(file_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let mut map = Self::default();
        map.insert(file_id, path);
        map
    }

    pub fn insert(&mut self, file_id: impl Into<String>, path: impl Into<PathBuf>) {
        self.files.insert(file_id.into(), path.into());
    }

    pub fn get(&self, file_id: &str) -> Option<&Path> {
        self.files.get(file_id).map(PathBuf::as_path)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.files.contains_key(file_id)
    }

    /// All registered paths, used when uploading a run's files
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.values().map(PathBuf::as_path)
    }
}

/// Resolves a step's declared inputs against the run's file map.
///
/// Returns a value for every declared input or fails; a missing conceptual
/// id is an error naming the offending id and step, never a partial result.
pub fn resolve_inputs(step: &Step, files: &ExecutionFileMap) -> Result<HashMap<String, String>> {
    let mut resolved = HashMap::new();

    for (name, input) in &step.inputs {
        let value = match input {
            StepInput::PipelineFile { file_id } => {
                let path = files.get(file_id).ok_or_else(|| EngineError::Resolution {
                    step: step.sequence,
                    file_id: file_id.clone(),
                })?;
                path.to_string_lossy().into_owned()
            }
            StepInput::Literal { value } => value.clone(),
            StepInput::ExternalPath { path } => path.to_string_lossy().into_owned(),
        };
        resolved.insert(name.clone(), value);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_with_inputs(inputs: Vec<(&str, StepInput)>) -> Step {
        Step {
            sequence: 2,
            component: "convert".to_string(),
            inputs: inputs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            outputs: Vec::new(),
            parameters: serde_json::Value::Null,
            timeout_seconds: 60,
            on_error: Default::default(),
        }
    }

    #[test]
    fn test_resolves_pipeline_file_by_conceptual_id() {
        let files = ExecutionFileMap::seeded("source", "/data/item.csv");
        let step = step_with_inputs(vec![(
            "input",
            StepInput::PipelineFile {
                file_id: "source".to_string(),
            },
        )]);

        let resolved = resolve_inputs(&step, &files).unwrap();
        assert_eq!(resolved["input"], "/data/item.csv");
    }

    #[test]
    fn test_missing_conceptual_id_fails_naming_id_and_step() {
        let files = ExecutionFileMap::default();
        let step = step_with_inputs(vec![(
            "input",
            StepInput::PipelineFile {
                file_id: "cleaned".to_string(),
            },
        )]);

        match resolve_inputs(&step, &files) {
            Err(EngineError::Resolution { step, file_id }) => {
                assert_eq!(step, 2);
                assert_eq!(file_id, "cleaned");
            }
            other => panic!("expected resolution error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_no_partial_substitution() {
        // One resolvable input and one missing: the whole resolution fails
        let files = ExecutionFileMap::seeded("source", "/data/item.csv");
        let step = step_with_inputs(vec![
            (
                "a",
                StepInput::PipelineFile {
                    file_id: "source".to_string(),
                },
            ),
            (
                "b",
                StepInput::PipelineFile {
                    file_id: "missing".to_string(),
                },
            ),
        ]);

        assert!(resolve_inputs(&step, &files).is_err());
    }

    #[test]
    fn test_literal_and_external_inputs() {
        let files = ExecutionFileMap::default();
        let step = step_with_inputs(vec![
            (
                "format",
                StepInput::Literal {
                    value: "tiff".to_string(),
                },
            ),
            (
                "profile",
                StepInput::ExternalPath {
                    path: PathBuf::from("/etc/arca/profile.json"),
                },
            ),
        ]);

        let resolved = resolve_inputs(&step, &files).unwrap();
        assert_eq!(resolved["format"], "tiff");
        assert_eq!(resolved["profile"], "/etc/arca/profile.json");
    }
}
