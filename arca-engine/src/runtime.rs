//! Component runtime: command construction and output strategy selection
//!
//! External components are independently-packaged programs; given a component
//! name the provisioning layer yields a runnable command. Components differ
//! in how they accept an output destination, so the runtime probes the
//! program's help text once and selects exactly one strategy from a closed
//! set of variants. Estimated output paths are computed before the process
//! runs so they can be pre-registered and polled for.

use crate::error::{EngineError, Result};
use arca_core::domain::{CommandSpec, OutputDecl, Step};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// How a component accepts its output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputStrategy {
    /// Component takes a single output path via a generic output flag
    SingleFileOutput { flag: String, path: PathBuf },
    /// Component takes a single output path via a dedicated file flag
    SingleFileOutputFile { flag: String, path: PathBuf },
    /// Component writes all outputs into a directory given by flag
    DirectoryOutput {
        flag: String,
        dir: PathBuf,
        expected: Vec<PathBuf>,
    },
    /// No recognized flag: run with the output directory as working
    /// directory and expect the declared filenames to appear there
    Fallback { dir: PathBuf, expected: Vec<PathBuf> },
}

impl OutputStrategy {
    /// Paths this strategy expects the component to produce
    pub fn expected_outputs(&self) -> Vec<PathBuf> {
        match self {
            Self::SingleFileOutput { path, .. } | Self::SingleFileOutputFile { path, .. } => {
                vec![path.clone()]
            }
            Self::DirectoryOutput { expected, .. } | Self::Fallback { expected, .. } => {
                expected.clone()
            }
        }
    }
}

/// A command ready to hand to the execution supervisor
#[derive(Debug, Clone)]
pub struct BuiltCommand {
    pub command: CommandSpec,
    pub strategy: OutputStrategy,
}

/// Builds runnable commands for pipeline steps
///
/// Trait seam so tests can substitute a runtime that never probes or spawns
/// real programs.
pub trait ComponentRuntime: Send + Sync {
    fn build(
        &self,
        step: &Step,
        inputs: &HashMap<String, String>,
        output_dir: &Path,
    ) -> Result<BuiltCommand>;
}

/// Runtime that probes the real program's help text to pick a strategy
pub struct ProbingRuntime;

impl ProbingRuntime {
    pub fn new() -> Self {
        Self
    }

    /// Runs `<component> --help` and returns its combined output
    fn help_text(&self, component: &str) -> Result<String> {
        let output = Command::new(component).arg("--help").output().map_err(|e| {
            EngineError::ComponentLaunch {
                component: component.to_string(),
                reason: format!("failed to probe '--help': {}", e),
            }
        })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(text)
    }
}

impl Default for ProbingRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentRuntime for ProbingRuntime {
    fn build(
        &self,
        step: &Step,
        inputs: &HashMap<String, String>,
        output_dir: &Path,
    ) -> Result<BuiltCommand> {
        let help = self.help_text(&step.component)?;
        let strategy = select_strategy(&help, &step.outputs, output_dir);
        debug!(
            "Component '{}' output strategy: {:?}",
            step.component, strategy
        );

        let command = build_command(step, inputs, &strategy)?;
        Ok(BuiltCommand { command, strategy })
    }
}

/// Selects exactly one output strategy from the probed help text.
///
/// A dedicated single-file flag wins over the generic one; a directory flag
/// is required when more than one output is declared.
pub fn select_strategy(help: &str, outputs: &[OutputDecl], output_dir: &Path) -> OutputStrategy {
    let expected: Vec<PathBuf> = outputs
        .iter()
        .map(|decl| output_dir.join(&decl.filename))
        .collect();

    if outputs.len() == 1 {
        if help.contains("--output-file") {
            return OutputStrategy::SingleFileOutputFile {
                flag: "--output-file".to_string(),
                path: expected[0].clone(),
            };
        }
        if help.contains("--output") {
            return OutputStrategy::SingleFileOutput {
                flag: "--output".to_string(),
                path: expected[0].clone(),
            };
        }
    }

    if !outputs.is_empty() && help.contains("--output-dir") {
        return OutputStrategy::DirectoryOutput {
            flag: "--output-dir".to_string(),
            dir: output_dir.to_path_buf(),
            expected,
        };
    }

    OutputStrategy::Fallback {
        dir: output_dir.to_path_buf(),
        expected,
    }
}

/// Assembles the final command: resolved inputs as named flags, step
/// parameters passed through, then the output strategy's flag
fn build_command(
    step: &Step,
    inputs: &HashMap<String, String>,
    strategy: &OutputStrategy,
) -> Result<CommandSpec> {
    let mut args = Vec::new();

    // Deterministic argument order regardless of map iteration
    let mut input_names: Vec<&String> = inputs.keys().collect();
    input_names.sort();
    for name in input_names {
        args.push(format!("--{}", name));
        args.push(inputs[name].clone());
    }

    match &step.parameters {
        serde_json::Value::Null => {}
        serde_json::Value::Object(params) => {
            for (key, value) in params {
                args.push(format!("--{}", key));
                args.push(scalar_to_arg(value).ok_or_else(|| EngineError::ComponentLaunch {
                    component: step.component.clone(),
                    reason: format!("parameter '{}' is not a scalar value", key),
                })?);
            }
        }
        other => {
            return Err(EngineError::ComponentLaunch {
                component: step.component.clone(),
                reason: format!("parameters must be an object, got {}", other),
            });
        }
    }

    let mut cwd = None;
    match strategy {
        OutputStrategy::SingleFileOutput { flag, path }
        | OutputStrategy::SingleFileOutputFile { flag, path } => {
            args.push(flag.clone());
            args.push(path.to_string_lossy().into_owned());
        }
        OutputStrategy::DirectoryOutput { flag, dir, .. } => {
            args.push(flag.clone());
            args.push(dir.to_string_lossy().into_owned());
        }
        OutputStrategy::Fallback { dir, .. } => {
            cwd = Some(dir.clone());
        }
    }

    Ok(CommandSpec {
        program: step.component.clone(),
        args,
        cwd,
        env: HashMap::new(),
    })
}

fn scalar_to_arg(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(file_id: &str, filename: &str) -> OutputDecl {
        OutputDecl {
            file_id: file_id.to_string(),
            filename: filename.to_string(),
            metadata_rules: Vec::new(),
        }
    }

    #[test]
    fn test_dedicated_file_flag_wins() {
        let outputs = vec![decl("out", "result.json")];
        let strategy = select_strategy(
            "Usage: convert --output-file PATH --output PATH",
            &outputs,
            Path::new("/work"),
        );
        assert_eq!(
            strategy,
            OutputStrategy::SingleFileOutputFile {
                flag: "--output-file".to_string(),
                path: PathBuf::from("/work/result.json"),
            }
        );
    }

    #[test]
    fn test_generic_output_flag() {
        let outputs = vec![decl("out", "result.json")];
        let strategy = select_strategy("--output PATH", &outputs, Path::new("/work"));
        assert!(matches!(strategy, OutputStrategy::SingleFileOutput { .. }));
    }

    #[test]
    fn test_directory_flag_for_multiple_outputs() {
        let outputs = vec![decl("a", "a.json"), decl("b", "b.json")];
        let strategy = select_strategy(
            "--output PATH --output-dir DIR",
            &outputs,
            Path::new("/work"),
        );
        match strategy {
            OutputStrategy::DirectoryOutput { dir, expected, .. } => {
                assert_eq!(dir, PathBuf::from("/work"));
                assert_eq!(
                    expected,
                    vec![PathBuf::from("/work/a.json"), PathBuf::from("/work/b.json")]
                );
            }
            other => panic!("unexpected strategy: {:?}", other),
        }
    }

    #[test]
    fn test_fallback_when_no_flags_recognized() {
        let outputs = vec![decl("out", "result.json")];
        let strategy = select_strategy("no options here", &outputs, Path::new("/work"));
        match strategy {
            OutputStrategy::Fallback { dir, expected } => {
                assert_eq!(dir, PathBuf::from("/work"));
                assert_eq!(expected, vec![PathBuf::from("/work/result.json")]);
            }
            other => panic!("unexpected strategy: {:?}", other),
        }
    }

    #[test]
    fn test_command_includes_inputs_parameters_and_strategy_flag() {
        let step = Step {
            sequence: 1,
            component: "convert".to_string(),
            inputs: HashMap::new(),
            outputs: vec![decl("out", "result.json")],
            parameters: json!({"quality": 9}),
            timeout_seconds: 60,
            on_error: Default::default(),
        };
        let mut inputs = HashMap::new();
        inputs.insert("input".to_string(), "/data/item.csv".to_string());

        let strategy = OutputStrategy::SingleFileOutput {
            flag: "--output".to_string(),
            path: PathBuf::from("/work/result.json"),
        };
        let command = build_command(&step, &inputs, &strategy).unwrap();

        assert_eq!(command.program, "convert");
        assert_eq!(
            command.args,
            vec![
                "--input",
                "/data/item.csv",
                "--quality",
                "9",
                "--output",
                "/work/result.json"
            ]
        );
        assert!(command.cwd.is_none());
    }

    #[test]
    fn test_fallback_sets_working_directory() {
        let step = Step {
            sequence: 1,
            component: "convert".to_string(),
            inputs: HashMap::new(),
            outputs: Vec::new(),
            parameters: serde_json::Value::Null,
            timeout_seconds: 60,
            on_error: Default::default(),
        };
        let strategy = OutputStrategy::Fallback {
            dir: PathBuf::from("/work"),
            expected: Vec::new(),
        };
        let command = build_command(&step, &HashMap::new(), &strategy).unwrap();
        assert_eq!(command.cwd, Some(PathBuf::from("/work")));
    }

    #[test]
    fn test_non_scalar_parameter_is_a_launch_error() {
        let step = Step {
            sequence: 1,
            component: "convert".to_string(),
            inputs: HashMap::new(),
            outputs: Vec::new(),
            parameters: json!({"nested": {"a": 1}}),
            timeout_seconds: 60,
            on_error: Default::default(),
        };
        let strategy = OutputStrategy::Fallback {
            dir: PathBuf::from("/work"),
            expected: Vec::new(),
        };
        let err = build_command(&step, &HashMap::new(), &strategy).unwrap_err();
        assert!(matches!(err, EngineError::ComponentLaunch { .. }));
    }
}
