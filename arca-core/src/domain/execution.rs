//! Execution status and log types
//!
//! Structure shared between the execution supervisor (produces) and the
//! orchestrator's polling consumer (drains).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A fully-constructed command for one pipeline step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl CommandSpec {
    /// Renders the command as a single log-friendly line
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Status of one external-component execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Output files confirmed after a completed execution
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResults {
    pub output_files: Vec<PathBuf>,
}

/// Severity of a streamed execution log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

/// One entry on an execution's log channel
///
/// Carries the execution status at emission time so a polling consumer can
/// stop as soon as it drains an entry tagged with a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: LogLevel,
    pub message: String,
    pub status: ExecutionStatus,
}

impl ExecutionLog {
    pub fn new(level: LogLevel, message: impl Into<String>, status: ExecutionStatus) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            level,
            message: message.into(),
            status,
        }
    }
}

/// Classifies a raw output line from an external component by keyword.
///
/// External components are black boxes; this heuristic is the only severity
/// signal available for their combined stdout/stderr stream.
pub fn classify_line(line: &str) -> LogLevel {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("failed") || lower.contains("exception") {
        LogLevel::Error
    } else if lower.contains("warning") || lower.contains("warn") {
        LogLevel::Warning
    } else if lower.contains("success") || lower.contains("completed") || lower.contains("finished")
    {
        LogLevel::Success
    } else if lower.contains("debug") {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_line_keywords() {
        assert_eq!(classify_line("ERROR: out of range"), LogLevel::Error);
        assert_eq!(classify_line("step failed with code 2"), LogLevel::Error);
        assert_eq!(classify_line("Warning: deprecated flag"), LogLevel::Warning);
        assert_eq!(classify_line("conversion finished"), LogLevel::Success);
        assert_eq!(classify_line("DEBUG probing cache"), LogLevel::Debug);
        assert_eq!(classify_line("processing page 3"), LogLevel::Info);
    }

    #[test]
    fn test_error_outranks_success() {
        // "completed with errors" is still an error line
        assert_eq!(classify_line("completed with errors"), LogLevel::Error);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!ExecutionStatus::Starting.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
    }
}
