//! Engine error taxonomy
//!
//! Every variant is fatal to the current batch item only; the orchestrator
//! catches them at the item boundary and the batch continues.

use arca_client::ClientError;
use arca_core::domain::RecordStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by the pipeline engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// A step input references a conceptual file id with no registered path
    #[error("step {step}: no file registered for conceptual id '{file_id}'")]
    Resolution { step: u32, file_id: String },

    /// Command construction failed before any process was started
    #[error("failed to construct command for component '{component}': {reason}")]
    ComponentLaunch { component: String, reason: String },

    /// The external process exited non-zero, was cancelled, or timed out
    #[error("step {step} ({component}) failed: {reason}")]
    ExecutionFailed {
        step: u32,
        component: String,
        reason: String,
    },

    /// Non-success response from the deposition service
    #[error("remote API error: {0}")]
    Remote(#[from] ClientError),

    /// Metadata failed structural/business rules; carries the complete list
    /// of violations, never truncated to the first failure
    #[error("metadata validation failed: {}", violations.join("; "))]
    Validation { violations: Vec<String> },

    /// A step output file could not be parsed as structured data
    #[error("failed to parse step output {path}: {reason}")]
    OutputParse { path: PathBuf, reason: String },

    /// Record missing from the local store
    #[error("record '{0}' not found")]
    RecordNotFound(String),

    /// No published record exists for the concept id (versioning mode)
    #[error("no published record for concept id '{0}'")]
    NoPublishedVersion(String),

    /// The record is not in a state where the requested transition is valid
    #[error("record '{record_id}' is {status:?}, expected {expected}")]
    InvalidState {
        record_id: String,
        status: RecordStatus,
        expected: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Builds a validation error from a list of violations
    pub fn validation(violations: Vec<String>) -> Self {
        Self::Validation { violations }
    }
}
