//! Domain model

pub mod batch;
pub mod execution;
pub mod pipeline;
pub mod record;

pub use batch::{BatchItem, BatchReport, ItemFailure, SOURCE_FILE_ID, VersionRequest};
pub use execution::{
    CommandSpec, ExecutionLog, ExecutionResults, ExecutionStatus, LogLevel, classify_line,
};
pub use pipeline::{MetadataRule, OnErrorPolicy, OutputDecl, Pipeline, Step, StepInput};
pub use record::{CuratedRecord, MetadataBackup, RecordStatus, UploadStatus, UploadedFile};
