//! Pipeline orchestrator
//!
//! Top-level driver: for each batch item, sequences the pipeline's steps
//! through the resolver and the execution supervisor, then drives the record
//! lifecycle (overrides, upload, publish). Items are processed strictly
//! sequentially, trading throughput for predictable compliance with the
//! remote rate limiter. Item failures are caught at the item boundary; the
//! batch never aborts early because one item failed.
//!
//! Within an item the external process runs on its own thread; the
//! orchestrator polls its status at a fixed interval bounded by the step's
//! timeout. On timeout the execution is cancelled (the child process is
//! terminated) before the step is failed.

use crate::error::{EngineError, Result};
use crate::lifecycle::RecordLifecycle;
use crate::overrides::collect_overrides;
use crate::resolver::{ExecutionFileMap, resolve_inputs};
use crate::runtime::ComponentRuntime;
use crate::store::{FileCatalog, FileRole};
use crate::supervisor::ExecutionSupervisor;
use arca_core::domain::{
    BatchItem, BatchReport, ExecutionLog, ExecutionResults, ExecutionStatus, LogLevel,
    OnErrorPolicy, Pipeline, SOURCE_FILE_ID, Step, VersionRequest,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root under which each run gets its own output directory
    pub output_root: PathBuf,
    /// Fixed status-poll interval while a step runs
    pub poll_interval: Duration,
}

impl OrchestratorConfig {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Drives batches of records through pipeline execution and the record
/// lifecycle
///
/// Owns no global state; every collaborator is injected at the composition
/// root.
pub struct PipelineOrchestrator {
    lifecycle: RecordLifecycle,
    supervisor: Arc<ExecutionSupervisor>,
    runtime: Arc<dyn ComponentRuntime>,
    catalog: Arc<dyn FileCatalog>,
    config: OrchestratorConfig,
}

impl PipelineOrchestrator {
    pub fn new(
        lifecycle: RecordLifecycle,
        supervisor: Arc<ExecutionSupervisor>,
        runtime: Arc<dyn ComponentRuntime>,
        catalog: Arc<dyn FileCatalog>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            lifecycle,
            supervisor,
            runtime,
            catalog,
            config,
        }
    }

    /// Processes a batch of items sequentially, one pipeline pass each
    pub async fn run_batch(&self, pipeline: &Pipeline, items: &[BatchItem]) -> BatchReport {
        let mut report = BatchReport::default();

        for item in items {
            info!(
                "Processing item {} through pipeline '{}'",
                item.record_id, pipeline.id
            );
            match self.process_item(pipeline, item, false).await {
                Ok(()) => {
                    info!("Item {} succeeded", item.record_id);
                    report.record_success(item.record_id.clone());
                }
                Err(e) => {
                    warn!("Item {} failed: {}", item.record_id, e);
                    report.record_failure(item.record_id.clone(), e.to_string());
                }
            }
        }

        report
    }

    /// Versioning mode: each item spawns a new draft version of the latest
    /// published record for its concept id, optionally syncs remote files
    /// against the keep-list, then runs the pipeline on the new draft
    pub async fn run_version_batch(
        &self,
        pipeline: &Pipeline,
        requests: &[VersionRequest],
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for request in requests {
            info!("Versioning concept {}", request.concept_id);
            match self.process_version(pipeline, request).await {
                Ok(record_id) => {
                    info!(
                        "Concept {} versioned as record {}",
                        request.concept_id, record_id
                    );
                    report.record_success(record_id);
                }
                Err(e) => {
                    warn!("Concept {} failed: {}", request.concept_id, e);
                    report.record_failure(request.concept_id.clone(), e.to_string());
                }
            }
        }

        report
    }

    async fn process_version(
        &self,
        pipeline: &Pipeline,
        request: &VersionRequest,
    ) -> Result<String> {
        let record = self.lifecycle.new_version(&request.concept_id).await?;
        if request.sync_files {
            self.lifecycle
                .sync_version_files(&record.id, &request.keep_files, &request.source_file)
                .await?;
        }

        let item = BatchItem {
            record_id: record.id.clone(),
            source_file: request.source_file.clone(),
            source_file_id: SOURCE_FILE_ID.to_string(),
        };
        self.process_item(pipeline, &item, true).await?;
        Ok(record.id)
    }

    /// One item end-to-end; `draft_exists` is set in versioning mode, where
    /// the new-version transition already produced the draft and its backup
    /// semantics do not apply
    async fn process_item(
        &self,
        pipeline: &Pipeline,
        item: &BatchItem,
        draft_exists: bool,
    ) -> Result<()> {
        if !draft_exists {
            self.lifecycle.backup(&item.record_id)?;
            if pipeline.create_draft {
                self.lifecycle.create_draft(&item.record_id).await?;
            }
        }

        // Output directory unique to this run of this record
        let output_dir = self
            .config
            .output_root
            .join(format!("{}-{}", item.record_id, Uuid::new_v4()));
        std::fs::create_dir_all(&output_dir)?;

        let mut files =
            ExecutionFileMap::seeded(item.source_file_id.clone(), item.source_file.clone());

        for step in &pipeline.steps {
            let mut result = self
                .run_step(&item.record_id, step, &mut files, &output_dir)
                .await;

            if result.is_err() && step.on_error == OnErrorPolicy::Retry {
                warn!("Step {} failed, retrying once", step.sequence);
                result = self
                    .run_step(&item.record_id, step, &mut files, &output_dir)
                    .await;
            }

            match result {
                Ok(()) => {}
                Err(e) => match step.on_error {
                    OnErrorPolicy::Fail | OnErrorPolicy::Retry => return Err(e),
                    OnErrorPolicy::Skip => {
                        debug!("Step {} failed and was skipped: {}", step.sequence, e);
                    }
                    OnErrorPolicy::Warn => {
                        warn!("Step {} failed, continuing without its outputs: {}", step.sequence, e);
                    }
                },
            }
        }

        let overrides = collect_overrides(pipeline, &files)?;
        self.lifecycle
            .apply_overrides(&item.record_id, &overrides)
            .await?;

        if pipeline.upload_files {
            let paths: Vec<&Path> = files.paths().collect();
            self.lifecycle.upload_files(&item.record_id, &paths).await?;
        }
        if pipeline.publish {
            self.lifecycle.publish(&item.record_id).await?;
        }

        Ok(())
    }

    /// Runs one step: resolve, build, execute, poll to terminal, register
    /// the produced outputs
    async fn run_step(
        &self,
        record_id: &str,
        step: &Step,
        files: &mut ExecutionFileMap,
        output_dir: &Path,
    ) -> Result<()> {
        let inputs = resolve_inputs(step, files)?;
        let built = self.runtime.build(step, &inputs, output_dir)?;

        let execution_id = Uuid::new_v4().to_string();
        info!(
            "Step {} ({}): {}",
            step.sequence,
            step.component,
            built.command.display()
        );
        self.supervisor
            .start(&execution_id, built.command, built.strategy.expected_outputs())?;

        let outcome = self.wait_for_terminal(&execution_id, step).await;
        self.supervisor.remove(&execution_id);
        let (status, results, last_error) = outcome?;

        match status {
            ExecutionStatus::Completed => {
                let produced = results.map(|r| r.output_files).unwrap_or_default();
                for decl in &step.outputs {
                    let path = output_dir.join(&decl.filename);
                    if produced.contains(&path) {
                        self.catalog
                            .register(&path, FileRole::Derived, Some(record_id))?;
                        files.insert(decl.file_id.clone(), path);
                    } else {
                        warn!(
                            "Step {}: declared output '{}' was not produced",
                            step.sequence, decl.filename
                        );
                    }
                }
                Ok(())
            }
            ExecutionStatus::Cancelled => Err(EngineError::ExecutionFailed {
                step: step.sequence,
                component: step.component.clone(),
                reason: "execution was cancelled".to_string(),
            }),
            _ => Err(EngineError::ExecutionFailed {
                step: step.sequence,
                component: step.component.clone(),
                reason: last_error
                    .unwrap_or_else(|| "process exited with a non-zero status".to_string()),
            }),
        }
    }

    /// Polls an execution at a fixed interval until it reaches a terminal
    /// status or the step's timeout expires
    ///
    /// Drains the log channel each pass and forwards entries; a quiet pass
    /// emits a heartbeat so long-running external steps stay visibly alive.
    /// On timeout the execution is cancelled before the error is raised.
    async fn wait_for_terminal(
        &self,
        execution_id: &str,
        step: &Step,
    ) -> Result<(ExecutionStatus, Option<ExecutionResults>, Option<String>)> {
        let queue = self.supervisor.log_queue(execution_id).ok_or_else(|| {
            EngineError::ExecutionFailed {
                step: step.sequence,
                component: step.component.clone(),
                reason: "execution disappeared before completion".to_string(),
            }
        })?;

        let deadline = Instant::now() + Duration::from_secs(step.timeout_seconds);
        let mut last_error = None;

        loop {
            let mut drained_any = false;
            let mut saw_terminal = false;
            while let Some(entry) = queue.pop_timeout(Duration::ZERO) {
                drained_any = true;
                forward_log(step, &entry);
                if entry.status.is_terminal() {
                    saw_terminal = true;
                }
                if entry.level == LogLevel::Error {
                    last_error = Some(entry.message);
                }
            }

            let snapshot = self.supervisor.execution(execution_id);
            let terminal = snapshot
                .as_ref()
                .map(|s| s.status.is_terminal())
                .unwrap_or(true);
            if saw_terminal || terminal {
                return match snapshot {
                    Some(s) => Ok((s.status, s.results, last_error)),
                    None => Err(EngineError::ExecutionFailed {
                        step: step.sequence,
                        component: step.component.clone(),
                        reason: "execution disappeared before completion".to_string(),
                    }),
                };
            }

            if !drained_any {
                // Heartbeat: the process is quiet but alive
                debug!(
                    "Step {} ({}): execution {} still running",
                    step.sequence, step.component, execution_id
                );
            }

            if Instant::now() >= deadline {
                warn!(
                    "Step {} ({}) timed out after {}s, cancelling",
                    step.sequence, step.component, step.timeout_seconds
                );
                self.supervisor.cancel(execution_id);
                return Err(EngineError::ExecutionFailed {
                    step: step.sequence,
                    component: step.component.clone(),
                    reason: format!("timed out after {}s", step.timeout_seconds),
                });
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// Forwards a streamed execution log entry at its classified severity
fn forward_log(step: &Step, entry: &ExecutionLog) {
    match entry.level {
        LogLevel::Debug => debug!("[step {}] {}", step.sequence, entry.message),
        LogLevel::Info | LogLevel::Success => info!("[step {}] {}", step.sequence, entry.message),
        LogLevel::Warning => warn!("[step {}] {}", step.sequence, entry.message),
        LogLevel::Error => error!("[step {}] {}", step.sequence, entry.message),
    }
}
