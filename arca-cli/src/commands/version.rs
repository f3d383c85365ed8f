//! Version batch command
//!
//! Spawns a new draft version of the latest published record for each
//! requested concept id, optionally syncing remote files against the
//! request's keep-list, then runs the pipeline on the new drafts.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use arca_core::domain::{Pipeline, VersionRequest};
use arca_engine::{OrchestratorConfig, PipelineOrchestrator, RecordLifecycle};

use crate::config::Config;

#[derive(Debug, Deserialize)]
struct VersionFile {
    requests: Vec<VersionRequest>,
}

pub async fn handle_version(
    config: &Config,
    pipeline_path: &Path,
    requests_path: &Path,
) -> Result<()> {
    let pipeline: Pipeline = super::load_json(pipeline_path, "pipeline")?;
    let file: VersionFile = super::load_json(requests_path, "version request")?;
    info!(
        "Loaded pipeline '{}' and {} version request(s)",
        pipeline.id,
        file.requests.len()
    );

    let services = super::compose(config)?;
    let lifecycle = RecordLifecycle::new(
        services.store.clone(),
        services.api.clone(),
        services.catalog.clone(),
    );

    let mut orchestrator_config = OrchestratorConfig::new(&config.work_dir);
    orchestrator_config.poll_interval = config.poll_interval;
    let orchestrator = PipelineOrchestrator::new(
        lifecycle,
        services.supervisor,
        services.runtime,
        services.catalog.clone(),
        orchestrator_config,
    );

    let report = orchestrator.run_version_batch(&pipeline, &file.requests).await;
    super::finish_with_report(&report)
}
