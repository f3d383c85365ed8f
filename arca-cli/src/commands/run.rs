//! Batch run command
//!
//! Prepares each record from the batch file's metadata, then runs the
//! pipeline over the batch. A record that fails preparation is reported as
//! a failed item and does not stop the others.

use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use arca_core::domain::{BatchItem, BatchReport, Pipeline, SOURCE_FILE_ID};
use arca_engine::{OrchestratorConfig, PipelineOrchestrator, RecordLifecycle};

use crate::config::Config;

/// One entry of a batch definition file
#[derive(Debug, Deserialize)]
struct BatchEntry {
    record_id: String,
    source_file: PathBuf,
    #[serde(default = "default_source_file_id")]
    source_file_id: String,
    metadata: serde_json::Value,
}

fn default_source_file_id() -> String {
    SOURCE_FILE_ID.to_string()
}

#[derive(Debug, Deserialize)]
struct BatchFile {
    items: Vec<BatchEntry>,
}

pub async fn handle_run(config: &Config, pipeline_path: &Path, batch_path: &Path) -> Result<()> {
    let pipeline: Pipeline = super::load_json(pipeline_path, "pipeline")?;
    let batch: BatchFile = super::load_json(batch_path, "batch")?;
    info!(
        "Loaded pipeline '{}' ({} steps) and {} batch item(s)",
        pipeline.id,
        pipeline.steps.len(),
        batch.items.len()
    );

    let services = super::compose(config)?;
    let lifecycle = RecordLifecycle::new(
        services.store.clone(),
        services.api.clone(),
        services.catalog.clone(),
    );

    let mut report = BatchReport::default();
    let mut items = Vec::new();
    for entry in batch.items {
        match lifecycle.prepare(&entry.record_id, entry.metadata) {
            Ok(_) => items.push(BatchItem {
                record_id: entry.record_id,
                source_file: entry.source_file,
                source_file_id: entry.source_file_id,
            }),
            Err(e) => report.record_failure(entry.record_id, e.to_string()),
        }
    }

    let mut orchestrator_config = OrchestratorConfig::new(&config.work_dir);
    orchestrator_config.poll_interval = config.poll_interval;
    let orchestrator = PipelineOrchestrator::new(
        lifecycle,
        services.supervisor,
        services.runtime,
        services.catalog.clone(),
        orchestrator_config,
    );

    let run_report = orchestrator.run_batch(&pipeline, &items).await;
    report.succeeded.extend(run_report.succeeded);
    report.failed.extend(run_report.failed);

    super::finish_with_report(&report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_file_parses_with_defaults() {
        let raw = json!({
            "items": [{
                "record_id": "r1",
                "source_file": "/data/a.csv",
                "metadata": {"title": "Survey data", "version": "0.0.1"}
            }]
        });
        let batch: BatchFile = serde_json::from_value(raw).unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].source_file_id, SOURCE_FILE_ID);
    }
}
