//! Commands module
//!
//! Defines the CLI commands, the composition root wiring all engine
//! services, and the shared batch-report rendering.

mod run;
mod version;

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arca_client::{DepositionApi, DepositionClient};
use arca_core::domain::BatchReport;
use arca_engine::{
    ComponentRuntime, ExecutionSupervisor, JsonCatalog, JsonStore, ProbingRuntime, RateLimitedApi,
    RateLimiter,
};

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline over a batch of records
    Run {
        /// Pipeline definition file (JSON)
        pipeline: PathBuf,

        /// Batch file listing record ids, source files, and metadata
        batch: PathBuf,
    },
    /// Create new draft versions of published records and run the pipeline
    /// on them
    Version {
        /// Pipeline definition file (JSON)
        pipeline: PathBuf,

        /// Version request file listing concept ids and new source files
        requests: PathBuf,
    },
}

/// Handle a CLI command
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run { pipeline, batch } => run::handle_run(config, &pipeline, &batch).await,
        Commands::Version { pipeline, requests } => {
            version::handle_version(config, &pipeline, &requests).await
        }
    }
}

/// All engine services, wired once per invocation
pub(crate) struct Services {
    pub store: Arc<JsonStore>,
    pub catalog: Arc<JsonCatalog>,
    pub api: Arc<dyn DepositionApi>,
    pub supervisor: Arc<ExecutionSupervisor>,
    pub runtime: Arc<dyn ComponentRuntime>,
}

/// Composition root: durable stores, rate-limited client, supervisor,
/// runtime prober
pub(crate) fn compose(config: &Config) -> Result<Services> {
    std::fs::create_dir_all(&config.state_dir).with_context(|| {
        format!(
            "Failed to create state directory {}",
            config.state_dir.display()
        )
    })?;

    let store = Arc::new(
        JsonStore::open(config.store_path()).context("Failed to open the record store")?,
    );
    let catalog = Arc::new(
        JsonCatalog::open(config.catalog_path()).context("Failed to open the file catalog")?,
    );
    let limiter = Arc::new(
        RateLimiter::open(config.ratelimit_path(), config.rate_limits)
            .context("Failed to open the rate limiter state")?,
    );

    let client = DepositionClient::new(config.repository_url.clone(), config.token.clone());
    let api: Arc<dyn DepositionApi> = Arc::new(RateLimitedApi::new(client, limiter));

    Ok(Services {
        store,
        catalog,
        api,
        supervisor: Arc::new(ExecutionSupervisor::new()),
        runtime: Arc::new(ProbingRuntime::new()),
    })
}

/// Reads and parses a JSON definition file
pub(crate) fn load_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file {}", what, path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {} file {}", what, path.display()))
}

/// Prints the end-of-batch report and fails on partial failure
pub(crate) fn finish_with_report(report: &BatchReport) -> Result<()> {
    println!();
    println!("{}", "Batch report".bold());
    for id in &report.succeeded {
        println!("  {} {}", "ok".green(), id);
    }
    for failure in &report.failed {
        println!(
            "  {} {}: {}",
            "failed".red(),
            failure.item_id,
            failure.message
        );
    }
    println!();
    println!(
        "{} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );

    if !report.success() {
        anyhow::bail!("{} item(s) failed", report.failed.len());
    }
    Ok(())
}
