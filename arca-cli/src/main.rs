//! Arca CLI
//!
//! Command-line interface for the Arca curation engine: runs data files
//! through multi-step processing pipelines and synchronizes the results
//! with a remote deposition service.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "arca")]
#[command(about = "Data curation pipeline and deposition CLI", long_about = None)]
struct Cli {
    /// Deposition service base URL
    #[arg(
        long,
        env = "ARCA_REPOSITORY_URL",
        default_value = "http://localhost:5000"
    )]
    repository_url: String,

    /// API token for the deposition service
    #[arg(long, env = "ARCA_API_TOKEN")]
    token: Option<String>,

    /// Directory holding durable state (record store, catalog, rate limiter)
    #[arg(long, env = "ARCA_STATE_DIR", default_value = ".arca")]
    state_dir: PathBuf,

    /// Root directory for step output directories
    #[arg(long, env = "ARCA_WORK_DIR", default_value = ".arca/work")]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arca=info,arca_engine=info,arca_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = Config::new(cli.repository_url, cli.token, cli.state_dir, cli.work_dir);
    config.validate()?;

    handle_command(cli.command, &config).await
}
