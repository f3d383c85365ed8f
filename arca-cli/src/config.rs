//! CLI configuration
//!
//! Holds the deposition-service connection settings and the local state
//! paths (record store, file catalog, rate limiter counters).

use arca_engine::RateLimits;
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote deposition service
    pub repository_url: String,

    /// API token for the deposition service
    pub token: Option<String>,

    /// Directory holding durable state files
    pub state_dir: PathBuf,

    /// Root directory for per-run step output directories
    pub work_dir: PathBuf,

    /// Remote-call rate limits
    pub rate_limits: RateLimits,

    /// Execution status poll interval
    pub poll_interval: Duration,
}

impl Config {
    pub fn new(
        repository_url: String,
        token: Option<String>,
        state_dir: PathBuf,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            repository_url,
            token,
            state_dir,
            work_dir,
            rate_limits: RateLimits::default(),
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join("records.json")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir.join("catalog.json")
    }

    pub fn ratelimit_path(&self) -> PathBuf {
        self.state_dir.join("ratelimit.json")
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.repository_url.is_empty() {
            anyhow::bail!("repository_url cannot be empty");
        }

        if !self.repository_url.starts_with("http://")
            && !self.repository_url.starts_with("https://")
        {
            anyhow::bail!("repository_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::new(
            "https://repo.example".to_string(),
            None,
            PathBuf::from(".arca"),
            PathBuf::from(".arca/work"),
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.store_path(), PathBuf::from(".arca/records.json"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = config();
        assert!(config.validate().is_ok());

        config.repository_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.repository_url = "http://localhost:5000".to_string();
        assert!(config.validate().is_ok());

        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
