//! Durable rate limiter
//!
//! Token accounting for two windows (per-minute, per-hour) that survives
//! process restarts: counters are persisted to a JSON state file after each
//! acquisition and reloaded on construction. Every remote-API call passes
//! through `acquire` before being sent.

use crate::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Window limits for remote-API calls
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimits {
    pub per_minute: u32,
    pub per_hour: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: 60,
            per_hour: 1800,
        }
    }
}

/// Persisted counter state: window anchors (unix seconds) plus counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
struct WindowState {
    minute_start: i64,
    minute_count: u32,
    hour_start: i64,
    hour_count: u32,
}

/// Durable, restart-surviving rate limiter
///
/// Safe for concurrent use; the counters are guarded by a mutex and each
/// successful acquisition is written to disk atomically (temp file + rename).
pub struct RateLimiter {
    limits: RateLimits,
    path: PathBuf,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Opens (or creates) a limiter backed by the given state file
    pub fn open(path: impl Into<PathBuf>, limits: RateLimits) -> Result<Self> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("Rate limiter state file corrupt, starting fresh: {}", e);
                WindowState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => WindowState::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            limits,
            path,
            state: Mutex::new(state),
        })
    }

    /// Waits until both windows have capacity, then records the call
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait) => {
                    debug!("Rate limit reached, waiting {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Records a call if capacity is available, otherwise returns how long
    /// to wait before the nearest window rolls over
    pub fn try_acquire(&self) -> std::result::Result<(), Duration> {
        let now = Utc::now().timestamp();
        let mut state = self.state.lock().unwrap();

        roll_windows(&mut state, now);

        if state.minute_count >= self.limits.per_minute {
            let wait = (state.minute_start + 60 - now).max(1);
            return Err(Duration::from_secs(wait as u64));
        }
        if state.hour_count >= self.limits.per_hour {
            let wait = (state.hour_start + 3600 - now).max(1);
            return Err(Duration::from_secs(wait as u64));
        }

        state.minute_count += 1;
        state.hour_count += 1;

        if let Err(e) = self.persist(&state) {
            // Counters stay correct in-memory; durability degrades until
            // the next successful write
            warn!("Failed to persist rate limiter state: {}", e);
        }

        Ok(())
    }

    /// Writes the state file atomically
    fn persist(&self, state: &WindowState) -> std::io::Result<()> {
        let tmp = self.path.with_extension("tmp");
        let bytes = serde_json::to_vec_pretty(state)?;
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)
    }

    /// Path of the durable state file
    pub fn state_path(&self) -> &Path {
        &self.path
    }
}

/// Resets a window's anchor and count once its span has elapsed
fn roll_windows(state: &mut WindowState, now: i64) {
    if now - state.minute_start >= 60 {
        state.minute_start = now;
        state.minute_count = 0;
    }
    if now - state.hour_start >= 3600 {
        state.hour_start = now;
        state.hour_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(dir: &tempfile::TempDir, per_minute: u32, per_hour: u32) -> RateLimiter {
        RateLimiter::open(
            dir.path().join("ratelimit.json"),
            RateLimits {
                per_minute,
                per_hour,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_acquire_within_limits() {
        let dir = tempfile::tempdir().unwrap();
        let limiter = limiter(&dir, 3, 10);

        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        // Fourth call in the same minute is rejected with a wait
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_hour_limit_rejects_even_with_minute_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let limiter = limiter(&dir, 10, 2);

        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait <= Duration::from_secs(3600));
    }

    #[test]
    fn test_counters_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratelimit.json");
        let limits = RateLimits {
            per_minute: 2,
            per_hour: 100,
        };

        {
            let limiter = RateLimiter::open(&path, limits).unwrap();
            assert!(limiter.try_acquire().is_ok());
            assert!(limiter.try_acquire().is_ok());
        }

        // A fresh process sees the persisted counts and is still throttled
        let limiter = RateLimiter::open(&path, limits).unwrap();
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_corrupt_state_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratelimit.json");
        std::fs::write(&path, b"not json").unwrap();

        let limiter = RateLimiter::open(&path, RateLimits::default()).unwrap();
        assert!(limiter.try_acquire().is_ok());
    }
}
