//! Pipeline configuration
//!
//! All tunables live in [`PipelineConfig`]. Defaults mirror the block, batch
//! and retry sizes the tool has always shipped with; a JSON file can override
//! any subset of them:
//!
//! ```json
//! { "batch_size": 5000, "index_mode": "resume", "open_retry": { "attempts": 5, "backoff_ms": 500 } }
//! ```

use crate::error::{DedupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default read block size (1 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;
/// Default number of digests per batch handed to the writer
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
/// Default capacity of the batch queue, in batches
pub const DEFAULT_BATCH_QUEUE_CAPACITY: usize = 100;
/// Default progress reporting interval, in lines
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1_000_000;
/// Default cap on invalid lines written to the warnings log
pub const DEFAULT_MAX_INVALID_SAMPLES: u64 = 10;
/// Default dedup index directory
pub const DEFAULT_INDEX_DIR: &str = "dedup_index";
/// Default warnings log path
pub const DEFAULT_WARNINGS_PATH: &str = "warnings.log";
/// Default memory report interval
pub const DEFAULT_MEMORY_REPORT_SECS: u64 = 5;

/// Line batches queued per worker when `line_queue_capacity` is 0
const LINE_QUEUE_PER_WORKER: usize = 4;

/// Fixed-backoff retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    /// Delay between attempts in milliseconds
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Create a policy with the given attempt ceiling and backoff
    pub const fn new(attempts: u32, backoff_ms: u64) -> Self {
        Self {
            attempts,
            backoff_ms,
        }
    }

    /// Backoff between attempts
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

/// Whether the dedup index starts empty or keeps keys from earlier runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Destroy any existing index before the run
    #[default]
    Fresh,
    /// Reuse the existing index; uniques accumulate across runs
    Resume,
}

impl fmt::Display for IndexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexMode::Fresh => write!(f, "fresh"),
            IndexMode::Resume => write!(f, "resume"),
        }
    }
}

impl FromStr for IndexMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fresh" => Ok(IndexMode::Fresh),
            "resume" => Ok(IndexMode::Resume),
            other => Err(format!(
                "unknown index mode '{}' (expected 'fresh' or 'resume')",
                other
            )),
        }
    }
}

/// Configuration for a deduplication run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bytes read from the source per block
    pub block_size: usize,
    /// Worker threads (0 = available parallelism)
    pub workers: usize,
    /// Line batches buffered between reader and workers (0 = 4 per worker)
    pub line_queue_capacity: usize,
    /// Digests per batch handed to the writer
    pub batch_size: usize,
    /// Batches buffered between workers and writer
    pub batch_queue_capacity: usize,
    /// Report progress every N lines (0 disables)
    pub progress_interval: u64,
    /// Cap on sampled invalid lines in the warnings log
    pub max_invalid_samples: u64,
    /// Retry policy for opening the source
    pub open_retry: RetryPolicy,
    /// Retry policy for mid-stream read errors
    pub read_retry: RetryPolicy,
    /// Retry policy for batch commits
    pub persist_retry: RetryPolicy,
    /// Fresh or resumed index
    pub index_mode: IndexMode,
    /// Directory of the persistent dedup index
    pub index_dir: PathBuf,
    /// Path of the warnings log
    pub warnings_path: PathBuf,
    /// Seconds between memory usage reports (0 disables)
    pub memory_report_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            workers: 0,
            line_queue_capacity: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_queue_capacity: DEFAULT_BATCH_QUEUE_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_invalid_samples: DEFAULT_MAX_INVALID_SAMPLES,
            open_retry: RetryPolicy::new(3, 2000),
            read_retry: RetryPolicy::new(3, 2000),
            persist_retry: RetryPolicy::new(3, 100),
            index_mode: IndexMode::Fresh,
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            warnings_path: PathBuf::from(DEFAULT_WARNINGS_PATH),
            memory_report_interval_secs: DEFAULT_MEMORY_REPORT_SECS,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DedupError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(DedupError::Config("block_size must be at least 1 byte".into()));
        }
        if self.batch_size == 0 {
            return Err(DedupError::Config("batch_size must be at least 1".into()));
        }
        if self.batch_queue_capacity == 0 {
            return Err(DedupError::Config(
                "batch_queue_capacity must be at least 1".into(),
            ));
        }
        for (name, policy) in [
            ("open_retry", &self.open_retry),
            ("read_retry", &self.read_retry),
            ("persist_retry", &self.persist_retry),
        ] {
            if policy.attempts == 0 {
                return Err(DedupError::Config(format!(
                    "{}.attempts must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Worker count with 0 resolved to the available parallelism
    pub fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .max(1)
    }

    /// Line queue capacity with 0 resolved against the worker count
    pub fn line_queue_len(&self) -> usize {
        if self.line_queue_capacity > 0 {
            self.line_queue_capacity
        } else {
            self.worker_count() * LINE_QUEUE_PER_WORKER
        }
    }

    /// Memory report interval, `None` when disabled
    pub fn memory_report_interval(&self) -> Option<Duration> {
        (self.memory_report_interval_secs > 0)
            .then(|| Duration::from_secs(self.memory_report_interval_secs))
    }
}
