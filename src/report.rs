//! Final run report

use crate::config::IndexMode;
use crate::counters::CounterSnapshot;
use serde_json::json;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Source file
    pub input: PathBuf,
    /// Index mode the run used
    pub index_mode: IndexMode,
    /// Worker threads used
    pub workers: usize,
    /// Every line read
    pub total_lines: u64,
    /// Lines that parsed as an address
    pub valid_lines: u64,
    /// Lines that did not
    pub invalid_lines: u64,
    /// Invalid lines written to the warnings log
    pub sampled_invalid: u64,
    /// Keys in the dedup index after the run
    pub unique_addresses: u64,
    /// Batches the writer had to drop
    pub lost_batches: u64,
    /// Digests in dropped batches
    pub lost_digests: u64,
    /// Wall-clock time from setup to report
    pub elapsed: Duration,
}

impl RunReport {
    /// Combine counters with the index scan result
    pub fn new(
        input: PathBuf,
        index_mode: IndexMode,
        workers: usize,
        counters: CounterSnapshot,
        unique_addresses: u64,
        elapsed: Duration,
    ) -> Self {
        Self {
            input,
            index_mode,
            workers,
            total_lines: counters.total_lines,
            valid_lines: counters.valid_lines,
            invalid_lines: counters.invalid_lines,
            sampled_invalid: counters.sampled_invalid,
            unique_addresses,
            lost_batches: counters.lost_batches,
            lost_digests: counters.lost_digests,
            elapsed,
        }
    }

    /// True if some digests never reached the index
    pub fn is_degraded(&self) -> bool {
        self.lost_batches > 0 || self.lost_digests > 0
    }

    /// Valid occurrences that repeated an address already seen
    ///
    /// Only meaningful in fresh mode without lost batches.
    pub fn duplicate_lines(&self) -> u64 {
        self.valid_lines.saturating_sub(self.unique_addresses)
    }

    /// JSON form of the report
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "input": self.input.display().to_string(),
            "index_mode": self.index_mode.to_string(),
            "workers": self.workers,
            "total_lines": self.total_lines,
            "valid_lines": self.valid_lines,
            "invalid_lines": self.invalid_lines,
            "sampled_invalid": self.sampled_invalid,
            "unique_addresses": self.unique_addresses,
            "lost_batches": self.lost_batches,
            "lost_digests": self.lost_digests,
            "degraded": self.is_degraded(),
            "elapsed_seconds": self.elapsed.as_secs_f64(),
        })
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total lines processed: {}", self.total_lines)?;
        writeln!(
            f,
            "Number of unique valid IP addresses: {}",
            self.unique_addresses
        )?;
        writeln!(f, "Number of invalid IP addresses: {}", self.invalid_lines)?;
        if self.is_degraded() {
            writeln!(
                f,
                "Degraded: {} batch(es) holding {} address(es) were not persisted; unique count may be low",
                self.lost_batches, self.lost_digests
            )?;
        }
        write!(f, "Execution time: {:?}", self.elapsed)
    }
}
