//! Process-wide run counters shared by the reader, workers and writer

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters updated concurrently during a run
#[derive(Debug, Default)]
pub struct Counters {
    total_lines: AtomicU64,
    valid_lines: AtomicU64,
    invalid_lines: AtomicU64,
    sampled_invalid: AtomicU64,
    lost_batches: AtomicU64,
    lost_digests: AtomicU64,
}

/// Point-in-time copy of [`Counters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Every line produced by the reader
    pub total_lines: u64,
    /// Lines that parsed as an address (duplicates included)
    pub valid_lines: u64,
    /// Lines that failed to parse
    pub invalid_lines: u64,
    /// Invalid lines written to the warnings log
    pub sampled_invalid: u64,
    /// Batches dropped after exhausting commit retries
    pub lost_batches: u64,
    /// Digests inside dropped batches
    pub lost_digests: u64,
}

impl Counters {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Add lines produced by the reader, returning the new total
    pub fn add_lines(&self, n: u64) -> u64 {
        self.total_lines.fetch_add(n, Ordering::Relaxed) + n
    }

    /// Add lines that parsed successfully
    pub fn add_valid(&self, n: u64) {
        self.valid_lines.fetch_add(n, Ordering::Relaxed);
    }

    /// Count one invalid line
    pub fn add_invalid(&self) {
        self.invalid_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Current number of sampled invalid lines
    pub fn sampled(&self) -> u64 {
        self.sampled_invalid.load(Ordering::Acquire)
    }

    /// Count one sampled invalid line
    pub fn add_sampled(&self) {
        self.sampled_invalid.fetch_add(1, Ordering::AcqRel);
    }

    /// Account a batch the writer could not persist
    pub fn add_lost_batch(&self, digests: usize) {
        self.lost_batches.fetch_add(1, Ordering::Relaxed);
        self.lost_digests
            .fetch_add(digests as u64, Ordering::Relaxed);
    }

    /// Total lines seen so far
    pub fn total_lines(&self) -> u64 {
        self.total_lines.load(Ordering::Relaxed)
    }

    /// Read every counter
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            total_lines: self.total_lines.load(Ordering::Relaxed),
            valid_lines: self.valid_lines.load(Ordering::Relaxed),
            invalid_lines: self.invalid_lines.load(Ordering::Relaxed),
            sampled_invalid: self.sampled_invalid.load(Ordering::Relaxed),
            lost_batches: self.lost_batches.load(Ordering::Relaxed),
            lost_digests: self.lost_digests.load(Ordering::Relaxed),
        }
    }
}
