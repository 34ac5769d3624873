//! Single-consumer writer committing digest batches to the dedup index
//!
//! Each batch is one index transaction. A failed commit is retried with a
//! fixed backoff; once the attempts are spent the batch is dropped and
//! accounted as lost in the shared counters, so the report can flag the run
//! as degraded instead of silently undercounting.

use crate::config::RetryPolicy;
use crate::counters::Counters;
use crate::index::DedupIndex;
use crate::worker::Batch;
use crossbeam_channel::Receiver;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Statistics from the writer thread
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct WriterStats {
    /// Batches committed
    pub batches_committed: u64,
    /// Digests in committed batches (duplicates included)
    pub digests_committed: u64,
    /// Commits that succeeded only after a retry
    pub retried_commits: u64,
    /// Batches dropped after exhausting retries
    pub batches_lost: u64,
}

/// Owns the index for the duration of the write phase
pub struct BatchWriter<I: DedupIndex> {
    index: I,
    retry: RetryPolicy,
    counters: Arc<Counters>,
    stats: WriterStats,
}

impl<I: DedupIndex> BatchWriter<I> {
    /// Create a writer over `index`
    pub fn new(index: I, retry: RetryPolicy, counters: Arc<Counters>) -> Self {
        Self {
            index,
            retry,
            counters,
            stats: WriterStats::default(),
        }
    }

    /// Commit one batch, retrying on failure
    ///
    /// Returns whether the batch was persisted.
    pub fn commit(&mut self, batch: &Batch) -> bool {
        if batch.is_empty() {
            return true;
        }

        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            match self.index.insert_batch(&batch.digests) {
                Ok(()) => {
                    self.stats.batches_committed += 1;
                    self.stats.digests_committed += batch.len() as u64;
                    if attempt > 1 {
                        self.stats.retried_commits += 1;
                    }
                    return true;
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Error writing batch of {} to index (attempt {}/{}): {}",
                        batch.len(),
                        attempt,
                        attempts,
                        e
                    );
                    std::thread::sleep(self.retry.backoff());
                }
                Err(e) => {
                    error!(
                        "Dropping batch of {} digests after {} attempt(s): {}",
                        batch.len(),
                        attempts,
                        e
                    );
                }
            }
        }

        self.stats.batches_lost += 1;
        self.counters.add_lost_batch(batch.len());
        false
    }

    /// Drain the batch queue until every sender is gone, then flush
    ///
    /// Returns the index so the caller can scan it.
    pub fn run(mut self, input: Receiver<Batch>) -> (I, WriterStats) {
        while let Ok(batch) = input.recv() {
            self.commit(&batch);
        }
        if let Err(e) = self.index.flush() {
            error!("Flushing dedup index failed: {}", e);
        }
        debug!(
            "Writer drained: {} batches committed, {} lost",
            self.stats.batches_committed, self.stats.batches_lost
        );
        (self.index, self.stats)
    }

    /// Accumulated statistics
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}
