//! Validation/hash workers and per-worker batch aggregation

use crate::address::{Digest, ParsedAddress};
use crate::counters::Counters;
use crate::error::{DedupError, Result};
use crate::reader::LineBatch;
use crate::warnings::WarningLog;
use crossbeam_channel::{Receiver, Sender};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Digests accumulated by one worker before being handed to the writer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Digests in arrival order
    pub digests: Vec<Digest>,
}

impl Batch {
    /// Create an empty batch with room for `capacity` digests
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            digests: Vec::with_capacity(capacity),
        }
    }

    /// Number of digests
    pub fn len(&self) -> usize {
        self.digests.len()
    }

    /// True if no digests were added
    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

/// Statistics from one worker thread
#[derive(Default, Clone, Debug)]
pub struct WorkerStats {
    /// Lines processed
    pub lines_processed: u64,
    /// Lines that parsed as an address
    pub valid_lines: u64,
    /// Lines that failed to parse
    pub invalid_lines: u64,
    /// Batches handed to the writer
    pub batches_sent: u64,
}

/// Parses lines, hashes valid addresses and batches their digests
pub struct Worker<W: Write + Send> {
    batch_size: usize,
    batch: Batch,
    unreported_valid: u64,
    output: Sender<Batch>,
    counters: Arc<Counters>,
    warnings: Arc<WarningLog<W>>,
    stats: WorkerStats,
}

impl<W: Write + Send> Worker<W> {
    /// Create a worker handing batches of `batch_size` digests to `output`
    pub fn new(
        batch_size: usize,
        output: Sender<Batch>,
        counters: Arc<Counters>,
        warnings: Arc<WarningLog<W>>,
    ) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            batch: Batch::with_capacity(batch_size),
            unreported_valid: 0,
            output,
            counters,
            warnings,
            stats: WorkerStats::default(),
        }
    }

    /// Process one raw line
    pub fn process_line(&mut self, line: &[u8]) -> Result<()> {
        self.stats.lines_processed += 1;

        match ParsedAddress::parse_bytes(line) {
            Some(address) => {
                self.stats.valid_lines += 1;
                self.unreported_valid += 1;
                self.batch.digests.push(address.digest());
                if self.batch.len() >= self.batch_size {
                    self.send_batch()?;
                }
            }
            None => {
                self.stats.invalid_lines += 1;
                self.counters.add_invalid();
                if let Err(e) = self.warnings.sample(&self.counters, line) {
                    warn!("Could not record invalid line: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Process every line of a batch
    pub fn process_batch(&mut self, lines: &LineBatch) -> Result<()> {
        for line in lines.lines() {
            self.process_line(line)?;
        }
        Ok(())
    }

    /// Consume line batches until the queue closes or `cancel` is set,
    /// then flush the partial batch
    pub fn run(mut self, input: Receiver<LineBatch>, cancel: &AtomicBool) -> Result<WorkerStats> {
        while let Ok(lines) = input.recv() {
            if cancel.load(Ordering::Relaxed) {
                debug!("Worker stopping early on cancellation");
                break;
            }
            self.process_batch(&lines)?;
        }
        self.finish()
    }

    /// Flush any partial batch and return the worker's statistics
    pub fn finish(mut self) -> Result<WorkerStats> {
        if !self.batch.is_empty() {
            self.send_batch()?;
        }
        self.report_valid();
        Ok(self.stats)
    }

    /// Accumulated statistics
    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    fn send_batch(&mut self) -> Result<()> {
        let full = std::mem::replace(&mut self.batch, Batch::with_capacity(self.batch_size));
        self.report_valid();
        self.output
            .send(full)
            .map_err(|_| DedupError::Other("batch queue closed before workers finished".into()))?;
        self.stats.batches_sent += 1;
        Ok(())
    }

    fn report_valid(&mut self) {
        if self.unreported_valid > 0 {
            self.counters.add_valid(self.unreported_valid);
            self.unreported_valid = 0;
        }
    }
}
