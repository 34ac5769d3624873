//! Concurrent streaming deduplication pipeline
//!
//! ```text
//! Reader (caller thread) → [LineBatch queue] → Worker pool → [Batch queue] → Writer → Index
//!                                                                                  ↓
//!                                                              count_keys() → RunReport
//! ```
//!
//! Both queues are bounded crossbeam channels, so a slow writer throttles the
//! workers and, through the line queue, the reader. The writer owns the
//! index until every worker has dropped its batch sender; only then is the
//! index scanned for the unique count.
//!
//! Setting the cancel flag (Ctrl-C in the CLI, or a fatal read error) stops
//! the reader; workers stop taking line batches, flush what they hold and
//! exit, the writer drains, and the run returns an error instead of a report.

use crate::config::PipelineConfig;
use crate::counters::Counters;
use crate::error::{DedupError, Result};
use crate::index::{DedupIndex, RocksIndex};
use crate::memory::MemoryMonitor;
use crate::reader::{ChunkReader, LineBatch};
use crate::report::RunReport;
use crate::warnings::WarningLog;
use crate::worker::{Batch, Worker, WorkerStats};
use crate::writer::{BatchWriter, WriterStats};
use crossbeam_channel::{bounded, Sender};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Callback receiving a line count
pub type LineCountFn = Box<dyn Fn(u64) + Send + Sync>;

/// Everything a finished run produced
pub struct RunOutcome<I> {
    /// Final report
    pub report: RunReport,
    /// The index, handed back after the scan
    pub index: I,
    /// Per-worker statistics
    pub worker_stats: Vec<WorkerStats>,
    /// Writer statistics
    pub writer_stats: WriterStats,
}

/// A configured run over one input file
///
/// ```rust,no_run
/// use ipdedup::{Pipeline, PipelineConfig};
///
/// let report = Pipeline::from_config(PipelineConfig::default())?
///     .with_progress(|lines| println!("Processed {} lines...", lines))
///     .run("addresses.txt")?;
/// println!("{}", report);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Pipeline<I: DedupIndex + 'static, W: Write + Send + 'static = BufWriter<File>> {
    config: PipelineConfig,
    index: I,
    warnings: Arc<WarningLog<W>>,
    cancel: Arc<AtomicBool>,
    progress: Option<LineCountFn>,
    memory_report: Option<LineCountFn>,
    started: Instant,
}

impl Pipeline<RocksIndex> {
    /// Create the warnings log and open the RocksDB index named in `config`
    ///
    /// Either failure is fatal: no line is read.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let started = Instant::now();
        config.validate()?;
        let warnings = WarningLog::create(&config.warnings_path, config.max_invalid_samples)?;
        let index = RocksIndex::open(&config.index_dir, config.index_mode)?;
        let mut pipeline = Self::new(config, index, warnings);
        pipeline.started = started;
        Ok(pipeline)
    }
}

impl<I: DedupIndex + 'static, W: Write + Send + 'static> Pipeline<I, W> {
    /// Assemble a pipeline from its collaborators
    ///
    /// The reported execution time counts from here.
    pub fn new(config: PipelineConfig, index: I, warnings: WarningLog<W>) -> Self {
        Self {
            config,
            index,
            warnings: Arc::new(warnings),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
            memory_report: None,
            started: Instant::now(),
        }
    }

    /// Call `f` with the line count at every multiple of the progress interval
    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(f));
        self
    }

    /// Call `f` with the resident memory in MB at every memory report interval
    pub fn with_memory_report<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.memory_report = Some(Box::new(f));
        self
    }

    /// Flag that cancels the run when set
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run over `input` and return the report
    pub fn run<P: AsRef<Path>>(self, input: P) -> Result<RunReport> {
        self.execute(input).map(|outcome| outcome.report)
    }

    /// Run over `input` and return the report together with the index
    pub fn execute<P: AsRef<Path>>(self, input: P) -> Result<RunOutcome<I>> {
        self.config.validate()?;
        let reader = ChunkReader::open(
            input,
            self.config.block_size,
            self.config.open_retry,
            self.config.read_retry,
        )?;
        self.execute_reader(reader)
    }

    /// Run over an already-open reader
    pub fn execute_reader(self, mut reader: ChunkReader) -> Result<RunOutcome<I>> {
        let Pipeline {
            config,
            index,
            warnings,
            cancel,
            progress,
            memory_report,
            started,
        } = self;
        config.validate()?;
        let input = reader.path().to_path_buf();

        let workers = config.worker_count();
        info!(
            "Processing {} with {} workers (batch size {}, {} index, up to {} invalid samples)",
            input.display(),
            workers,
            config.batch_size,
            config.index_mode,
            warnings.max_samples()
        );

        let memory_monitor = config.memory_report_interval().map(|interval| {
            let report: LineCountFn = match memory_report {
                Some(report) => report,
                None => Box::new(|mb: u64| info!("Memory usage: {} MB", mb)),
            };
            MemoryMonitor::spawn(interval, report)
        });

        let counters = Arc::new(Counters::new());
        let (line_tx, line_rx) = bounded::<LineBatch>(config.line_queue_len());
        let (batch_tx, batch_rx) = bounded::<Batch>(config.batch_queue_capacity);

        let writer = BatchWriter::new(index, config.persist_retry, Arc::clone(&counters));
        let writer_handle = spawn_named("ipdedup-writer".to_string(), move || {
            writer.run(batch_rx)
        })?;

        let mut worker_handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let line_rx = line_rx.clone();
            let worker = Worker::new(
                config.batch_size,
                batch_tx.clone(),
                Arc::clone(&counters),
                Arc::clone(&warnings),
            );
            let cancel = Arc::clone(&cancel);
            let handle = spawn_named(format!("ipdedup-worker-{}", worker_id), move || {
                worker.run(line_rx, &cancel)
            })?;
            worker_handles.push(handle);
        }
        // Workers and writer hold the only remaining ends
        drop(line_rx);
        drop(batch_tx);

        let read_result = read_all(
            &mut reader,
            &line_tx,
            &counters,
            &cancel,
            config.progress_interval,
            progress.as_deref(),
        );
        drop(line_tx);
        debug!(
            "Read {} bytes from {}",
            reader.bytes_consumed(),
            input.display()
        );
        if let Err(ref e) = read_result {
            error!("Reading stopped: {}", e);
            cancel.store(true, Ordering::Relaxed);
        }

        let mut worker_stats = Vec::with_capacity(workers);
        let mut worker_error = None;
        for handle in worker_handles {
            match handle.join() {
                Ok(Ok(stats)) => worker_stats.push(stats),
                Ok(Err(e)) => {
                    error!("Worker failed: {}", e);
                    worker_error.get_or_insert(e);
                }
                Err(_) => {
                    worker_error.get_or_insert(DedupError::WorkerPanicked("worker".into()));
                }
            }
        }

        let writer_result = writer_handle.join();
        if let Err(e) = warnings.flush() {
            warn!("Could not flush warnings log: {}", e);
        }
        if let Some(monitor) = memory_monitor {
            monitor.stop();
        }

        let (index, writer_stats) =
            writer_result.map_err(|_| DedupError::WorkerPanicked("writer".into()))?;
        if let Some(e) = worker_error {
            return Err(e);
        }
        read_result?;
        if cancel.load(Ordering::Relaxed) {
            return Err(DedupError::Cancelled);
        }

        debug!("Writer drained, scanning dedup index");
        let unique = index.count_keys()?;
        let report = RunReport::new(
            input.clone(),
            config.index_mode,
            workers,
            counters.snapshot(),
            unique,
            started.elapsed(),
        );
        if report.is_degraded() {
            warn!(
                "{} batch(es) were not persisted; unique count is a lower bound",
                report.lost_batches
            );
        }
        info!(
            "Finished {}: {} lines, {} unique, {} invalid in {:?}",
            input.display(),
            report.total_lines,
            report.unique_addresses,
            report.invalid_lines,
            report.elapsed
        );

        Ok(RunOutcome {
            report,
            index,
            worker_stats,
            writer_stats,
        })
    }
}

/// Reader loop: feed line batches to the workers until EOF, error or cancel
fn read_all(
    reader: &mut ChunkReader,
    output: &Sender<LineBatch>,
    counters: &Counters,
    cancel: &AtomicBool,
    progress_interval: u64,
    progress: Option<&(dyn Fn(u64) + Send + Sync)>,
) -> Result<()> {
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(DedupError::Cancelled);
        }
        let Some(batch) = reader.next_batch()? else {
            return Ok(());
        };

        let lines = batch.len() as u64;
        let after = counters.add_lines(lines);
        report_progress(after - lines, after, progress_interval, progress);

        if output.send(batch).is_err() {
            if cancel.load(Ordering::Relaxed) {
                return Err(DedupError::Cancelled);
            }
            return Err(DedupError::Other(
                "line queue closed: no worker is running".into(),
            ));
        }
    }
}

/// Report each progress multiple crossed going from `before` to `after` lines
fn report_progress(
    before: u64,
    after: u64,
    interval: u64,
    progress: Option<&(dyn Fn(u64) + Send + Sync)>,
) {
    if interval == 0 {
        return;
    }
    for step in (before / interval + 1)..=(after / interval) {
        let lines = step * interval;
        match progress {
            Some(cb) => cb(lines),
            None => info!("Processed {} lines...", lines),
        }
    }
}

fn spawn_named<T, F>(name: String, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    thread::Builder::new()
        .name(name)
        .spawn(f)
        .map_err(DedupError::from)
}
