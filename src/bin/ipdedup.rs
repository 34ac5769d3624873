mod cli_utils;

use anyhow::{Context, Result};
use clap::Parser;
use ipdedup::{IndexMode, Pipeline, PipelineConfig};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{debug, info};

use cli_utils::{parse_threads, setup_logging, summary_line};

#[derive(Parser)]
#[command(name = "ipdedup")]
#[command(
    about = "Count distinct IP addresses in very large text files",
    long_about = "ipdedup - Count distinct IPv4/IPv6 addresses in newline-delimited files\n\n\
    Reads the input in blocks, validates and normalizes each line on a pool of\n\
    worker threads, and records every distinct address in a persistent on-disk\n\
    index so inputs much larger than memory can be counted.\n\n\
    Invalid lines are counted; the first few are written to a warnings log.\n\
    Files ending in .gz are decompressed on the fly.\n\n\
    Examples:\n\
      ipdedup addresses.txt\n\
      ipdedup addresses.txt.gz --index-dir /data/idx -j 8\n\
      ipdedup more.txt --index-dir /data/idx --index-mode resume --json"
)]
#[command(version)]
struct Cli {
    /// Input file, one address per line (.gz supported)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// JSON configuration file; flags below override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory of the persistent dedup index
    #[arg(long, value_name = "DIR")]
    index_dir: Option<PathBuf>,

    /// Start from an empty index (fresh) or add to an existing one (resume)
    #[arg(long, value_name = "MODE")]
    index_mode: Option<IndexMode>,

    /// Where sampled invalid lines are written
    #[arg(long, value_name = "FILE")]
    warnings: Option<PathBuf>,

    /// Number of worker threads (default: all cores, "auto" or 0 for the same)
    #[arg(short = 'j', long)]
    threads: Option<String>,

    /// Digests per index transaction
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Bytes read from the input per block
    #[arg(long, value_name = "BYTES")]
    block_size: Option<usize>,

    /// Maximum invalid lines written to the warnings log
    #[arg(long, value_name = "N")]
    max_samples: Option<u64>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Do not print periodic memory usage
    #[arg(long)]
    no_memory_report: bool,

    /// Debug logging on stderr
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors on stderr
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = &self.index_dir {
            config.index_dir = dir.clone();
        }
        if let Some(mode) = self.index_mode {
            config.index_mode = mode;
        }
        if let Some(path) = &self.warnings {
            config.warnings_path = path.clone();
        }
        if let Some(workers) = parse_threads(self.threads.as_deref())? {
            config.workers = workers;
        }
        if let Some(n) = self.batch_size {
            config.batch_size = n;
        }
        if let Some(n) = self.block_size {
            config.block_size = n;
        }
        if let Some(n) = self.max_samples {
            config.max_invalid_samples = n;
        }
        if self.no_memory_report {
            config.memory_report_interval_secs = 0;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet)?;

    let config = cli.pipeline_config()?;
    debug!("Configuration: {:?}", config);

    let pipeline = Pipeline::from_config(config).context("Failed to set up run")?;

    // With --json stdout holds only the report
    let json = cli.json;
    let pipeline = pipeline
        .with_progress(move |lines| {
            if json {
                info!("Processed {} lines...", lines);
            } else {
                println!("Processed {} lines...", lines);
            }
        })
        .with_memory_report(move |mb| {
            if json {
                info!("Memory usage: {} MB", mb);
            } else {
                println!("Memory usage: {} MB", mb);
            }
        });

    let cancel = pipeline.cancel_handle();
    ctrlc::set_handler(move || {
        eprintln!("\n[INFO] Cancelling...");
        cancel.store(true, Ordering::Relaxed);
    })
    .context("Failed to set Ctrl+C handler")?;

    let report = pipeline.run(&cli.input).map_err(|e| {
        let what = if e.is_setup_failure() {
            "Could not start processing"
        } else {
            "Processing stopped for"
        };
        anyhow::Error::new(e).context(format!("{} {}", what, cli.input.display()))
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        println!("{}", report);
    }
    info!("{}", summary_line(&report));

    Ok(())
}
