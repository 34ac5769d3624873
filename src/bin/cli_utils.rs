use anyhow::{Context, Result};
use ipdedup::RunReport;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

/// Route diagnostics to stderr; stdout carries only progress and the report
pub fn setup_logging(verbose: bool, quiet: bool) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = log_filter(verbose, quiet, rust_log.as_deref())?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(verbose)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;
    Ok(())
}

/// A non-empty `RUST_LOG` wins over `-v`/`-q`
pub fn log_filter(verbose: bool, quiet: bool, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid RUST_LOG '{}'", directives));
    }

    let level = if quiet {
        Level::WARN
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    Ok(EnvFilter::new(format!("ipdedup={}", level)))
}

/// Thread count argument: "auto" or "0" leaves the choice to the pipeline
pub fn parse_threads(arg: Option<&str>) -> Result<Option<usize>> {
    match arg {
        None => Ok(None),
        Some("auto") | Some("0") => Ok(Some(0)),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .with_context(|| format!("Invalid thread count '{}', expected a number or 'auto'", s)),
    }
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

pub fn format_rate(per_sec: f64) -> String {
    if per_sec >= 1_000_000.0 {
        format!("{:.2}M", per_sec / 1_000_000.0)
    } else if per_sec >= 1_000.0 {
        format!("{:.2}K", per_sec / 1_000.0)
    } else {
        format!("{:.2}", per_sec)
    }
}

/// One-line summary for stderr
pub fn summary_line(report: &RunReport) -> String {
    let secs = report.elapsed.as_secs_f64();
    let rate = if secs > 0.0 {
        report.total_lines as f64 / secs
    } else {
        0.0
    };
    format!(
        "{} lines ({} valid, {} duplicate) at {} lines/s on {} workers",
        format_number(report.total_lines),
        format_number(report.valid_lines),
        format_number(report.duplicate_lines()),
        format_rate(rate),
        report.workers
    )
}
