//! ipdedup - Count distinct IP addresses in very large text files
//!
//! ipdedup streams a newline-delimited file of IPv4/IPv6 addresses through a
//! bounded, multi-threaded pipeline and records each distinct address in a
//! persistent on-disk index, so inputs far larger than memory can be counted.
//! Invalid lines are counted and a bounded sample of them is written to a
//! warnings log.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ipdedup::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig {
//!     index_dir: "dedup_index".into(),
//!     ..Default::default()
//! };
//! let report = Pipeline::from_config(config)?.run("addresses.txt")?;
//!
//! println!("{}", report);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐  LineBatch  ┌──────────┐  Batch   ┌──────────┐
//! │ ChunkReader│ ──────────► │ Workers  │ ───────► │  Writer  │ ─► RocksDB
//! │ (blocks)   │  bounded    │ parse +  │ bounded  │ one txn  │
//! └────────────┘             │ XXH64    │          │ per batch│
//!                            └──────────┘          └──────────┘
//!                                 │ invalid (sampled)       │
//!                                 ▼                         ▼
//!                           warnings.log          count_keys() → RunReport
//! ```
//!
//! Addresses are normalized before hashing: IPv4-mapped IPv6 collapses to
//! IPv4 and IPv6 is written in its compressed form, so every textual spelling
//! of one address lands on the same index key.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Address parsing, canonical form and digests
pub mod address;
/// Run configuration
pub mod config;
/// Shared atomic run counters
pub mod counters;
/// Error types for deduplication runs
pub mod error;
/// Source opening with gzip detection and retries
pub mod file_reader;
/// Persistent dedup index backends
pub mod index;
/// Periodic memory usage reporting
pub mod memory;
/// Reader, worker pool and writer wiring
pub mod pipeline;
/// Block reading and line reassembly
pub mod reader;
/// Final run report
pub mod report;
/// Bounded invalid-line sampling
pub mod warnings;
/// Line parsing workers
pub mod worker;
/// Batch committing writer
pub mod writer;

// Re-exports for Rust consumers

pub use crate::address::{Digest, ParsedAddress};
pub use crate::config::{IndexMode, PipelineConfig, RetryPolicy};
pub use crate::counters::{CounterSnapshot, Counters};
pub use crate::error::{DedupError, Result};
pub use crate::index::{DedupIndex, MemoryIndex, RocksIndex};
pub use crate::pipeline::{Pipeline, RunOutcome};
pub use crate::reader::{ChunkReader, LineBatch, LineChunker};
pub use crate::report::RunReport;
pub use crate::warnings::WarningLog;

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert!(VERSION.starts_with("0."));
    }
}
