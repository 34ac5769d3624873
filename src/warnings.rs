//! Warnings log for sampled invalid lines
//!
//! Workers share one [`WarningLog`]. Each entry is written as
//! `Warning: invalid IP address: <line>`. Sampling is gated on the shared
//! sample counter: the counter is read, the line written, then the counter
//! bumped. Workers racing at the cap can each pass the read, so the log may
//! exceed the cap by at most `workers - 1` entries.

use crate::counters::Counters;
use crate::error::{DedupError, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Prefix of every warnings log entry
pub const WARNING_PREFIX: &str = "Warning: invalid IP address: ";

/// Append-only, internally synchronized warnings sink
pub struct WarningLog<W: Write + Send = BufWriter<File>> {
    writer: Mutex<W>,
    max_samples: u64,
}

impl WarningLog<BufWriter<File>> {
    /// Create (truncate) the warnings log file
    pub fn create(path: &Path, max_samples: u64) -> Result<Self> {
        let file = File::create(path)
            .map_err(|e| DedupError::WarningLog(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(BufWriter::new(file), max_samples))
    }
}

impl<W: Write + Send> WarningLog<W> {
    /// Wrap any writer
    pub fn new(writer: W, max_samples: u64) -> Self {
        Self {
            writer: Mutex::new(writer),
            max_samples,
        }
    }

    /// Sample cap
    pub fn max_samples(&self) -> u64 {
        self.max_samples
    }

    /// Record an invalid line if the sample cap has not been reached
    ///
    /// Returns whether the line was written.
    pub fn sample(&self, counters: &Counters, line: &[u8]) -> Result<bool> {
        if counters.sampled() >= self.max_samples {
            return Ok(false);
        }
        self.write_entry(line)?;
        counters.add_sampled();
        Ok(true)
    }

    /// Lines are written as read, invalid UTF-8 included
    fn write_entry(&self, line: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock();
        writer
            .write_all(WARNING_PREFIX.as_bytes())
            .and_then(|_| writer.write_all(line))
            .and_then(|_| writer.write_all(b"\n"))
            .map_err(|e| DedupError::WarningLog(e.to_string()))
    }

    /// Flush buffered entries
    pub fn flush(&self) -> Result<()> {
        self.writer
            .lock()
            .flush()
            .map_err(|e| DedupError::WarningLog(e.to_string()))
    }

    /// Consume the log and return the writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_entry_format() {
        let counters = Counters::new();
        let log = WarningLog::new(Vec::new(), 10);

        assert!(log.sample(&counters, b"not-an-ip").unwrap());
        let out = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(out, "Warning: invalid IP address: not-an-ip\n");
        assert_eq!(counters.sampled(), 1);
    }

    #[test]
    fn test_non_utf8_line_is_kept_verbatim() {
        let counters = Counters::new();
        let log = WarningLog::new(Vec::new(), 10);
        assert_eq!(log.max_samples(), 10);

        assert!(log.sample(&counters, b"10.0.\xff\xfe.1").unwrap());
        let mut expected = WARNING_PREFIX.as_bytes().to_vec();
        expected.extend_from_slice(b"10.0.\xff\xfe.1\n");
        assert_eq!(log.into_inner(), expected);
    }

    #[test]
    fn test_cap_is_respected_sequentially() {
        let counters = Counters::new();
        let log = WarningLog::new(Vec::new(), 3);

        let written = (0..10)
            .filter(|i| log.sample(&counters, format!("bad-{}", i).as_bytes()).unwrap())
            .count();

        assert_eq!(written, 3);
        let out = String::from_utf8(log.into_inner()).unwrap();
        assert_eq!(out.lines().collect::<Vec<_>>(), vec![
            "Warning: invalid IP address: bad-0",
            "Warning: invalid IP address: bad-1",
            "Warning: invalid IP address: bad-2",
        ]);
    }

    #[test]
    fn test_zero_cap_writes_nothing() {
        let counters = Counters::new();
        let log = WarningLog::new(Vec::new(), 0);
        assert!(!log.sample(&counters, b"junk").unwrap());
        assert!(log.into_inner().is_empty());
    }

    #[test]
    fn test_concurrent_overshoot_is_bounded() {
        let workers = 8;
        let cap = 5;
        let counters = Arc::new(Counters::new());
        let log = Arc::new(WarningLog::new(Vec::new(), cap));

        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let counters = Arc::clone(&counters);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for i in 0..200 {
                        log.sample(&counters, format!("w{}-{}", w, i).as_bytes())
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let log = Arc::try_unwrap(log).ok().unwrap();
        let out = String::from_utf8(log.into_inner()).unwrap();
        let entries = out.lines().count() as u64;
        assert!(entries >= cap);
        assert!(entries <= cap + workers as u64 - 1);
        assert_eq!(entries, counters.sampled());
    }

    #[test]
    fn test_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warnings.log");
        let counters = Counters::new();

        let log = WarningLog::create(&path, 10).unwrap();
        log.sample(&counters, b"999.1.1.1").unwrap();
        log.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Warning: invalid IP address: 999.1.1.1\n");
    }

    #[test]
    fn test_create_in_missing_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope").join("warnings.log");
        assert!(matches!(
            WarningLog::create(&path, 10),
            Err(DedupError::WarningLog(_))
        ));
    }
}
