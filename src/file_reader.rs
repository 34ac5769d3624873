//! Source file opening with gzip detection and retries
//!
//! Files ending in `.gz` (case-insensitive) are decompressed transparently.
//! Opening is retried with a fixed backoff; a stream that fails part way can
//! be reopened at the byte offset it had reached with [`reopen_at`].
//!
//! ```rust,no_run
//! use ipdedup::config::RetryPolicy;
//! use ipdedup::file_reader;
//! use std::io::BufRead;
//!
//! let reader = file_reader::open_with_retry("addresses.txt.gz", &RetryPolicy::new(3, 2000))?;
//! for line in reader.lines() {
//!     println!("{}", line?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::RetryPolicy;
use crate::error::{DedupError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use tracing::warn;

/// Buffer size for file reading (4MB)
const BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Boxed buffered source, plain or decompressed
pub type Source = Box<dyn BufRead + Send>;

/// Open a file, decompressing it when the extension is `.gz`
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Source> {
    let path = path.as_ref();
    let file = File::open(path)?;
    Ok(from_file(file, is_gzip(path)))
}

/// Wrap an already-opened file with an explicit gzip flag
pub fn from_file(file: File, gzip: bool) -> Source {
    if gzip {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
    } else {
        Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
    }
}

/// Whether the path names a gzip file
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Open a file, retrying with a fixed backoff
///
/// Fails with [`DedupError::SourceOpen`] once every attempt has failed.
pub fn open_with_retry<P: AsRef<Path>>(path: P, policy: &RetryPolicy) -> Result<Source> {
    let path = path.as_ref();
    let mut last_error = None;

    for attempt in 1..=policy.attempts {
        match open(path) {
            Ok(source) => return Ok(source),
            Err(e) => {
                warn!(
                    "Error opening file {} (attempt {}/{}): {}",
                    path.display(),
                    attempt,
                    policy.attempts,
                    e
                );
                last_error = Some(e);
                if attempt < policy.attempts {
                    std::thread::sleep(policy.backoff());
                }
            }
        }
    }

    Err(DedupError::SourceOpen(format!(
        "{}: {} after {} attempt(s)",
        path.display(),
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string()),
        policy.attempts
    )))
}

/// Reopen a file and discard the first `offset` bytes of its content
///
/// Offsets count decompressed bytes for gzip sources. Fails with
/// `UnexpectedEof` if the file is now shorter than `offset`.
pub fn reopen_at(path: &Path, offset: u64) -> io::Result<Source> {
    let mut source = open(path)?;
    let skipped = io::copy(&mut (&mut source).take(offset), &mut io::sink())?;
    if skipped < offset {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!(
                "{} shrank to {} bytes, expected at least {}",
                path.display(),
                skipped,
                offset
            ),
        ));
    }
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_wait(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, 0)
    }

    #[test]
    fn test_plain_text_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.1").unwrap();
        writeln!(file, "10.0.0.2").unwrap();
        file.flush().unwrap();

        let reader = open(file.path()).unwrap();
        let lines: Vec<String> = reader.lines().collect::<io::Result<Vec<_>>>().unwrap();

        assert_eq!(lines, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_gzip_file() {
        let mut file = NamedTempFile::with_suffix(".gz").unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        writeln!(encoder, "192.0.2.1").unwrap();
        writeln!(encoder, "2001:db8::1").unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let reader = open(file.path()).unwrap();
        let lines: Vec<String> = reader.lines().collect::<io::Result<Vec<_>>>().unwrap();

        assert_eq!(lines, vec!["192.0.2.1", "2001:db8::1"]);
    }

    #[test]
    fn test_case_insensitive_gz_extension() {
        assert!(is_gzip(Path::new("dump.GZ")));
        assert!(is_gzip(Path::new("dump.txt.gz")));
        assert!(!is_gzip(Path::new("dump.txt")));
        assert!(!is_gzip(Path::new("gz")));
    }

    #[test]
    fn test_open_with_retry_exhausts_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");

        let err = open_with_retry(&missing, &no_wait(3)).err().unwrap();
        match err {
            DedupError::SourceOpen(msg) => {
                assert!(msg.contains("missing.txt"));
                assert!(msg.contains("3 attempt"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_open_with_retry_succeeds() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "8.8.8.8").unwrap();
        file.flush().unwrap();

        let mut reader = open_with_retry(file.path(), &no_wait(1)).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "8.8.8.8");
    }

    #[test]
    fn test_reopen_at_offset() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "1.1.1.1\n2.2.2.2\n").unwrap();
        file.flush().unwrap();

        let mut reader = reopen_at(file.path(), 8).unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "2.2.2.2\n");
    }

    #[test]
    fn test_reopen_at_gzip_offset() {
        let mut file = NamedTempFile::with_suffix(".gz").unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        write!(encoder, "1.1.1.1\n2.2.2.2\n").unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
        file.flush().unwrap();

        let mut reader = reopen_at(file.path(), 12).unwrap();
        let mut rest = String::new();
        reader.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "2.2\n");
    }

    #[test]
    fn test_reopen_past_end_fails() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "1.1.1.1\n").unwrap();
        file.flush().unwrap();

        let err = reopen_at(file.path(), 100).err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
