//! Block-oriented line reader
//!
//! The source is read in fixed-size blocks. A block rarely ends on a line
//! terminator, so the bytes after its last `\n` are held as a pending partial
//! line and prefixed onto the next block before it is split. At end of file a
//! non-empty pending line is emitted as the final line.
//!
//! ```text
//! block k:   "1.1.1.1\n2.2.2.2\n3.3."     → lines [1.1.1.1, 2.2.2.2], pending "3.3."
//! block k+1: "3.3\n4.4.4.4"               → lines [3.3.3.3],          pending "4.4.4.4"
//! EOF                                      → lines [4.4.4.4]
//! ```
//!
//! A single `\r` before `\n` is treated as part of the terminator. Every other
//! byte, including blank lines, is kept.

use crate::config::RetryPolicy;
use crate::error::{DedupError, Result};
use crate::file_reader::{self, Source};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Complete lines cut from one or more blocks
///
/// `data` holds the raw bytes; `line_ends` holds, for each line, the offset
/// one past its last content byte (the position of its `\n`, or the end of
/// data for an unterminated final line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBatch {
    /// Zero-based index of the first line in the source
    pub first_line: u64,
    /// Raw bytes of the lines, terminators included
    pub data: Vec<u8>,
    /// Offset of each line's terminator
    pub line_ends: Vec<usize>,
}

impl LineBatch {
    /// Number of lines in the batch
    pub fn len(&self) -> usize {
        self.line_ends.len()
    }

    /// True if the batch holds no lines
    pub fn is_empty(&self) -> bool {
        self.line_ends.is_empty()
    }

    /// Iterate over line contents without terminators
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            batch: self,
            index: 0,
            start: 0,
        }
    }
}

/// Iterator over the lines of a [`LineBatch`]
pub struct Lines<'a> {
    batch: &'a LineBatch,
    index: usize,
    start: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let end = *self.batch.line_ends.get(self.index)?;
        let mut line = &self.batch.data[self.start..end];
        if let Some(stripped) = line.strip_suffix(b"\r") {
            line = stripped;
        }
        self.index += 1;
        self.start = end + 1;
        Some(line)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.batch.line_ends.len() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Lines<'_> {}

/// Splits a byte stream into lines, carrying partial lines between blocks
#[derive(Debug, Default)]
pub struct LineChunker {
    pending: Vec<u8>,
    next_line: u64,
}

impl LineChunker {
    /// Create an empty chunker
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one block; returns the lines it completes, if any
    pub fn push_block(&mut self, block: &[u8]) -> Option<LineBatch> {
        let Some(last_newline) = memchr::memrchr(b'\n', block) else {
            self.pending.extend_from_slice(block);
            return None;
        };

        let (complete, rest) = block.split_at(last_newline + 1);
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(complete);
        self.pending.extend_from_slice(rest);

        let line_ends: Vec<usize> = memchr::memchr_iter(b'\n', &data).collect();
        Some(self.make_batch(data, line_ends))
    }

    /// Flush the pending partial line at end of input
    pub fn finish(&mut self) -> Option<LineBatch> {
        if self.pending.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.pending);
        let line_ends = vec![data.len()];
        Some(self.make_batch(data, line_ends))
    }

    /// Bytes held back waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lines emitted so far
    pub fn lines_emitted(&self) -> u64 {
        self.next_line
    }

    fn make_batch(&mut self, data: Vec<u8>, line_ends: Vec<usize>) -> LineBatch {
        let batch = LineBatch {
            first_line: self.next_line,
            data,
            line_ends,
        };
        self.next_line += batch.len() as u64;
        batch
    }
}

/// Reads a source file block by block and yields complete line batches
///
/// Read errors after a successful open are retried under the read policy:
/// the file is reopened and the bytes already consumed are skipped, so the
/// pending partial line stays valid.
///
/// ```rust,no_run
/// use ipdedup::config::RetryPolicy;
/// use ipdedup::reader::ChunkReader;
///
/// let mut reader = ChunkReader::open("addresses.txt", 1024 * 1024,
///     RetryPolicy::new(3, 2000), RetryPolicy::new(3, 2000))?;
/// while let Some(batch) = reader.next_batch()? {
///     println!("{} lines starting at {}", batch.len(), batch.first_line);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ChunkReader {
    path: PathBuf,
    source: Source,
    block: Vec<u8>,
    chunker: LineChunker,
    consumed: u64,
    read_retry: RetryPolicy,
    eof: bool,
}

impl ChunkReader {
    /// Open `path` (retrying under `open_retry`) and read `block_size` bytes at a time
    pub fn open<P: AsRef<Path>>(
        path: P,
        block_size: usize,
        open_retry: RetryPolicy,
        read_retry: RetryPolicy,
    ) -> Result<Self> {
        let path = path.as_ref();
        let source = file_reader::open_with_retry(path, &open_retry)?;
        Ok(Self::with_source(path, source, block_size, read_retry))
    }

    /// Build a reader over an already-open source for `path`
    ///
    /// `path` is only used to reopen the source after a read error.
    pub fn with_source<P: AsRef<Path>>(
        path: P,
        source: Source,
        block_size: usize,
        read_retry: RetryPolicy,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            source,
            block: vec![0u8; block_size.max(1)],
            chunker: LineChunker::new(),
            consumed: 0,
            read_retry,
            eof: false,
        }
    }

    /// Read the next batch of complete lines
    ///
    /// Returns `None` at end of input.
    pub fn next_batch(&mut self) -> Result<Option<LineBatch>> {
        loop {
            if self.eof {
                return Ok(None);
            }

            let bytes_read = self.read_block()?;
            if bytes_read == 0 {
                self.eof = true;
                return Ok(self.chunker.finish());
            }

            if let Some(batch) = self.chunker.push_block(&self.block[..bytes_read]) {
                return Ok(Some(batch));
            }
        }
    }

    /// Path the reader was opened on
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes consumed from the (decompressed) source so far
    pub fn bytes_consumed(&self) -> u64 {
        self.consumed
    }

    fn read_block(&mut self) -> Result<usize> {
        let mut attempt = 1;
        loop {
            match self.source.read(&mut self.block) {
                Ok(n) => {
                    self.consumed += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if attempt < self.read_retry.attempts => {
                    warn!(
                        "Error reading {} at byte {} (attempt {}/{}): {}",
                        self.path.display(),
                        self.consumed,
                        attempt,
                        self.read_retry.attempts,
                        e
                    );
                    attempt += 1;
                    std::thread::sleep(self.read_retry.backoff());
                    match file_reader::reopen_at(&self.path, self.consumed) {
                        Ok(source) => self.source = source,
                        Err(e) => warn!("Reopening {} failed: {}", self.path.display(), e),
                    }
                }
                Err(e) => {
                    return Err(DedupError::SourceRead(format!(
                        "{} at byte {}: {} after {} attempt(s)",
                        self.path.display(),
                        self.consumed,
                        e,
                        self.read_retry.attempts
                    )))
                }
            }
        }
    }
}

impl Iterator for ChunkReader {
    type Item = Result<LineBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Write};
    use tempfile::NamedTempFile;

    fn no_wait(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, 0)
    }

    fn collect_lines(batches: &[LineBatch]) -> Vec<String> {
        batches
            .iter()
            .flat_map(|b| b.lines())
            .map(|l| String::from_utf8(l.to_vec()).unwrap())
            .collect()
    }

    fn chunk_all(input: &[u8], block_size: usize) -> Vec<LineBatch> {
        let mut chunker = LineChunker::new();
        let mut batches: Vec<LineBatch> = input
            .chunks(block_size)
            .filter_map(|block| chunker.push_block(block))
            .collect();
        batches.extend(chunker.finish());
        batches
    }

    #[test]
    fn test_single_block() {
        let batches = chunk_all(b"1.1.1.1\n2.2.2.2\n", 1024);
        assert_eq!(batches.len(), 1);
        assert_eq!(collect_lines(&batches), vec!["1.1.1.1", "2.2.2.2"]);
    }

    #[test]
    fn test_lines_straddling_every_block_size() {
        let input = b"10.0.0.1\n2001:db8::1\nnot-an-ip\n\n192.168.100.200\n8.8.8.8";
        let expected = vec![
            "10.0.0.1",
            "2001:db8::1",
            "not-an-ip",
            "",
            "192.168.100.200",
            "8.8.8.8",
        ];

        for block_size in 1..=input.len() + 1 {
            let batches = chunk_all(input, block_size);
            assert_eq!(
                collect_lines(&batches),
                expected,
                "block size {}",
                block_size
            );
        }
    }

    #[test]
    fn test_final_line_without_terminator() {
        let batches = chunk_all(b"8.8.8.8", 3);
        assert_eq!(collect_lines(&batches), vec!["8.8.8.8"]);
        assert_eq!(batches.iter().map(LineBatch::len).sum::<usize>(), 1);
    }

    #[test]
    fn test_trailing_terminator_adds_no_line() {
        let batches = chunk_all(b"1.1.1.1\n", 4);
        assert_eq!(collect_lines(&batches), vec!["1.1.1.1"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_all(b"", 16).is_empty());
    }

    #[test]
    fn test_crlf_terminators() {
        let batches = chunk_all(b"1.1.1.1\r\n2.2.2.2\r\n3.3.3.3\r", 5);
        assert_eq!(collect_lines(&batches), vec!["1.1.1.1", "2.2.2.2", "3.3.3.3"]);
    }

    #[test]
    fn test_blank_lines_are_kept() {
        let batches = chunk_all(b"\n\n1.1.1.1\n\n", 2);
        assert_eq!(collect_lines(&batches), vec!["", "", "1.1.1.1", ""]);
    }

    #[test]
    fn test_first_line_numbers() {
        let batches = chunk_all(b"a\nb\nc\nd\n", 4);
        let firsts: Vec<u64> = batches.iter().map(|b| b.first_line).collect();
        assert_eq!(firsts, vec![0, 2]);
    }

    #[test]
    fn test_pending_tracks_partial_line() {
        let mut chunker = LineChunker::new();
        assert!(chunker.push_block(b"1.1.").is_none());
        assert_eq!(chunker.pending_len(), 4);
        let batch = chunker.push_block(b"1.1\n2.2").unwrap();
        assert_eq!(collect_lines(&[batch]), vec!["1.1.1.1"]);
        assert_eq!(chunker.pending_len(), 3);
        assert_eq!(chunker.lines_emitted(), 1);
    }

    #[test]
    fn test_chunk_reader_small_blocks() {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..100 {
            writeln!(file, "10.0.{}.{}", i / 10, i % 10).unwrap();
        }
        write!(file, "10.1.1.1").unwrap();
        file.flush().unwrap();

        let reader = ChunkReader::open(file.path(), 7, no_wait(1), no_wait(1)).unwrap();
        let batches: Vec<LineBatch> = reader.collect::<Result<Vec<_>>>().unwrap();
        let lines = collect_lines(&batches);

        assert_eq!(lines.len(), 101);
        assert_eq!(lines[0], "10.0.0.0");
        assert_eq!(lines[99], "10.0.9.9");
        assert_eq!(lines[100], "10.1.1.1");
    }

    /// Reader that fails once after handing out `fail_after` bytes
    struct FlakyReader {
        data: Vec<u8>,
        pos: usize,
        fail_after: usize,
        failed: bool,
    }

    impl Read for FlakyReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.failed && self.pos >= self.fail_after {
                self.failed = true;
                return Err(io::Error::new(io::ErrorKind::Other, "transient EIO"));
            }
            let limit = if self.failed { self.data.len() } else { self.fail_after };
            let n = buf.len().min(limit - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_mid_stream_error_reopens_and_resumes() {
        let content = b"1.1.1.1\n2.2.2.2\n3.3.3.3\n4.4.4.4\n".to_vec();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&content).unwrap();
        file.flush().unwrap();

        // Fail in the middle of the second line
        let flaky = FlakyReader {
            data: content,
            pos: 0,
            fail_after: 11,
            failed: false,
        };
        let source: Source = Box::new(BufReader::with_capacity(4, flaky));
        let mut reader = ChunkReader::with_source(file.path(), source, 5, no_wait(2));
        let mut batches = Vec::new();
        while let Some(batch) = reader.next_batch().unwrap() {
            batches.push(batch);
        }

        assert_eq!(
            collect_lines(&batches),
            vec!["1.1.1.1", "2.2.2.2", "3.3.3.3", "4.4.4.4"]
        );
        // No byte is read twice across the reopen
        assert_eq!(reader.bytes_consumed(), 32);
        assert_eq!(reader.path(), file.path());
    }

    #[test]
    fn test_mid_stream_error_without_retries_is_fatal() {
        let content = b"1.1.1.1\n2.2.2.2\n".to_vec();
        let flaky = FlakyReader {
            data: content,
            pos: 0,
            fail_after: 4,
            failed: false,
        };
        let source: Source = Box::new(BufReader::with_capacity(4, flaky));
        let mut reader = ChunkReader::with_source("unused.txt", source, 4, no_wait(1));

        let mut result = reader.next_batch();
        while let Ok(Some(_)) = result {
            result = reader.next_batch();
        }
        assert!(matches!(result, Err(DedupError::SourceRead(_))));
    }
}
