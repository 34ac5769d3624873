use super::DedupIndex;
use crate::address::Digest;
use crate::config::IndexMode;
use crate::error::{DedupError, Result};
use rocksdb::{DBCompressionType, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::info;

/// Directory-backed index stored in RocksDB
///
/// Keys are the decimal text of each digest, values are empty.
pub struct RocksIndex {
    db: DB,
}

impl RocksIndex {
    /// Open the index directory, wiping it first in [`IndexMode::Fresh`]
    pub fn open<P: AsRef<Path>>(path: P, mode: IndexMode) -> Result<Self> {
        let path = path.as_ref();
        let opts = Self::options();

        if mode == IndexMode::Fresh && path.exists() {
            info!("Clearing existing dedup index at {}", path.display());
            DB::destroy(&opts, path).map_err(|e| {
                DedupError::Index(format!("cannot clear {}: {}", path.display(), e))
            })?;
        }

        let db = DB::open(&opts, path)
            .map_err(|e| DedupError::Index(format!("cannot open {}: {}", path.display(), e)))?;
        info!("Opened dedup index at {} ({} mode)", path.display(), mode);

        Ok(Self { db })
    }

    fn options() -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(DBCompressionType::None);
        opts
    }

    /// Whether a digest has been committed
    pub fn contains(&self, digest: &Digest) -> Result<bool> {
        Ok(self.db.get_pinned(digest.key())?.is_some())
    }
}

impl DedupIndex for RocksIndex {
    fn insert_batch(&mut self, digests: &[Digest]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for digest in digests {
            batch.put(digest.key(), b"");
        }
        self.db.write(batch)?;
        Ok(())
    }

    fn count_keys(&self) -> Result<u64> {
        let mut count = 0u64;
        for item in self.db.iterator(IteratorMode::Start) {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn flush(&mut self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}
