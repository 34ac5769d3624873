//! Persistent dedup index
//!
//! The index is a set of digest keys. Inserting a key that already exists
//! is a no-op, so batches can be committed in any order and any number of
//! times without changing the final key count.
//!
//! Only the writer thread mutates an index; the trait takes `&mut self` and
//! the pipeline moves the index into that thread.

mod memory;
mod rocks;

pub use memory::MemoryIndex;
pub use rocks::RocksIndex;

use crate::address::Digest;
use crate::error::Result;

/// Insert-if-absent key store with a full-scan count
pub trait DedupIndex: Send {
    /// Atomically insert every digest of a batch
    ///
    /// Either all keys become visible or none do.
    fn insert_batch(&mut self, digests: &[Digest]) -> Result<()>;

    /// Count stored keys with a full scan
    fn count_keys(&self) -> Result<u64>;

    /// Make committed batches durable
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<T: DedupIndex + ?Sized> DedupIndex for Box<T> {
    fn insert_batch(&mut self, digests: &[Digest]) -> Result<()> {
        (**self).insert_batch(digests)
    }

    fn count_keys(&self) -> Result<u64> {
        (**self).count_keys()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
