use super::DedupIndex;
use crate::address::Digest;
use crate::error::Result;
use std::collections::BTreeSet;

/// In-memory index for small inputs and tests
///
/// Memory grows with the number of distinct addresses.
#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    keys: BTreeSet<Digest>,
}

impl MemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a digest is present
    pub fn contains(&self, digest: &Digest) -> bool {
        self.keys.contains(digest)
    }
}

impl DedupIndex for MemoryIndex {
    fn insert_batch(&mut self, digests: &[Digest]) -> Result<()> {
        self.keys.extend(digests.iter().copied());
        Ok(())
    }

    fn count_keys(&self) -> Result<u64> {
        Ok(self.keys.len() as u64)
    }
}
