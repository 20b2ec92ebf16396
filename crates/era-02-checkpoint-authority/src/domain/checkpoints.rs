//! # Hardened Checkpoints
//!
//! Release-bundled `(height, hash)` anchors. The table is a sparse veto
//! list: it constrains only the heights it names and says nothing about the
//! blocks in between.

use era_01_network_profile::Checkpoint;
use serde::Serialize;
use shared_types::Hash256;

use super::errors::CheckpointError;

/// A `(height, hash)` reference to one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockRef {
    pub height: u32,
    pub hash: Hash256,
}

impl BlockRef {
    pub fn new(height: u32, hash: Hash256) -> Self {
        Self { height, hash }
    }
}

impl From<Checkpoint> for BlockRef {
    fn from(cp: Checkpoint) -> Self {
        Self::new(cp.height, cp.hash)
    }
}

/// Validated checkpoint table, heights strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointTable {
    entries: Vec<Checkpoint>,
}

impl CheckpointTable {
    pub fn new(entries: Vec<Checkpoint>) -> Result<Self, CheckpointError> {
        for pair in entries.windows(2) {
            if pair[1].height <= pair[0].height {
                return Err(CheckpointError::NotStrictlyIncreasing {
                    previous: pair[0].height,
                    next: pair[1].height,
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, height: u32) -> Option<&Checkpoint> {
        self.entries
            .binary_search_by_key(&height, |cp| cp.height)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// True when no checkpoint exists at `height` or the hash matches it.
    pub fn check(&self, height: u32, hash: &Hash256) -> bool {
        self.get(height).map_or(true, |cp| cp.hash == *hash)
    }

    /// Highest checkpoint height, 0 when the table is empty.
    pub fn highest_height(&self) -> u32 {
        self.entries.last().map_or(0, |cp| cp.height)
    }

    /// Entries from highest to lowest.
    pub fn iter_rev(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter().rev()
    }

    pub fn entries(&self) -> &[Checkpoint] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::sha256d;

    fn cp(height: u32, seed: &[u8]) -> Checkpoint {
        Checkpoint::new(height, sha256d(seed))
    }

    #[test]
    fn test_rejects_unordered_table() {
        let result = CheckpointTable::new(vec![cp(5, b"a"), cp(4, b"b")]);
        assert_eq!(
            result,
            Err(CheckpointError::NotStrictlyIncreasing { previous: 5, next: 4 })
        );
        assert!(CheckpointTable::new(vec![cp(4, b"a"), cp(4, b"b")]).is_err());
    }

    #[test]
    fn test_check_is_sparse() {
        let table = CheckpointTable::new(vec![cp(0, b"g"), cp(10, b"x")]).unwrap();
        assert!(table.check(10, &sha256d(b"x")));
        assert!(!table.check(10, &sha256d(b"y")));
        // No entry at 5: anything goes.
        assert!(table.check(5, &sha256d(b"anything")));
    }

    #[test]
    fn test_highest_height() {
        assert_eq!(CheckpointTable::default().highest_height(), 0);
        let table = CheckpointTable::new(vec![cp(0, b"g"), cp(4, b"a"), cp(5, b"b")]).unwrap();
        assert_eq!(table.highest_height(), 5);
        assert_eq!(table.iter_rev().next().unwrap().height, 5);
    }
}
