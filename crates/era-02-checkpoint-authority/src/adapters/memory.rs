//! In-memory block index
//!
//! Blocks keyed by hash with parent links. The best tip is the block with
//! the greatest height; the first block seen at a height wins ties.

use std::collections::HashMap;

use parking_lot::RwLock;
use shared_types::Hash256;

use crate::domain::{BlockRef, CheckpointError};
use crate::ports::BlockIndex;

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    height: u32,
    parent: Option<Hash256>,
}

#[derive(Debug, Default)]
struct IndexState {
    known_blocks: HashMap<Hash256, IndexEntry>,
    /// Best-chain height -> hash, rebuilt when the tip moves to another branch.
    height_index: Vec<Hash256>,
    tip: Option<BlockRef>,
}

impl IndexState {
    fn rebuild_height_index(&mut self, tip: BlockRef) {
        let mut chain = Vec::with_capacity(tip.height as usize + 1);
        let mut cursor = Some(tip.hash);
        while let Some(hash) = cursor {
            chain.push(hash);
            cursor = self.known_blocks.get(&hash).and_then(|e| e.parent);
        }
        chain.reverse();
        self.height_index = chain;
    }
}

/// Thread-safe in-memory `BlockIndex`.
#[derive(Debug, Default)]
pub struct InMemoryBlockIndex {
    state: RwLock<IndexState>,
}

impl InMemoryBlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index seeded with a genesis block.
    pub fn with_genesis(genesis: Hash256) -> Self {
        let index = Self::new();
        // A parentless insert cannot fail.
        let _ = index.insert(genesis, None);
        index
    }

    /// Index a block. A `None` parent makes it a height-0 block.
    pub fn insert(&self, hash: Hash256, parent: Option<Hash256>) -> Result<BlockRef, CheckpointError> {
        let mut state = self.state.write();

        if let Some(existing) = state.known_blocks.get(&hash) {
            return Ok(BlockRef::new(existing.height, hash));
        }

        let height = match parent {
            None => 0,
            Some(parent_hash) => {
                let parent_entry = state
                    .known_blocks
                    .get(&parent_hash)
                    .ok_or(CheckpointError::UnknownParent(parent_hash))?;
                parent_entry.height + 1
            }
        };

        state.known_blocks.insert(hash, IndexEntry { height, parent });
        let block = BlockRef::new(height, hash);

        let extends_tip = match state.tip {
            None => true,
            Some(tip) => height > tip.height,
        };
        if extends_tip {
            let same_branch = parent.is_some() && state.tip.map(|t| t.hash) == parent;
            if same_branch {
                state.height_index.push(hash);
            } else {
                state.rebuild_height_index(block);
            }
            state.tip = Some(block);
        }

        Ok(block)
    }

    /// Append a child of the current tip (or genesis on an empty index).
    pub fn extend_tip(&self, hash: Hash256) -> Result<BlockRef, CheckpointError> {
        let parent = self.best_tip().map(|t| t.hash);
        self.insert(hash, parent)
    }

    pub fn block_count(&self) -> usize {
        self.state.read().known_blocks.len()
    }

    /// Best-chain block at `height`.
    pub fn best_chain_at(&self, height: u32) -> Option<BlockRef> {
        let state = self.state.read();
        state
            .height_index
            .get(height as usize)
            .map(|hash| BlockRef::new(height, *hash))
    }
}

impl BlockIndex for InMemoryBlockIndex {
    fn lookup(&self, hash: &Hash256) -> Option<BlockRef> {
        self.state
            .read()
            .known_blocks
            .get(hash)
            .map(|e| BlockRef::new(e.height, *hash))
    }

    fn best_tip(&self) -> Option<BlockRef> {
        self.state.read().tip
    }

    fn ancestor(&self, from: &Hash256, height: u32) -> Option<BlockRef> {
        let state = self.state.read();
        let mut hash = *from;
        let mut entry = *state.known_blocks.get(&hash)?;
        if height > entry.height {
            return None;
        }

        // Fast path: `from` is on the best chain.
        if state.height_index.get(entry.height as usize) == Some(&hash) {
            return state
                .height_index
                .get(height as usize)
                .map(|h| BlockRef::new(height, *h));
        }

        while entry.height > height {
            hash = entry.parent?;
            entry = *state.known_blocks.get(&hash)?;
        }
        Some(BlockRef::new(entry.height, hash))
    }
}
