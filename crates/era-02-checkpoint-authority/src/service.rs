//! # Checkpoint Authority
//!
//! Decides which history is authoritative. Two layers:
//!
//! 1. **Hardened checkpoints** from the release: a block at a checkpointed
//!    height must carry exactly that hash.
//! 2. **Sync checkpoint**: a point `CHECKPOINT_SPAN` blocks behind the best
//!    tip (or the last hardened checkpoint, whichever is later) below which
//!    no reorganization is accepted.
//!
//! The sync checkpoint is an immutable `BlockRef` behind an `Arc`, swapped
//! under a short write lock. Readers clone the `Arc` and never observe a
//! half-written value.

use std::sync::Arc;

use era_01_network_profile::{Checkpoint, NetworkProfile};
use parking_lot::RwLock;
use shared_types::Hash256;
use tracing::{debug, info, warn};

use crate::domain::{BlockRef, CheckpointError, CheckpointTable};
use crate::ports::BlockIndex;

/// Depth behind the best tip that is treated as irreversible.
pub const CHECKPOINT_SPAN: u32 = 500;

/// Hardened checkpoints plus the runtime sync checkpoint.
#[derive(Debug)]
pub struct CheckpointAuthority {
    table: CheckpointTable,
    span: u32,
    sync: RwLock<Arc<BlockRef>>,
}

impl CheckpointAuthority {
    /// Authority over `checkpoints` whose sync checkpoint starts at genesis.
    pub fn new(checkpoints: Vec<Checkpoint>, genesis_hash: Hash256) -> Result<Self, CheckpointError> {
        Ok(Self {
            table: CheckpointTable::new(checkpoints)?,
            span: CHECKPOINT_SPAN,
            sync: RwLock::new(Arc::new(BlockRef::new(0, genesis_hash))),
        })
    }

    pub fn from_profile(profile: &NetworkProfile) -> Result<Self, CheckpointError> {
        Self::new(profile.checkpoints.clone(), profile.genesis_hash)
    }

    /// Override the reorganization depth (tests, private networks).
    pub fn with_span(mut self, span: u32) -> Self {
        self.span = span;
        self
    }

    pub fn span(&self) -> u32 {
        self.span
    }

    pub fn table(&self) -> &CheckpointTable {
        &self.table
    }

    // =========================================================================
    // HARDENED CHECKPOINTS
    // =========================================================================

    /// True unless a checkpoint exists at `height` with a different hash.
    pub fn check_hardened(&self, height: u32, hash: &Hash256) -> bool {
        self.table.check(height, hash)
    }

    /// Highest checkpoint whose block the index has.
    pub fn last_checkpoint(&self, index: &dyn BlockIndex) -> Option<BlockRef> {
        self.table
            .iter_rev()
            .find(|cp| index.lookup(&cp.hash).is_some())
            .map(|cp| BlockRef::from(*cp))
    }

    /// Progress-reporting floor on chain length.
    pub fn total_blocks_estimate(&self) -> u32 {
        self.table.highest_height()
    }

    // =========================================================================
    // SYNC CHECKPOINT
    // =========================================================================

    pub fn current_sync_checkpoint(&self) -> Arc<BlockRef> {
        Arc::clone(&self.sync.read())
    }

    /// Recompute the sync checkpoint from the best chain and return the
    /// (possibly unchanged) current value.
    ///
    /// The candidate is the later of the last hardened checkpoint on the
    /// best chain and the best-chain block `span` below the tip. The stored
    /// value only ever moves forward.
    pub fn auto_select_sync_checkpoint(&self, index: &dyn BlockIndex) -> Arc<BlockRef> {
        let Some(tip) = index.best_tip() else {
            return self.current_sync_checkpoint();
        };

        let depth_candidate = index.ancestor(&tip.hash, tip.height.saturating_sub(self.span));

        let hardened_candidate = self
            .table
            .iter_rev()
            .filter(|cp| cp.height <= tip.height)
            .map(|cp| BlockRef::from(*cp))
            .find(|cp| index.is_on_best_chain(cp));

        let candidate = match (depth_candidate, hardened_candidate) {
            (Some(a), Some(b)) => Some(if b.height > a.height { b } else { a }),
            (a, b) => a.or(b),
        };

        match candidate {
            Some(candidate) => self.advance_sync_checkpoint(candidate),
            None => self.current_sync_checkpoint(),
        }
    }

    /// Move the sync checkpoint to `candidate` if it is higher. Returns the
    /// current value either way.
    pub fn advance_sync_checkpoint(&self, candidate: BlockRef) -> Arc<BlockRef> {
        let mut sync = self.sync.write();
        if candidate.height > sync.height {
            info!(
                from = sync.height,
                to = candidate.height,
                hash = %candidate.hash,
                "Sync checkpoint advanced"
            );
            *sync = Arc::new(candidate);
        } else {
            debug!(current = sync.height, candidate = candidate.height, "Sync checkpoint unchanged");
        }
        Arc::clone(&sync)
    }

    /// True iff a block at `height` may be newly connected: strictly above
    /// the sync checkpoint.
    pub fn check_sync(&self, height: u32) -> bool {
        height > self.sync.read().height
    }

    /// True iff `candidate` is compatible with the sync checkpoint: it
    /// descends from the sync block, or (at or below the sync height) it is
    /// itself on the sync block's chain. The candidate must be indexed.
    pub fn check_sync_chain(&self, candidate: &BlockRef, index: &dyn BlockIndex) -> bool {
        let sync = self.current_sync_checkpoint();

        if candidate.height >= sync.height {
            index
                .ancestor(&candidate.hash, sync.height)
                .is_some_and(|found| found == *sync)
        } else {
            index
                .ancestor(&sync.hash, candidate.height)
                .is_some_and(|found| found == *candidate)
        }
    }

    /// Hardened and sync checks as a `Result`. Rejections are logged at
    /// `warn` and returned; the caller must discard the block.
    pub fn verify_block(&self, height: u32, hash: &Hash256) -> Result<(), CheckpointError> {
        if let Some(cp) = self.table.get(height) {
            if cp.hash != *hash {
                warn!(height, expected = %cp.hash, got = %hash, "Block rejected: hardened checkpoint mismatch");
                return Err(CheckpointError::HardenedMismatch {
                    height,
                    expected: cp.hash,
                    got: *hash,
                });
            }
        }

        let sync_height = self.sync.read().height;
        if height <= sync_height {
            warn!(height, sync_height, %hash, "Block rejected: at or below sync checkpoint");
            return Err(CheckpointError::SyncViolation { height, sync_height });
        }

        Ok(())
    }

    /// `verify_block` plus ancestry against the sync checkpoint, for blocks
    /// already in the index.
    pub fn verify_indexed_block(&self, block: &BlockRef, index: &dyn BlockIndex) -> Result<(), CheckpointError> {
        self.verify_block(block.height, &block.hash)?;
        if !self.check_sync_chain(block, index) {
            let sync = self.current_sync_checkpoint();
            warn!(height = block.height, hash = %block.hash, sync_height = sync.height, "Block rejected: fork below sync checkpoint");
            return Err(CheckpointError::ForkBelowSync {
                hash: block.hash,
                sync_hash: sync.hash,
            });
        }
        Ok(())
    }
}
