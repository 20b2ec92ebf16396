//! # Checkpoint Gate
//!
//! Where block acceptance meets peer trust. A block announced by a peer is
//! checked against the hardened table and the sync checkpoint before it is
//! indexed; a rejection is counted by reason and, when a peer sent it,
//! scored against that peer.

use std::sync::Arc;

use era_02_checkpoint_authority::{
    BlockIndex, BlockRef, CheckpointAuthority, CheckpointError, InMemoryBlockIndex,
};
use era_03_peer_registry::{MisbehaviorOutcome, PeerId, PeerRegistry, Violation};
use era_telemetry::{log_block_event, log_peer_event, BLOCKS_REJECTED, SYNC_CHECKPOINT_HEIGHT};
use shared_types::Hash256;
use tracing::warn;

use crate::container::NodeContainer;

#[derive(Clone)]
pub struct CheckpointGate {
    authority: Arc<CheckpointAuthority>,
    block_index: Arc<InMemoryBlockIndex>,
    registry: Arc<PeerRegistry>,
}

impl CheckpointGate {
    pub fn new(container: &NodeContainer) -> Self {
        Self {
            authority: Arc::clone(&container.authority),
            block_index: Arc::clone(&container.block_index),
            registry: Arc::clone(&container.registry),
        }
    }

    /// Check and index a block whose other validation has passed.
    ///
    /// An unknown parent is not the sender's fault and is not scored.
    pub fn accept_block(
        &self,
        from: Option<PeerId>,
        hash: Hash256,
        parent: Hash256,
    ) -> Result<BlockRef, CheckpointError> {
        if let Some(known) = self.block_index.lookup(&hash) {
            return Ok(known);
        }

        let result = self.check(hash, parent);
        match result {
            Ok(block) => {
                let tip_before = self.block_index.best_tip();
                let block = self.block_index.insert(block.hash, Some(parent))?;
                if self.block_index.best_tip() != tip_before {
                    let sync = self.authority.auto_select_sync_checkpoint(self.block_index.as_ref());
                    SYNC_CHECKPOINT_HEIGHT.set(i64::from(sync.height));
                }
                log_block_event!(debug, "Block passed checkpoint gate", block.height, hash);
                Ok(block)
            }
            Err(e) => {
                BLOCKS_REJECTED.with_label_values(&[e.reason()]).inc();
                if let (Some(peer), Some(violation)) = (from, violation_for(&e)) {
                    if let MisbehaviorOutcome::Banned { .. } = self.registry.misbehaving(peer, violation) {
                        log_peer_event!(warn, "Peer banned for checkpoint violation", peer, block_hash = %hash, reason = e.reason());
                    }
                }
                Err(e)
            }
        }
    }

    fn check(&self, hash: Hash256, parent: Hash256) -> Result<BlockRef, CheckpointError> {
        let parent = self
            .block_index
            .lookup(&parent)
            .ok_or(CheckpointError::UnknownParent(parent))?;
        let height = parent.height + 1;

        self.authority.verify_block(height, &hash)?;
        if !self.authority.check_sync_chain(&parent, self.block_index.as_ref()) {
            let sync = self.authority.current_sync_checkpoint();
            warn!(height, %hash, sync_height = sync.height, "Block rejected: fork below sync checkpoint");
            return Err(CheckpointError::ForkBelowSync {
                hash,
                sync_hash: sync.hash,
            });
        }
        Ok(BlockRef::new(height, hash))
    }
}

fn violation_for(error: &CheckpointError) -> Option<Violation> {
    match error {
        CheckpointError::HardenedMismatch { .. } => Some(Violation::HardenedCheckpointMismatch),
        CheckpointError::SyncViolation { .. } | CheckpointError::ForkBelowSync { .. } => {
            Some(Violation::SyncCheckpointViolation)
        }
        CheckpointError::UnknownParent(_) | CheckpointError::NotStrictlyIncreasing { .. } => None,
    }
}
