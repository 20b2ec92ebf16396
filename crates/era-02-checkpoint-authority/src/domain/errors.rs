//! Checkpoint errors.

use shared_types::Hash256;
use thiserror::Error;

/// Rejections and construction failures.
///
/// `HardenedMismatch` and `SyncViolation` gate block acceptance: the caller
/// discards the block. They are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    #[error("checkpoint heights must strictly increase: {next} follows {previous}")]
    NotStrictlyIncreasing { previous: u32, next: u32 },

    #[error("block {got} at height {height} conflicts with checkpoint {expected}")]
    HardenedMismatch {
        height: u32,
        expected: Hash256,
        got: Hash256,
    },

    #[error("block at height {height} is at or below the sync checkpoint at {sync_height}")]
    SyncViolation { height: u32, sync_height: u32 },

    #[error("block {hash} does not descend from sync checkpoint {sync_hash}")]
    ForkBelowSync { hash: Hash256, sync_hash: Hash256 },

    #[error("parent {0} is not in the block index")]
    UnknownParent(Hash256),
}

impl CheckpointError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotStrictlyIncreasing { .. } => "bad_table",
            Self::HardenedMismatch { .. } => "hardened_checkpoint",
            Self::SyncViolation { .. } => "sync_checkpoint",
            Self::ForkBelowSync { .. } => "sync_fork",
            Self::UnknownParent(_) => "unknown_parent",
        }
    }
}
