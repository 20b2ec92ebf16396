//! Ports Layer - the block index this authority reads from
//!
//! The block-index store is an external collaborator. The authority only
//! needs hash lookups, the best tip and ancestor resolution.

use shared_types::Hash256;

use crate::domain::BlockRef;

/// Read access to the node's block index.
pub trait BlockIndex: Send + Sync {
    /// The indexed block with this hash, on any branch.
    fn lookup(&self, hash: &Hash256) -> Option<BlockRef>;

    /// Tip of the best chain, `None` before genesis is indexed.
    fn best_tip(&self) -> Option<BlockRef>;

    /// Ancestor of `from` at `height` (`from` itself when heights match).
    /// `None` if `from` is unknown or `height` is above it.
    fn ancestor(&self, from: &Hash256, height: u32) -> Option<BlockRef>;

    /// Whether `block` lies on the current best chain.
    fn is_on_best_chain(&self, block: &BlockRef) -> bool {
        self.best_tip()
            .and_then(|tip| self.ancestor(&tip.hash, block.height))
            .is_some_and(|found| found == *block)
    }
}
