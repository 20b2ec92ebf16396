//! Ports Layer - Trait definitions for external dependencies
//!
//! The chain's proof-of-work identity hash is computed by an external
//! collaborator; this crate only knows how to ask for it.

use crate::domain::BlockHeader;
use shared_types::Hash256;

/// Computes a block's identity hash from its header.
///
/// When a hasher is supplied to the profile builder, the genesis block's
/// identity hash must equal the documented value or the build fails.
pub trait BlockHasher: Send + Sync {
    fn block_hash(&self, header: &BlockHeader) -> Hash256;
}

/// Hasher returning the SHA-256d header digest. Useful for chains whose
/// identity hash is the header digest, and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderDigestHasher;

impl BlockHasher for HeaderDigestHasher {
    fn block_hash(&self, header: &BlockHeader) -> Hash256 {
        header.digest()
    }
}
