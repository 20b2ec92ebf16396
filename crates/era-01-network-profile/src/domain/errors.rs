//! Domain errors for network profile selection and genesis verification.

use shared_types::Hash256;
use thiserror::Error;

/// Errors raised while selecting or building a network profile.
///
/// Every variant is fatal at startup: the node must not run against an
/// unintended network or genesis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainParamsError {
    /// Selector names neither mainnet nor testnet.
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),

    /// A profile is already active for this process.
    #[error("a network profile has already been selected")]
    AlreadySelected,

    /// `current()` called before `select()`.
    #[error("no network profile has been selected")]
    NotSelected,

    #[error("genesis merkle root mismatch: expected {expected}, computed {computed}")]
    MerkleRootMismatch { expected: Hash256, computed: Hash256 },

    #[error("genesis header digest mismatch: expected {expected}, computed {computed}")]
    HeaderDigestMismatch { expected: Hash256, computed: Hash256 },

    #[error("genesis hash mismatch: expected {expected}, computed {computed}")]
    GenesisHashMismatch { expected: Hash256, computed: Hash256 },

    /// The genesis identity hash does not meet the network's own work limit.
    #[error("genesis hash {0} is above the proof-of-work limit")]
    GenesisAboveTarget(Hash256),
}

/// A frame whose first four bytes are not this network's magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("network magic mismatch: expected {expected:02x?}, got {actual:02x?}")]
pub struct MagicMismatch {
    pub expected: [u8; 4],
    pub actual: [u8; 4],
}
