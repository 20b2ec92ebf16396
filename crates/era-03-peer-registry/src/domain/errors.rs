//! Domain errors for the peer registry

use std::net::IpAddr;

use thiserror::Error;

use super::peer::{PeerId, PeerState};

/// Errors returned by registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// `addnode add` for an address already in the list.
    #[error("node already added: {0}")]
    AlreadyAdded(String),

    /// `addnode remove` or an info filter naming an absent address.
    #[error("node has not been added: {0}")]
    NotAdded(String),

    /// The address is on the ban list.
    #[error("address {0} is banned")]
    Banned(IpAddr),

    /// An outbound dial to an address that already has a live record.
    #[error("already connected to {0}")]
    AlreadyConnected(std::net::SocketAddr),

    #[error("peer {id}: invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        id: PeerId,
        from: PeerState,
        to: PeerState,
    },

    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    #[error("invalid addnode mode '{0}', expected add, remove or onetry")]
    InvalidMode(String),

    /// The registry has been shut down.
    #[error("registry is shutting down")]
    ShuttingDown,

    /// The added-node store could not be read or written.
    #[error("added-node store: {0}")]
    Store(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
