use std::net::IpAddr;

use shared_types::Timestamp;
use tokio::sync::broadcast;

use crate::domain::PeerId;
use crate::service::PeerRegistry;

/// Notifications published on the registry's broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// The number of live connections changed.
    ConnectionCountChanged { count: usize },
    /// An address was banned, by score (`peer` set) or by the operator.
    PeerBanned {
        peer: Option<PeerId>,
        ip: IpAddr,
        until: Timestamp,
    },
    /// The added-node list was edited.
    AddedNodesChanged { count: usize },
}

impl PeerRegistry {
    /// Subscribe to registry events. Slow receivers observe `Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: RegistryEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}
