use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use shared_types::{TimeSource, Timestamp};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::domain::{
    AddedNodeList, BanList, PeerId, PeerRecord, PeerState, RegistryConfig, RegistryError,
    RegistryResult,
};
use crate::ports::{AddedNodeStore, Connector, Resolver};
use crate::service::RegistryEvent;

/// Everything guarded by the registry lock.
#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) peers: HashMap<PeerId, PeerRecord>,
    pub(crate) next_id: u64,
    pub(crate) bans: BanList,
    pub(crate) added: AddedNodeList,
    /// Bumped on every added-node mutation; compared against the last
    /// persisted generation.
    pub(crate) added_generation: u64,
    /// Startup entries: listed and dialed like the rest, never written to the store.
    pub(crate) startup_added: HashSet<String>,
    pub(crate) total_bytes_sent: u64,
    pub(crate) total_bytes_recv: u64,
    pub(crate) shutting_down: bool,
}

impl RegistryState {
    /// Move `id` to `to`, enforcing the lifecycle graph.
    pub(crate) fn transition(
        &mut self,
        id: PeerId,
        to: PeerState,
    ) -> RegistryResult<&mut PeerRecord> {
        let record = self
            .peers
            .get_mut(&id)
            .ok_or(RegistryError::UnknownPeer(id))?;
        if !record.state.can_transition_to(to) {
            return Err(RegistryError::InvalidTransition {
                id,
                from: record.state,
                to,
            });
        }
        record.state = to;
        Ok(record)
    }
}

/// Host-provided collaborators.
#[derive(Clone)]
pub struct RegistryPorts {
    pub connector: Arc<dyn Connector>,
    pub resolver: Arc<dyn Resolver>,
    /// `None` keeps the added-node list in memory only.
    pub store: Option<Arc<dyn AddedNodeStore>>,
    pub time_source: Arc<dyn TimeSource>,
}

/// The live peer set.
pub struct PeerRegistry {
    pub(crate) config: RegistryConfig,
    pub(crate) default_port: u16,
    pub(crate) state: Mutex<RegistryState>,
    /// Last added-node generation written to the store. Held while saving
    /// so concurrent writers serialize and the newest list lands last.
    pub(crate) persisted_generation: Mutex<u64>,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) resolver: Arc<dyn Resolver>,
    pub(crate) store: Option<Arc<dyn AddedNodeStore>>,
    pub(crate) time_source: Arc<dyn TimeSource>,
    pub(crate) events: broadcast::Sender<RegistryEvent>,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl PeerRegistry {
    /// Create a registry, loading the added-node list from the store if one
    /// is configured.
    ///
    /// `default_port` is the active network's P2P port, used when an added
    /// node string carries no port.
    pub fn new(
        config: RegistryConfig,
        default_port: u16,
        ports: RegistryPorts,
    ) -> RegistryResult<Self> {
        let added = match &ports.store {
            Some(store) => {
                let entries = store
                    .load()
                    .map_err(|e| RegistryError::Store(e.to_string()))?;
                AddedNodeList::from_entries(entries)
            }
            None => AddedNodeList::new(),
        };
        if !added.is_empty() {
            info!(count = added.len(), "Loaded added nodes");
        }

        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            config,
            default_port,
            state: Mutex::new(RegistryState {
                added,
                ..RegistryState::default()
            }),
            persisted_generation: Mutex::new(0),
            connector: ports.connector,
            resolver: ports.resolver,
            store: ports.store,
            time_source: ports.time_source,
            events,
            shutdown,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// The registry's clock, shared with sessions so `version` timestamps
    /// and record times agree.
    pub fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    pub(crate) fn now_millis(&self) -> u64 {
        self.time_source.now_millis()
    }

    /// A receiver that flips to `true` when `shutdown()` runs.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }
}

impl fmt::Debug for PeerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerRegistry")
            .field("config", &self.config)
            .field("default_port", &self.default_port)
            .finish_non_exhaustive()
    }
}
