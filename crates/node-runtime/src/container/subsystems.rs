//! # Node Container
//!
//! Builds every long-lived component in dependency order:
//!
//! 1. Network profile (selected once, with operator port overrides)
//! 2. Block index seeded with the profile's genesis
//! 3. Checkpoint authority over the profile's table
//! 4. Session context and TCP connector
//! 5. Peer registry with the added-node file in the network's data dir

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use era_01_network_profile::{NetworkProfile, ProfileBuilder, ProfileRecord, ProfileSelector};
use era_02_checkpoint_authority::{BlockIndex, CheckpointAuthority, InMemoryBlockIndex};
use era_03_peer_registry::{
    AddedNodeStore, Connector, DnsResolver, JsonFileStore, PeerRegistry, RegistryError,
    RegistryPorts, Resolver,
};
use shared_types::{SystemTimeSource, TimeSource};
use tracing::{debug, info};

use super::config::NodeConfig;
use crate::adapters::{SessionContext, TcpConnector};

/// Collaborators that tests replace.
#[derive(Clone, Default)]
pub struct ContainerPorts {
    pub connector: Option<Arc<dyn Connector>>,
    pub resolver: Option<Arc<dyn Resolver>>,
    pub store: Option<Arc<dyn AddedNodeStore>>,
    pub time_source: Option<Arc<dyn TimeSource>>,
}

/// Every component the runtime wires together.
pub struct NodeContainer {
    pub config: NodeConfig,
    pub selector: ProfileSelector,
    pub profile: Arc<NetworkProfile>,
    /// Network-specific data directory.
    pub data_dir: PathBuf,
    pub block_index: Arc<InMemoryBlockIndex>,
    pub authority: Arc<CheckpointAuthority>,
    pub session: Arc<SessionContext>,
    pub registry: Arc<PeerRegistry>,
}

impl NodeContainer {
    pub fn new(config: NodeConfig) -> Result<Self> {
        Self::with_ports(config, ContainerPorts::default())
    }

    pub fn with_ports(config: NodeConfig, ports: ContainerPorts) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let network = config.network_kind();
        let record = ProfileRecord::for_network(network);
        let p2p_port = config.network.p2p_port.unwrap_or(record.default_port);
        let rpc_port = config.network.rpc_port.unwrap_or(record.rpc_port);

        let selector = ProfileSelector::new();
        let profile = selector
            .select_with(ProfileBuilder::new(record).ports(p2p_port, rpc_port))
            .with_context(|| format!("failed to select the {network} profile"))?;

        let data_dir = profile.data_dir(&config.storage.data_dir);
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let block_index = Arc::new(InMemoryBlockIndex::with_genesis(profile.genesis_hash));
        let authority = Arc::new(
            CheckpointAuthority::from_profile(&profile).context("invalid checkpoint table")?,
        );
        debug!(
            checkpoints = authority.table().len(),
            estimate = authority.total_blocks_estimate(),
            "Checkpoint authority ready"
        );

        let session = Arc::new(SessionContext::new(
            Arc::clone(&profile),
            Arc::clone(&block_index) as Arc<dyn BlockIndex>,
        ));

        let connector = ports
            .connector
            .unwrap_or_else(|| Arc::new(TcpConnector::new(Arc::clone(&session))));
        let resolver = ports.resolver.unwrap_or_else(|| Arc::new(DnsResolver));
        let store = ports
            .store
            .unwrap_or_else(|| Arc::new(JsonFileStore::in_data_dir(&data_dir)));
        let time_source = ports
            .time_source
            .unwrap_or_else(|| Arc::new(SystemTimeSource));

        let registry = Arc::new(
            PeerRegistry::new(
                config.registry_config(),
                profile.default_port(),
                RegistryPorts {
                    connector,
                    resolver,
                    store: Some(store),
                    time_source,
                },
            )
            .context("failed to open the peer registry")?,
        );

        for node in &config.network.add_nodes {
            match registry.add_startup_node(node) {
                Ok(()) | Err(RegistryError::AlreadyAdded(_)) => {}
                Err(e) => return Err(e).context("failed to add --addnode entry"),
            }
        }

        info!(
            network = %profile.network,
            p2p_port = profile.default_port,
            rpc_port = profile.rpc_port,
            data_dir = %data_dir.display(),
            added_nodes = registry.added_nodes().len(),
            "Node container initialized"
        );

        Ok(Self {
            config,
            selector,
            profile,
            data_dir,
            block_index,
            authority,
            session,
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use era_01_network_profile::Network;
    use era_03_peer_registry::{AddNodeMode, MemoryStore, StaticResolver};

    fn ports(store: Arc<MemoryStore>) -> ContainerPorts {
        ContainerPorts {
            resolver: Some(Arc::new(StaticResolver::new())),
            store: Some(store),
            ..ContainerPorts::default()
        }
    }

    #[test]
    fn test_testnet_container() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::for_testing(dir.path());
        let store = Arc::new(MemoryStore::new());
        let container = NodeContainer::with_ports(config, ports(store)).unwrap();

        assert_eq!(container.profile.network, Network::Testnet);
        assert_eq!(container.selector.current().unwrap().network, Network::Testnet);
        assert!(container.data_dir.starts_with(dir.path()));
        assert!(container.data_dir.is_dir());
        assert_eq!(
            container.block_index.best_tip().unwrap().hash,
            container.profile.genesis_hash
        );
        assert_eq!(container.registry.default_port(), 0);
    }

    #[test]
    fn test_port_override_reaches_profile() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::for_testing(dir.path());
        config.network.p2p_port = Some(40404);
        config.network.rpc_port = Some(40405);

        let container = NodeContainer::with_ports(config, ports(Arc::new(MemoryStore::new()))).unwrap();
        assert_eq!(container.profile.default_port(), 40404);
        assert_eq!(container.profile.rpc_port, 40405);
    }

    #[test]
    fn test_addnode_flags_listed_but_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::for_testing(dir.path());
        config.network.add_nodes = vec!["10.0.0.1".into(), "10.0.0.2".into()];
        let store = Arc::new(MemoryStore::with_nodes(vec!["10.0.0.1".into()]));

        let container = NodeContainer::with_ports(config, ports(Arc::clone(&store))).unwrap();
        assert_eq!(container.registry.added_nodes(), vec!["10.0.0.1", "10.0.0.2"]);
        assert_eq!(store.nodes(), vec!["10.0.0.1"]);
        assert_eq!(store.save_count(), 0);

        container.registry.add_node("10.0.0.3", AddNodeMode::Add).unwrap();
        assert_eq!(store.nodes(), vec!["10.0.0.1", "10.0.0.3"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NodeConfig::for_testing(dir.path());
        config.peers.ban_threshold = 0;
        assert!(NodeContainer::with_ports(config, ContainerPorts::default()).is_err());
    }
}
