//! # Connection Manager
//!
//! Background loops that keep the node connected:
//!
//! - **Seeding:** while short of outbound peers, dial DNS seeds, then the
//!   compiled fixed seeds.
//! - **Added nodes:** periodically dial every operator-added node that has
//!   no live connection.
//! - **Housekeeping:** queue keep-alive pings and sweep expired bans.
//!
//! Every loop exits when the registry's shutdown signal fires; dials in
//! flight are cancelled by the registry itself.

use std::sync::Arc;
use std::time::Duration;

use era_01_network_profile::NetworkProfile;
use era_03_peer_registry::{ConnectionFilter, DialError, PeerRegistry};
use rand::seq::SliceRandom;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::container::NetworkConfig;

/// How often the seeding loop re-checks the outbound count.
const SEED_RETRY: Duration = Duration::from_secs(60);

pub struct ConnectionManager {
    registry: Arc<PeerRegistry>,
    profile: Arc<NetworkProfile>,
    config: NetworkConfig,
}

impl ConnectionManager {
    pub fn new(registry: Arc<PeerRegistry>, profile: Arc<NetworkProfile>, config: NetworkConfig) -> Self {
        Self {
            registry,
            profile,
            config,
        }
    }

    fn outbound_slots(&self) -> usize {
        self.config
            .max_outbound
            .saturating_sub(self.registry.connection_count(ConnectionFilter::OutboundOnly))
    }

    // =========================================================================
    // SEEDING
    // =========================================================================

    /// One seeding pass. Returns how many connections it opened.
    pub async fn bootstrap_from_seeds(&self) -> usize {
        let mut opened = 0;

        for seed in &self.profile.dns_seeds {
            if self.outbound_slots() == 0 {
                return opened;
            }
            let result = match self.profile.dns_seed_literal(seed) {
                Some(addr) => self.registry.dial(addr).await,
                None => self.registry.dial_host(&seed.host).await,
            };
            match result {
                Ok(peer) => {
                    debug!(peer_id = %peer, seed = %seed.name, "Connected to DNS seed");
                    opened += 1;
                }
                Err(DialError::Cancelled) => return opened,
                Err(e) => debug!(seed = %seed.name, error = %e, "DNS seed dial failed"),
            }
        }

        if self.outbound_slots() == 0 || self.registry.connection_count(ConnectionFilter::OutboundOnly) > 0 {
            return opened;
        }

        // Nothing outbound from DNS: fall back to the compiled seeds.
        let fixed = {
            let mut rng = rand::thread_rng();
            let mut addrs = self.profile.fixed_seed_addresses(self.registry.now(), &mut rng);
            addrs.shuffle(&mut rng);
            addrs
        };
        for seed in fixed {
            if self.outbound_slots() == 0 {
                break;
            }
            match self.registry.dial(seed.addr).await {
                Ok(peer) => {
                    debug!(peer_id = %peer, addr = %seed.addr, "Connected to fixed seed");
                    opened += 1;
                }
                Err(DialError::Cancelled) => break,
                Err(e) => debug!(addr = %seed.addr, error = %e, "Fixed seed dial failed"),
            }
        }
        opened
    }

    pub async fn run_seeding(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.config.dns_seed {
            debug!("Seeding disabled");
            return;
        }
        let mut ticker = tokio::time::interval(SEED_RETRY);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.outbound_slots() > 0 {
                        let opened = self.bootstrap_from_seeds().await;
                        info!(opened, "Seeding pass complete");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Seeding loop stopped");
    }

    // =========================================================================
    // ADDED NODES
    // =========================================================================

    /// Dial every added node without a live connection. Returns how many
    /// connected.
    pub async fn connect_added_nodes(&self) -> usize {
        let infos = match self.registry.added_node_info(true, None).await {
            Ok(infos) => infos,
            Err(e) => {
                debug!(error = %e, "Added-node lookup failed");
                return 0;
            }
        };

        let mut opened = 0;
        for info in infos.into_iter().filter(|i| i.connected != Some(true)) {
            match self.registry.dial_host(&info.added_node).await {
                Ok(peer) => {
                    info!(peer_id = %peer, node = %info.added_node, "Connected to added node");
                    opened += 1;
                }
                Err(DialError::Cancelled) => break,
                Err(e) => debug!(node = %info.added_node, error = %e, "Added node dial failed"),
            }
        }
        opened
    }

    pub async fn run_added_nodes(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.added_node_retry());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.connect_added_nodes().await;
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Added-node loop stopped");
    }

    // =========================================================================
    // HOUSEKEEPING
    // =========================================================================

    pub async fn run_housekeeping(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.ping_interval());
        // The first tick fires immediately; skip it so fresh peers are not
        // pinged before their handshake.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let queued = self.registry.queue_ping_all();
                    let expired = self.registry.sweep_bans();
                    debug!(queued, expired, "Housekeeping tick");
                }
                _ = shutdown.changed() => break,
            }
        }
        debug!("Housekeeping loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use era_01_network_profile::{DnsSeed, Network, ProfileBuilder, ProfileRecord};
    use era_03_peer_registry::{
        AddNodeMode, Connector, MemoryStore, PeerId, RegistryConfig, RegistryPorts, StaticResolver,
    };
    use shared_types::FixedTimeSource;

    /// Accepts every dial and counts them.
    #[derive(Default)]
    struct CountingConnector {
        dials: AtomicUsize,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(
            &self,
            registry: Arc<PeerRegistry>,
            peer: PeerId,
            _target: SocketAddr,
        ) -> Result<(), DialError> {
            self.dials.fetch_add(1, Ordering::SeqCst);
            registry.begin_handshake(peer).map_err(|e| DialError::Io(e.to_string()))
        }
    }

    struct Harness {
        registry: Arc<PeerRegistry>,
        connector: Arc<CountingConnector>,
        resolver: Arc<StaticResolver>,
    }

    fn harness() -> Harness {
        let connector = Arc::new(CountingConnector::default());
        let resolver = Arc::new(StaticResolver::new());
        let registry = PeerRegistry::new(
            RegistryConfig::for_testing(),
            13546,
            RegistryPorts {
                connector: Arc::clone(&connector) as _,
                resolver: Arc::clone(&resolver) as _,
                store: Some(Arc::new(MemoryStore::new())),
                time_source: Arc::new(FixedTimeSource::new(1_700_000_000)),
            },
        )
        .unwrap();
        Harness {
            registry: Arc::new(registry),
            connector,
            resolver,
        }
    }

    fn profile(dns: Vec<DnsSeed>) -> Arc<NetworkProfile> {
        let record = ProfileRecord::for_network(Network::Main);
        let fixed = record.fixed_seeds.clone();
        Arc::new(
            ProfileBuilder::new(record)
                .seeds(dns, fixed)
                .build(None)
                .unwrap(),
        )
    }

    fn manager(h: &Harness, dns: Vec<DnsSeed>, max_outbound: usize) -> ConnectionManager {
        let config = NetworkConfig {
            max_outbound,
            ..NetworkConfig::default()
        };
        ConnectionManager::new(Arc::clone(&h.registry), profile(dns), config)
    }

    #[tokio::test]
    async fn test_dns_seeds_dialed_first() {
        let h = harness();
        h.resolver
            .insert("seed.example", vec!["198.51.100.1:13546".parse().unwrap()]);
        let cm = manager(&h, vec![DnsSeed::new("example", "seed.example")], 1);

        assert_eq!(cm.bootstrap_from_seeds().await, 1);
        assert_eq!(h.connector.dials.load(Ordering::SeqCst), 1);
        assert_eq!(h.registry.connection_count(ConnectionFilter::OutboundOnly), 1);
    }

    #[tokio::test]
    async fn test_literal_dns_seed_skips_resolver() {
        let h = harness();
        let cm = manager(&h, vec![DnsSeed::new("literal", "198.51.100.2")], 1);

        assert_eq!(cm.bootstrap_from_seeds().await, 1);
        let peers = h.registry.snapshot();
        assert_eq!(peers[0].addr, "198.51.100.2:13546");
    }

    #[tokio::test]
    async fn test_fixed_seeds_used_when_dns_fails() {
        let h = harness();
        let cm = manager(&h, vec![DnsSeed::new("dead", "dead.example")], 1);

        assert_eq!(cm.bootstrap_from_seeds().await, 1);
        assert_eq!(h.registry.connection_count(ConnectionFilter::OutboundOnly), 1);
    }

    #[tokio::test]
    async fn test_no_seeding_when_slots_full() {
        let h = harness();
        let cm = manager(&h, vec![DnsSeed::new("literal", "198.51.100.2")], 0);

        assert_eq!(cm.bootstrap_from_seeds().await, 0);
        assert_eq!(h.connector.dials.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_added_nodes_dialed_once() {
        let h = harness();
        let addr: SocketAddr = "198.51.100.9:13546".parse().unwrap();
        h.resolver.insert("added.example", vec![addr]);
        h.registry.add_node("added.example", AddNodeMode::Add).unwrap();
        let cm = manager(&h, Vec::new(), 8);

        assert_eq!(cm.connect_added_nodes().await, 1);
        // Already connected: the next pass leaves it alone.
        assert_eq!(cm.connect_added_nodes().await, 0);
        assert_eq!(h.connector.dials.load(Ordering::SeqCst), 1);
    }
}
