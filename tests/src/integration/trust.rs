//! Peer trust flows: the added-node list on disk across restarts, bans on
//! a controlled clock, and seed conversion.

use std::net::SocketAddr;
use std::sync::Arc;

use era_01_network_profile::{Network, NetworkProfile};
use era_03_peer_registry::{
    AddedNodeStore, ConnectionDirection, JsonFileStore, RegistryError, StaticResolver, Violation,
};
use node_runtime::container::{ContainerPorts, NodeConfig, NodeContainer};
use node_runtime::handlers::api_query::{RPC_CLIENT_NODE_ALREADY_ADDED, RPC_CLIENT_NODE_NOT_ADDED};
use node_runtime::handlers::ApiQueryHandler;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use shared_types::{FixedTimeSource, TimeSource, Timestamp, ONE_WEEK_SECS};

// =============================================================================
// TEST FIXTURES
// =============================================================================

struct Node {
    container: NodeContainer,
    api: ApiQueryHandler,
}

fn start(config: NodeConfig, resolver: Arc<StaticResolver>, clock: Option<Arc<FixedTimeSource>>) -> Node {
    let ports = ContainerPorts {
        resolver: Some(resolver),
        time_source: clock.map(|c| c as Arc<dyn TimeSource>),
        ..ContainerPorts::default()
    };
    let container = NodeContainer::with_ports(config, ports).unwrap();
    let api = ApiQueryHandler::new(&container);
    Node { container, api }
}

fn node(dir: &tempfile::TempDir) -> Node {
    start(
        NodeConfig::for_testing(dir.path()),
        Arc::new(StaticResolver::new()),
        None,
    )
}

// =============================================================================
// INTEGRATION TESTS: Added Nodes
// =============================================================================

#[tokio::test]
async fn test_added_nodes_survive_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let first = node(&dir);
        first.api.dispatch("addnode", &[json!("10.9.9.9:23536"), json!("add")]).await.unwrap();
        first.api.dispatch("addnode", &[json!("seed.example"), json!("add")]).await.unwrap();

        let err = first
            .api
            .dispatch("addnode", &[json!("seed.example"), json!("add")])
            .await
            .unwrap_err();
        assert_eq!(err.code, RPC_CLIENT_NODE_ALREADY_ADDED);
        assert_eq!(err.message, "Error: Node already added");
    }

    let on_disk = JsonFileStore::in_data_dir(&dir.path().join("testnet"));
    assert_eq!(
        on_disk.load().unwrap(),
        vec!["10.9.9.9:23536".to_string(), "seed.example".to_string()]
    );

    // A startup entry that is already persisted is not duplicated, and a new
    // one lives only as long as the process.
    let mut config = NodeConfig::for_testing(dir.path());
    config.network.add_nodes = vec!["10.9.9.9:23536".to_string(), "10.8.8.8:23536".to_string()];
    let second = start(config, Arc::new(StaticResolver::new()), None);
    assert_eq!(
        second.container.registry.added_nodes(),
        vec![
            "10.9.9.9:23536".to_string(),
            "seed.example".to_string(),
            "10.8.8.8:23536".to_string()
        ]
    );

    second
        .api
        .dispatch("addnode", &[json!("10.9.9.9:23536"), json!("remove")])
        .await
        .unwrap();
    let err = second
        .api
        .dispatch("addnode", &[json!("10.9.9.9:23536"), json!("remove")])
        .await
        .unwrap_err();
    assert_eq!(err.code, RPC_CLIENT_NODE_NOT_ADDED);
    drop(second);

    let third = node(&dir);
    assert_eq!(third.container.registry.added_nodes(), vec!["seed.example".to_string()]);
}

#[tokio::test]
async fn test_added_node_info_reports_live_direction() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = Arc::new(StaticResolver::new());
    let live: SocketAddr = "10.5.5.5:23536".parse().unwrap();
    let idle: SocketAddr = "10.5.5.6:23536".parse().unwrap();
    resolver.insert("pair.example", vec![live, idle]);

    let n = start(NodeConfig::for_testing(dir.path()), resolver, None);
    n.api.dispatch("addnode", &[json!("pair.example"), json!("add")]).await.unwrap();
    n.container
        .registry
        .register_connection(live, ConnectionDirection::Outbound)
        .unwrap();

    let info = n.api.dispatch("getaddednodeinfo", &[json!(true)]).await.unwrap();
    assert_eq!(
        info,
        json!([{
            "addednode": "pair.example",
            "connected": true,
            "addresses": [
                { "address": "10.5.5.5:23536", "connected": "outbound" },
                { "address": "10.5.5.6:23536", "connected": "false" },
            ],
        }])
    );

    let names_only = n.api.dispatch("getaddednodeinfo", &[json!("false")]).await.unwrap();
    assert_eq!(names_only, json!([{ "addednode": "pair.example" }]));
}

// =============================================================================
// INTEGRATION TESTS: Bans on a Controlled Clock
// =============================================================================

#[test]
fn test_ban_expires_with_clock() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedTimeSource::new(1_700_000_000));
    let n = start(
        NodeConfig::for_testing(dir.path()),
        Arc::new(StaticResolver::new()),
        Some(Arc::clone(&clock)),
    );
    let registry = &n.container.registry;
    let addr: SocketAddr = "10.6.6.6:23536".parse().unwrap();

    let id = registry.register_connection(addr, ConnectionDirection::Inbound).unwrap();
    for _ in 0..9 {
        registry.misbehaving(id, Violation::BadChecksum);
    }
    assert!(!registry.should_disconnect(id));
    registry.misbehaving(id, Violation::BadChecksum);
    assert!(registry.should_disconnect(id));
    registry.disconnect(id);

    clock.advance(59);
    assert_eq!(
        registry.register_connection(addr, ConnectionDirection::Inbound),
        Err(RegistryError::Banned(addr.ip()))
    );

    clock.advance(1);
    assert_eq!(registry.sweep_bans(), 1);
    let back = registry.register_connection(addr, ConnectionDirection::Inbound).unwrap();
    assert_eq!(registry.peer(back).unwrap().banscore, 0);
}

// =============================================================================
// INTEGRATION TESTS: Seeds
// =============================================================================

#[test]
fn test_fixed_seed_ages_are_reproducible() {
    let profile = NetworkProfile::for_network(Network::Main, None).unwrap();
    let now = Timestamp::new(1_700_000_000);

    let a = profile.fixed_seed_addresses(now, &mut StdRng::seed_from_u64(7));
    let b = profile.fixed_seed_addresses(now, &mut StdRng::seed_from_u64(7));
    assert_eq!(a, b);
    assert_eq!(a.len(), profile.fixed_seeds.len());

    for seed in &a {
        let age = now.as_secs() - seed.last_seen.as_secs();
        assert!(age > ONE_WEEK_SECS && age < 2 * ONE_WEEK_SECS);
        assert_eq!(seed.addr.port(), profile.default_port());
    }
}
