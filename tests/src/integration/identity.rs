//! Network identity flows: profile selection feeding the checkpoint
//! authority, the block gate and the wire codec.

use std::sync::Arc;

use era_01_network_profile::{Network, NetworkProfile, Upgrade};
use era_02_checkpoint_authority::{BlockIndex, CheckpointError, CHECKPOINT_SPAN};
use era_03_peer_registry::{
    ConnectionDirection, MisbehaviorOutcome, PeerId, PeerState, RegistryError, StaticResolver,
    Violation,
};
use node_runtime::container::{ContainerPorts, NodeConfig, NodeContainer};
use node_runtime::handlers::{ApiQueryHandler, CheckpointGate};
use node_runtime::wire::{encode_frame, read_frame, Frame, WireError};
use serde_json::json;
use shared_types::{sha256d, Hash256};

// =============================================================================
// TEST FIXTURES
// =============================================================================

fn h(n: u32) -> Hash256 {
    sha256d(&n.to_le_bytes())
}

fn container(dir: &tempfile::TempDir, network: Network) -> NodeContainer {
    let mut config = NodeConfig::for_testing(dir.path());
    config.network.testnet = network == Network::Testnet;
    let ports = ContainerPorts {
        resolver: Some(Arc::new(StaticResolver::new())),
        ..ContainerPorts::default()
    };
    NodeContainer::with_ports(config, ports).unwrap()
}

fn connect(container: &NodeContainer, addr: &str) -> PeerId {
    container
        .registry
        .register_connection(addr.parse().unwrap(), ConnectionDirection::Outbound)
        .unwrap()
}

/// Extend the best chain with `h(1)..=h(tip)`.
fn build_chain(gate: &CheckpointGate, genesis: Hash256, tip: u32) {
    let mut parent = genesis;
    for n in 1..=tip {
        gate.accept_block(None, h(n), parent).unwrap();
        parent = h(n);
    }
}

// =============================================================================
// INTEGRATION TESTS: Profile Selection
// =============================================================================

#[test]
fn test_each_network_gets_its_own_identity() {
    let main_dir = tempfile::tempdir().unwrap();
    let test_dir = tempfile::tempdir().unwrap();
    let main = container(&main_dir, Network::Main);
    let test = container(&test_dir, Network::Testnet);

    assert_ne!(main.profile.magic, test.profile.magic);
    assert_ne!(main.profile.genesis_hash, test.profile.genesis_hash);
    assert_eq!(main.block_index.best_tip().unwrap().hash, main.profile.genesis_hash);
    assert_eq!(test.block_index.best_tip().unwrap().hash, test.profile.genesis_hash);

    assert_eq!(main.authority.table().len(), 3);
    assert!(test.authority.table().is_empty());
    assert!(test.data_dir.ends_with("testnet"));
    assert_eq!(main.data_dir, main_dir.path());
}

#[test]
fn test_upgrade_gate_matches_on_both_networks() {
    let main = NetworkProfile::for_network(Network::Main, None).unwrap();
    let test = NetworkProfile::for_network(Network::Testnet, None).unwrap();

    for profile in [&main, &test] {
        assert!(!profile.is_upgrade_active(Upgrade::Halving, 472_177));
        assert!(profile.is_upgrade_active(Upgrade::Halving, 472_178));
    }
}

#[tokio::test]
async fn test_frame_from_other_network_is_refused() {
    let main = NetworkProfile::for_network(Network::Main, None).unwrap();
    let test = NetworkProfile::for_network(Network::Testnet, None).unwrap();

    let bytes = encode_frame(test.magic, &Frame::new("verack", Vec::new())).unwrap();

    let mut reader = bytes.as_slice();
    assert!(read_frame(&mut reader, &test).await.is_ok());

    let mut reader = bytes.as_slice();
    let err = read_frame(&mut reader, &main).await.unwrap_err();
    assert!(matches!(err, WireError::WrongMagic(_)));
}

// =============================================================================
// INTEGRATION TESTS: Checkpoints and Peer Trust
// =============================================================================

#[tokio::test]
async fn test_hardened_mismatch_bans_sender_and_its_address() {
    let dir = tempfile::tempdir().unwrap();
    let c = container(&dir, Network::Main);
    let gate = CheckpointGate::new(&c);
    let api = ApiQueryHandler::new(&c);

    build_chain(&gate, c.profile.genesis_hash, 3);
    let checkpoint = api.dispatch("getcheckpoint", &[]).await.unwrap();
    assert_eq!(checkpoint["lastcheckpoint"], json!(0));

    let peer = connect(&c, "10.1.1.1:13546");
    let err = gate.accept_block(Some(peer), h(4), h(3)).unwrap_err();
    assert!(matches!(err, CheckpointError::HardenedMismatch { height: 4, .. }));

    assert_eq!(c.registry.peer(peer).unwrap().state, PeerState::Banned);
    assert!(c.registry.should_disconnect(peer));
    assert_eq!(c.block_index.best_tip().unwrap().height, 3);

    c.registry.disconnect(peer);
    let again = c
        .registry
        .register_connection("10.1.1.1:4000".parse().unwrap(), ConnectionDirection::Inbound);
    assert!(matches!(again, Err(RegistryError::Banned(_))));

    let info = api.dispatch("getnetworkinfo", &[]).await.unwrap();
    assert_eq!(info["banned"], json!(1));
}

#[test]
fn test_sync_checkpoint_trails_tip_and_blocks_deep_forks() {
    let dir = tempfile::tempdir().unwrap();
    let c = container(&dir, Network::Testnet);
    let gate = CheckpointGate::new(&c);

    let tip = CHECKPOINT_SPAN + 5;
    build_chain(&gate, c.profile.genesis_hash, tip);
    let sync = c.authority.current_sync_checkpoint();
    assert_eq!(sync.height, 5);
    assert_eq!(sync.hash, h(5));

    let peer = connect(&c, "10.2.2.2:23536");
    let fork = sha256d(b"fork below sync");
    let err = gate.accept_block(Some(peer), fork, h(1)).unwrap_err();
    assert_eq!(
        err,
        CheckpointError::SyncViolation {
            height: 2,
            sync_height: 5
        }
    );
    assert!(c.block_index.lookup(&fork).is_none());
    assert!(c.registry.is_banned(&"10.2.2.2".parse().unwrap()));

    // A fork rooted at the sync block itself is still acceptable.
    let honest = connect(&c, "10.3.3.3:23536");
    let side = sha256d(b"fork at sync");
    let block = gate.accept_block(Some(honest), side, h(5)).unwrap();
    assert_eq!(block.height, 6);
    assert_eq!(c.registry.peer(honest).unwrap().banscore, 0);
}

#[test]
fn test_unknown_parent_is_not_held_against_sender() {
    let dir = tempfile::tempdir().unwrap();
    let c = container(&dir, Network::Testnet);
    let gate = CheckpointGate::new(&c);
    let peer = connect(&c, "10.4.4.4:23536");

    let err = gate.accept_block(Some(peer), h(9), h(8)).unwrap_err();
    assert_eq!(err, CheckpointError::UnknownParent(h(8)));
    assert_eq!(c.registry.peer(peer).unwrap().banscore, 0);

    // The same peer can still be penalized for something it did do.
    let outcome = c.registry.misbehaving(peer, Violation::BadChecksum);
    assert_eq!(outcome, MisbehaviorOutcome::Penalized { score: 10 });
}
