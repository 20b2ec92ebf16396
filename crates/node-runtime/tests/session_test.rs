//! # Peer Session Tests
//!
//! Drive `run_session` over an in-memory duplex pipe, playing the remote
//! peer by hand with the wire codec.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use era_01_network_profile::{Network, NetworkProfile};
use era_02_checkpoint_authority::{BlockIndex, InMemoryBlockIndex};
use era_03_peer_registry::{
    ConnectionDirection, Connector, DialError, PeerId, PeerRegistry, PeerState, RegistryConfig,
    RegistryPorts, StaticResolver, Violation,
};
use node_runtime::adapters::{spawn_session, CloseReason, SessionContext};
use node_runtime::wire::{
    decode_nonce, encode_frame, encode_nonce, read_frame, write_frame, Frame, NetAddress,
    VersionMessage, PROTOCOL_VERSION,
};
use shared_types::FixedTimeSource;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const LOCAL_NONCE: u64 = 0xdead_beef;
const WAIT: Duration = Duration::from_secs(2);

struct NoDial;

#[async_trait]
impl Connector for NoDial {
    async fn connect(
        &self,
        _registry: Arc<PeerRegistry>,
        _peer: PeerId,
        target: SocketAddr,
    ) -> Result<(), DialError> {
        Err(DialError::Refused(target))
    }
}

struct Remote {
    reader: ReadHalf<DuplexStream>,
    writer: WriteHalf<DuplexStream>,
    profile: Arc<NetworkProfile>,
}

impl Remote {
    async fn send(&mut self, command: &str, payload: Vec<u8>) {
        write_frame(&mut self.writer, self.profile.magic, &Frame::new(command, payload))
            .await
            .unwrap();
    }

    async fn expect(&mut self, command: &str) -> Frame {
        let frame = timeout(WAIT, read_frame(&mut self.reader, &self.profile))
            .await
            .expect("frame within timeout")
            .expect("well-formed frame");
        assert_eq!(frame.command, command);
        frame
    }

    async fn send_version(&mut self, nonce: u64) {
        let version = VersionMessage {
            version: PROTOCOL_VERSION,
            services: 1,
            timestamp: 1_000,
            addr_recv: NetAddress::unspecified(),
            addr_from: NetAddress::unspecified(),
            nonce,
            user_agent: "/remote:1.0/".into(),
            start_height: 77,
        };
        self.send("version", version.encode()).await;
    }
}

struct Harness {
    registry: Arc<PeerRegistry>,
    peer: PeerId,
    session: JoinHandle<CloseReason>,
    remote: Remote,
}

fn harness(direction: ConnectionDirection, handshake_timeout: Duration) -> Harness {
    let profile = Arc::new(NetworkProfile::for_network(Network::Main, None).unwrap());
    let index = Arc::new(InMemoryBlockIndex::with_genesis(profile.genesis_hash));
    let ctx = Arc::new(SessionContext {
        profile: Arc::clone(&profile),
        block_index: index as Arc<dyn BlockIndex>,
        local_nonce: LOCAL_NONCE,
        handshake_timeout,
        tick: Duration::from_millis(10),
    });

    let registry = Arc::new(
        PeerRegistry::new(
            RegistryConfig::for_testing(),
            profile.default_port(),
            RegistryPorts {
                connector: Arc::new(NoDial),
                resolver: Arc::new(StaticResolver::new()),
                store: None,
                time_source: Arc::new(FixedTimeSource::new(1_000)),
            },
        )
        .unwrap(),
    );
    let peer = registry
        .register_connection("203.0.113.5:13546".parse().unwrap(), direction)
        .unwrap();

    let (local, remote) = tokio::io::duplex(64 * 1024);
    let session = spawn_session(ctx, Arc::clone(&registry), peer, direction, local);
    let (reader, writer) = tokio::io::split(remote);

    Harness {
        registry,
        peer,
        session,
        remote: Remote {
            reader,
            writer,
            profile,
        },
    }
}

async fn handshake(h: &mut Harness) {
    h.remote.send_version(42).await;
    h.remote.expect("version").await;
    h.remote.expect("verack").await;
    h.remote.send("verack", Vec::new()).await;
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition within timeout");
}

async fn finish(h: Harness) -> CloseReason {
    timeout(WAIT, h.session).await.expect("session ends").unwrap()
}

// =============================================================================
// TEST GROUP 1: Handshake
// =============================================================================

#[tokio::test]
async fn test_inbound_handshake_records_version() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    handshake(&mut h).await;

    let (registry, peer) = (Arc::clone(&h.registry), h.peer);
    wait_until(|| registry.peer(peer).is_some_and(|p| p.state == PeerState::Active)).await;

    let stats = h.registry.peer(h.peer).unwrap();
    assert_eq!(stats.subver, "/remote:1.0/");
    assert_eq!(stats.startingheight, 77);
    assert_eq!(stats.timeoffset, 0);
    assert!(stats.bytesrecv > 0);
    assert!(stats.bytessent > 0);
}

#[tokio::test]
async fn test_outbound_sends_version_first() {
    let mut h = harness(ConnectionDirection::Outbound, WAIT);

    let frame = h.remote.expect("version").await;
    let version = VersionMessage::decode(&frame.payload).unwrap();
    assert_eq!(version.nonce, LOCAL_NONCE);
    assert_eq!(version.start_height, 0);

    h.remote.send_version(42).await;
    h.remote.expect("verack").await;
}

#[tokio::test]
async fn test_self_connection_dropped() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    h.remote.send_version(LOCAL_NONCE).await;

    let peer = h.peer;
    let registry = Arc::clone(&h.registry);
    assert_eq!(finish(h).await, CloseReason::SelfConnection);
    assert!(registry.peer(peer).is_none());
}

#[tokio::test]
async fn test_handshake_timeout() {
    let h = harness(ConnectionDirection::Inbound, Duration::from_millis(50));
    let registry = Arc::clone(&h.registry);
    assert_eq!(finish(h).await, CloseReason::HandshakeTimeout);
    assert_eq!(registry.connection_count(Default::default()), 0);
}

#[tokio::test]
async fn test_duplicate_version_scored() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    handshake(&mut h).await;
    h.remote.send_version(42).await;

    let (registry, peer) = (Arc::clone(&h.registry), h.peer);
    wait_until(|| registry.peer(peer).is_some_and(|p| p.banscore == 1)).await;
}

// =============================================================================
// TEST GROUP 2: Framing Violations
// =============================================================================

#[tokio::test]
async fn test_bad_checksum_scored_and_session_continues() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    handshake(&mut h).await;

    let mut bytes = encode_frame(h.remote.profile.magic, &Frame::new("ping", encode_nonce(5))).unwrap();
    bytes[20] ^= 0xff;
    tokio::io::AsyncWriteExt::write_all(&mut h.remote.writer, &bytes).await.unwrap();

    let (registry, peer) = (Arc::clone(&h.registry), h.peer);
    wait_until(|| registry.peer(peer).is_some_and(|p| p.banscore == 10)).await;

    // Still talking.
    h.remote.send("ping", encode_nonce(6)).await;
    let pong = h.remote.expect("pong").await;
    assert_eq!(decode_nonce(&pong.payload).unwrap(), 6);
}

#[tokio::test]
async fn test_wrong_magic_disconnects() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    let testnet = NetworkProfile::for_network(Network::Testnet, None).unwrap();
    write_frame(&mut h.remote.writer, testnet.magic, &Frame::new("version", Vec::new()))
        .await
        .unwrap();

    assert!(matches!(finish(h).await, CloseReason::Protocol(_)));
}

#[tokio::test]
async fn test_message_before_version_scored() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    h.remote.send("inv", vec![0]).await;

    let (registry, peer) = (Arc::clone(&h.registry), h.peer);
    wait_until(|| registry.peer(peer).is_some_and(|p| p.banscore == 1)).await;
}

// =============================================================================
// TEST GROUP 3: Pings, Bans and Shutdown
// =============================================================================

#[tokio::test]
async fn test_queued_ping_round_trip() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    handshake(&mut h).await;
    let (registry, peer) = (Arc::clone(&h.registry), h.peer);
    wait_until(|| registry.peer(peer).is_some_and(|p| p.state == PeerState::Active)).await;

    assert_eq!(h.registry.queue_ping_all(), 1);
    let ping = h.remote.expect("ping").await;
    h.remote.send("pong", ping.payload).await;

    wait_until(|| registry.peer(peer).is_some_and(|p| p.pingtime.is_some())).await;
    assert!(h.registry.peer(h.peer).unwrap().pingwait.is_none());
}

#[tokio::test]
async fn test_ban_closes_session() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    handshake(&mut h).await;

    h.registry.misbehaving(h.peer, Violation::InvalidBlock);
    let registry = Arc::clone(&h.registry);
    assert_eq!(finish(h).await, CloseReason::Requested);
    assert_eq!(registry.connection_count(Default::default()), 0);
    assert!(registry.is_banned(&"203.0.113.5".parse().unwrap()));
}

#[tokio::test]
async fn test_registry_shutdown_closes_session() {
    let mut h = harness(ConnectionDirection::Inbound, WAIT);
    handshake(&mut h).await;

    assert_eq!(h.registry.shutdown(), 1);
    let reason = finish(h).await;
    assert!(matches!(reason, CloseReason::Shutdown | CloseReason::Requested));
}

#[tokio::test]
async fn test_remote_hangup() {
    let h = harness(ConnectionDirection::Inbound, WAIT);
    let Harness {
        registry,
        peer,
        session,
        remote,
    } = h;
    drop(remote);

    let reason = timeout(WAIT, session).await.unwrap().unwrap();
    assert_eq!(reason, CloseReason::RemoteClosed);
    assert!(registry.peer(peer).is_none());
}
