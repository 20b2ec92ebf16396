//! # Peer Records
//!
//! One `PeerRecord` per live connection. Records are only touched through
//! the registry, under its lock; callers receive `PeerStats` copies.

use std::fmt;
use std::net::SocketAddr;

use serde::Serialize;
use shared_types::Timestamp;

/// Registry-assigned connection id, monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionDirection {
    /// We dialed the peer
    Outbound,
    /// The peer dialed us
    Inbound,
}

/// Which connections a count should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionFilter {
    #[default]
    All,
    InboundOnly,
    OutboundOnly,
}

impl ConnectionFilter {
    pub fn matches(&self, direction: ConnectionDirection) -> bool {
        match self {
            ConnectionFilter::All => true,
            ConnectionFilter::InboundOnly => direction == ConnectionDirection::Inbound,
            ConnectionFilter::OutboundOnly => direction == ConnectionDirection::Outbound,
        }
    }
}

/// Per-connection lifecycle.
///
/// ```text
/// Connecting -> Handshaking -> Active -> Banned -> Disconnected
/// ```
///
/// Any live state may move straight to `Disconnected`, and a peer can be
/// banned before its handshake completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerState {
    Connecting,
    Handshaking,
    Active,
    Banned,
    Disconnected,
}

impl PeerState {
    pub fn can_transition_to(&self, next: PeerState) -> bool {
        use PeerState::*;
        matches!(
            (self, next),
            (Connecting, Handshaking)
                | (Handshaking, Active)
                | (Connecting | Handshaking | Active, Banned)
                | (Connecting | Handshaking | Active | Banned, Disconnected)
        )
    }

    pub fn is_live(&self) -> bool {
        *self != PeerState::Disconnected
    }
}

/// Fields announced by the peer in its `version` message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionInfo {
    pub version: i32,
    pub services: u64,
    pub subversion: String,
    pub starting_height: i32,
    /// Peer's clock at the time it sent `version` (unix seconds).
    pub timestamp: i64,
}

/// Ping bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PingState {
    /// Send a ping on the next message-processing turn.
    pub queued: bool,
    /// Outstanding nonce and when it was sent (ms).
    pub in_flight: Option<(u64, u64)>,
    /// Most recent round trip (ms).
    pub last_rtt_ms: Option<u64>,
    pub min_rtt_ms: Option<u64>,
}

/// Live connection state.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub id: PeerId,
    pub addr: SocketAddr,
    pub direction: ConnectionDirection,
    pub state: PeerState,
    pub version: Option<VersionInfo>,
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub connected_at: Timestamp,
    pub last_send: Option<Timestamp>,
    pub last_recv: Option<Timestamp>,
    /// Peer clock minus local clock, seconds.
    pub time_offset: i64,
    pub ping: PingState,
    pub misbehavior: u32,
    /// Set when the session must drop the socket (ban, shutdown).
    pub disconnect_requested: bool,
}

impl PeerRecord {
    pub fn new(id: PeerId, addr: SocketAddr, direction: ConnectionDirection, now: Timestamp) -> Self {
        Self {
            id,
            addr,
            direction,
            state: PeerState::Connecting,
            version: None,
            bytes_sent: 0,
            bytes_recv: 0,
            connected_at: now,
            last_send: None,
            last_recv: None,
            time_offset: 0,
            ping: PingState::default(),
            misbehavior: 0,
            disconnect_requested: false,
        }
    }

    pub fn is_inbound(&self) -> bool {
        self.direction == ConnectionDirection::Inbound
    }

    /// Copy out the externally visible fields.
    pub fn stats(&self, now_ms: u64) -> PeerStats {
        let version = self.version.clone().unwrap_or_default();
        PeerStats {
            id: self.id,
            addr: self.addr.to_string(),
            services: format!("{:08x}", version.services),
            lastsend: self.last_send.map_or(0, |t| t.as_secs()),
            lastrecv: self.last_recv.map_or(0, |t| t.as_secs()),
            bytessent: self.bytes_sent,
            bytesrecv: self.bytes_recv,
            conntime: self.connected_at.as_secs(),
            timeoffset: self.time_offset,
            pingtime: self.ping.last_rtt_ms.map(|ms| ms as f64 / 1000.0),
            minping: self.ping.min_rtt_ms.map(|ms| ms as f64 / 1000.0),
            pingwait: self
                .ping
                .in_flight
                .map(|(_, started)| now_ms.saturating_sub(started) as f64 / 1000.0),
            version: version.version,
            subver: version.subversion,
            inbound: self.is_inbound(),
            startingheight: version.starting_height,
            banscore: self.misbehavior,
            state: self.state,
        }
    }
}

/// Per-peer snapshot returned to RPC and UI callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerStats {
    pub id: PeerId,
    pub addr: String,
    pub services: String,
    pub lastsend: u64,
    pub lastrecv: u64,
    pub bytessent: u64,
    pub bytesrecv: u64,
    pub conntime: u64,
    pub timeoffset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pingtime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minping: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pingwait: Option<f64>,
    pub version: i32,
    pub subver: String,
    pub inbound: bool,
    pub startingheight: i32,
    pub banscore: u32,
    pub state: PeerState,
}

/// Process-lifetime byte totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetTotals {
    #[serde(rename = "totalbytesrecv")]
    pub total_bytes_recv: u64,
    #[serde(rename = "totalbytessent")]
    pub total_bytes_sent: u64,
    #[serde(rename = "timemillis")]
    pub time_millis: u64,
}
