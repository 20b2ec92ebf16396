//! # Peer Session
//!
//! One task per connection. A reader task decodes frames into a channel so
//! the main loop can select over frames, the housekeeping tick and shutdown
//! without cancelling a half-read frame.
//!
//! The session owns the wire; the registry owns the record. Every byte in
//! either direction is accounted through the registry, and the record is
//! finalized when the session ends, however it ends.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use era_01_network_profile::{NetworkProfile, NODE_NETWORK};
use era_02_checkpoint_authority::BlockIndex;
use era_03_peer_registry::{ConnectionDirection, MisbehaviorOutcome, PeerId, PeerRegistry, Violation};
use era_telemetry::log_peer_event;
use tokio::io::{AsyncRead, AsyncWrite, WriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::wire::{
    decode_nonce, encode_nonce, read_frame, write_frame, Frame, NetAddress, VersionMessage, WireError,
    PROTOCOL_VERSION, USER_AGENT,
};

/// Oldest protocol version a peer may speak.
pub const MIN_PEER_PROTO_VERSION: i32 = 209;

/// Shared, read-only inputs every session needs.
pub struct SessionContext {
    pub profile: Arc<NetworkProfile>,
    pub block_index: Arc<dyn BlockIndex>,
    /// Sent in our `version`; echoed back only when we dialed ourselves.
    pub local_nonce: u64,
    pub handshake_timeout: Duration,
    /// Housekeeping period: disconnect flags and queued pings.
    pub tick: Duration,
}

impl SessionContext {
    pub fn new(profile: Arc<NetworkProfile>, block_index: Arc<dyn BlockIndex>) -> Self {
        Self {
            profile,
            block_index,
            local_nonce: rand::random(),
            handshake_timeout: Duration::from_secs(60),
            tick: Duration::from_secs(1),
        }
    }

    fn start_height(&self) -> i32 {
        self.block_index
            .best_tip()
            .map_or(0, |tip| i32::try_from(tip.height).unwrap_or(i32::MAX))
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("network", &self.profile.network)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("tick", &self.tick)
            .finish_non_exhaustive()
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    RemoteClosed,
    /// The registry flagged the record (ban, operator action) or dropped it.
    Requested,
    Shutdown,
    Banned,
    HandshakeTimeout,
    SelfConnection,
    ObsoleteVersion(i32),
    Protocol(String),
    Io(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteClosed => f.write_str("remote closed"),
            Self::Requested => f.write_str("disconnect requested"),
            Self::Shutdown => f.write_str("shutdown"),
            Self::Banned => f.write_str("banned"),
            Self::HandshakeTimeout => f.write_str("handshake timed out"),
            Self::SelfConnection => f.write_str("connected to self"),
            Self::ObsoleteVersion(v) => write!(f, "obsolete protocol version {v}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Io(msg) => write!(f, "i/o error: {msg}"),
        }
    }
}

/// Drive `stream` for `peer` until it closes, then finalize the record.
pub async fn run_session<S>(
    ctx: Arc<SessionContext>,
    registry: Arc<PeerRegistry>,
    peer: PeerId,
    direction: ConnectionDirection,
    stream: S,
) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = tokio::io::split(stream);
    let (frames_tx, frames_rx) = mpsc::channel(32);
    let reader_task = tokio::spawn(read_loop(reader, Arc::clone(&ctx.profile), frames_tx));

    let mut session = PeerSession {
        ctx,
        registry: Arc::clone(&registry),
        peer,
        direction,
        writer,
        got_version: false,
        got_verack: false,
    };
    let reason = session.run(frames_rx).await;
    reader_task.abort();

    registry.disconnect(peer);
    debug!(peer_id = %peer, ?direction, %reason, "Session closed");
    reason
}

/// Spawn `run_session` on the current runtime.
pub fn spawn_session<S>(
    ctx: Arc<SessionContext>,
    registry: Arc<PeerRegistry>,
    peer: PeerId,
    direction: ConnectionDirection,
    stream: S,
) -> tokio::task::JoinHandle<CloseReason>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    tokio::spawn(run_session(ctx, registry, peer, direction, stream))
}

async fn read_loop<R>(
    mut reader: R,
    profile: Arc<NetworkProfile>,
    frames: mpsc::Sender<Result<Frame, WireError>>,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let result = read_frame(&mut reader, &profile).await;
        // A checksum failure leaves the stream aligned; anything else ends it.
        let keep_reading = matches!(result, Ok(_) | Err(WireError::BadChecksum { .. }));
        if frames.send(result).await.is_err() || !keep_reading {
            return;
        }
    }
}

struct PeerSession<S> {
    ctx: Arc<SessionContext>,
    registry: Arc<PeerRegistry>,
    peer: PeerId,
    direction: ConnectionDirection,
    writer: WriteHalf<S>,
    got_version: bool,
    got_verack: bool,
}

type Step = Result<Option<CloseReason>, WireError>;

impl<S> PeerSession<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn run(&mut self, mut frames: mpsc::Receiver<Result<Frame, WireError>>) -> CloseReason {
        if let Err(e) = self.registry.begin_handshake(self.peer) {
            return CloseReason::Protocol(e.to_string());
        }
        if self.direction == ConnectionDirection::Outbound {
            if let Err(e) = self.send_version().await {
                return CloseReason::Io(e.to_string());
            }
        }

        let mut shutdown = self.registry.shutdown_signal();
        let mut tick = tokio::time::interval(self.ctx.tick);
        let handshake_deadline = tokio::time::sleep(self.ctx.handshake_timeout);
        tokio::pin!(handshake_deadline);

        loop {
            let step = tokio::select! {
                received = frames.recv() => match received {
                    Some(Ok(frame)) => self.on_frame(frame).await,
                    Some(Err(e)) => Ok(self.on_wire_error(e)),
                    None => Ok(Some(CloseReason::RemoteClosed)),
                },
                _ = tick.tick() => self.on_tick().await,
                _ = &mut handshake_deadline, if !self.handshake_done() => {
                    Ok(Some(CloseReason::HandshakeTimeout))
                }
                _ = shutdown.changed() => Ok(Some(CloseReason::Shutdown)),
            };

            match step {
                Ok(None) => {}
                Ok(Some(reason)) => return reason,
                Err(e) => return CloseReason::Io(e.to_string()),
            }
        }
    }

    fn handshake_done(&self) -> bool {
        self.got_version && self.got_verack
    }

    async fn on_frame(&mut self, frame: Frame) -> Step {
        self.registry.record_recv(self.peer, frame.wire_len());
        trace!(peer_id = %self.peer, command = %frame.command, len = frame.payload.len(), "Frame received");

        match frame.command.as_str() {
            "version" => self.on_version(&frame.payload).await,
            "verack" => {
                self.got_verack = true;
                Ok(None)
            }
            _ if !self.got_version => Ok(self.penalize(Violation::UnexpectedMessage)),
            "ping" => {
                // Pre-BIP31 pings carry no nonce and expect no reply.
                if let Ok(nonce) = decode_nonce(&frame.payload) {
                    self.send(Frame::new("pong", encode_nonce(nonce))).await?;
                }
                Ok(None)
            }
            "pong" => {
                match decode_nonce(&frame.payload) {
                    Ok(nonce) if self.registry.record_pong(self.peer, nonce) => {}
                    _ => trace!(peer_id = %self.peer, "Unsolicited or mismatched pong"),
                }
                Ok(None)
            }
            other => {
                trace!(peer_id = %self.peer, command = other, "Frame handed off");
                Ok(None)
            }
        }
    }

    async fn on_version(&mut self, payload: &[u8]) -> Step {
        if self.got_version {
            return Ok(self.penalize(Violation::DuplicateVersion));
        }
        let version = match VersionMessage::decode(payload) {
            Ok(version) => version,
            Err(e) => {
                self.penalize(Violation::UnexpectedMessage);
                return Ok(Some(CloseReason::Protocol(e.to_string())));
            }
        };
        if version.nonce == self.ctx.local_nonce {
            return Ok(Some(CloseReason::SelfConnection));
        }
        if version.version < MIN_PEER_PROTO_VERSION {
            return Ok(Some(CloseReason::ObsoleteVersion(version.version)));
        }

        if let Err(e) = self
            .registry
            .complete_handshake(self.peer, version.to_version_info())
        {
            return Ok(Some(CloseReason::Protocol(e.to_string())));
        }
        self.got_version = true;

        if self.direction == ConnectionDirection::Inbound {
            self.send_version().await?;
        }
        self.send(Frame::new("verack", Vec::new())).await?;
        Ok(None)
    }

    fn on_wire_error(&mut self, error: WireError) -> Option<CloseReason> {
        debug!(peer_id = %self.peer, %error, "Bad frame");
        match error {
            WireError::BadChecksum { .. } => self.penalize(Violation::BadChecksum),
            WireError::WrongMagic(_) => {
                self.penalize(Violation::WrongNetworkMagic);
                Some(CloseReason::Protocol(error.to_string()))
            }
            WireError::Oversized(_) => {
                self.penalize(Violation::OversizedMessage);
                Some(CloseReason::Protocol(error.to_string()))
            }
            WireError::MalformedCommand => {
                self.penalize(Violation::UnexpectedMessage);
                Some(CloseReason::Protocol(error.to_string()))
            }
            WireError::Io(_) => Some(CloseReason::RemoteClosed),
            other => Some(CloseReason::Protocol(other.to_string())),
        }
    }

    async fn on_tick(&mut self) -> Step {
        if self.registry.should_disconnect(self.peer) {
            return Ok(Some(CloseReason::Requested));
        }
        if self.handshake_done() {
            let nonce = rand::random::<u64>();
            if self.registry.take_ping_request(self.peer, nonce) {
                self.send(Frame::new("ping", encode_nonce(nonce))).await?;
            }
        }
        Ok(None)
    }

    /// Score a violation. Closes the session once the peer is banned.
    fn penalize(&self, violation: Violation) -> Option<CloseReason> {
        match self.registry.misbehaving(self.peer, violation) {
            MisbehaviorOutcome::Banned { .. } => Some(CloseReason::Banned),
            MisbehaviorOutcome::Penalized { score } => {
                log_peer_event!(debug, "Peer penalized", self.peer, %violation, score);
                None
            }
            MisbehaviorOutcome::UnknownPeer => Some(CloseReason::Requested),
        }
    }

    async fn send_version(&mut self) -> Result<(), WireError> {
        let now = self.registry.now().as_secs() as i64;
        let version = VersionMessage {
            version: PROTOCOL_VERSION,
            services: NODE_NETWORK,
            timestamp: now,
            addr_recv: NetAddress::unspecified(),
            addr_from: NetAddress::unspecified(),
            nonce: self.ctx.local_nonce,
            user_agent: USER_AGENT.to_string(),
            start_height: self.ctx.start_height(),
        };
        self.send(Frame::new("version", version.encode())).await
    }

    async fn send(&mut self, frame: Frame) -> Result<(), WireError> {
        match write_frame(&mut self.writer, self.ctx.profile.magic, &frame).await {
            Ok(bytes) => {
                self.registry.record_send(self.peer, bytes);
                Ok(())
            }
            Err(e) => {
                warn!(peer_id = %self.peer, command = %frame.command, error = %e, "Write failed");
                Err(e)
            }
        }
    }
}
