//! Connection lifecycle, traffic accounting, pings and outbound dials.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::{
    ConnectionDirection, ConnectionFilter, NetTotals, PeerId, PeerRecord, PeerState, PeerStats,
    RegistryError, RegistryResult, VersionInfo,
};
use crate::ports::DialError;
use crate::service::{PeerRegistry, RegistryEvent};

impl PeerRegistry {
    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Admit a new connection in `Connecting` state.
    ///
    /// Refuses banned addresses and any registration after `shutdown()`.
    pub fn register_connection(
        &self,
        addr: SocketAddr,
        direction: ConnectionDirection,
    ) -> RegistryResult<PeerId> {
        self.register(addr, direction, false)
    }

    /// `register_connection`, also refusing an address that already has a
    /// live record. The check and the insert share one critical section.
    fn register(
        &self,
        addr: SocketAddr,
        direction: ConnectionDirection,
        unique: bool,
    ) -> RegistryResult<PeerId> {
        let now = self.now();
        let (id, count) = {
            let mut state = self.state.lock();
            if state.shutting_down {
                return Err(RegistryError::ShuttingDown);
            }
            if state.bans.is_banned(&addr.ip(), now) {
                return Err(RegistryError::Banned(addr.ip()));
            }
            if unique && state.peers.values().any(|r| r.addr == addr) {
                return Err(RegistryError::AlreadyConnected(addr));
            }
            state.next_id += 1;
            let id = PeerId(state.next_id);
            state
                .peers
                .insert(id, PeerRecord::new(id, addr, direction, now));
            (id, state.peers.len())
        };

        debug!(peer_id = %id, %addr, ?direction, "Peer registered");
        self.emit(RegistryEvent::ConnectionCountChanged { count });
        Ok(id)
    }

    /// `Connecting -> Handshaking`, once the socket is up.
    pub fn begin_handshake(&self, id: PeerId) -> RegistryResult<()> {
        self.state.lock().transition(id, PeerState::Handshaking)?;
        Ok(())
    }

    /// `Handshaking -> Active`, recording the peer's `version` fields.
    pub fn complete_handshake(&self, id: PeerId, version: VersionInfo) -> RegistryResult<()> {
        let now = self.now();
        let mut state = self.state.lock();
        let record = state.transition(id, PeerState::Active)?;
        record.time_offset = version.timestamp - now.as_secs() as i64;
        debug!(
            peer_id = %id,
            version = version.version,
            subver = %version.subversion,
            starting_height = version.starting_height,
            "Handshake complete"
        );
        record.version = Some(version);
        Ok(())
    }

    /// Finalize a record. Returns `false` if it was already finalized.
    pub fn disconnect(&self, id: PeerId) -> bool {
        let (removed, count) = {
            let mut state = self.state.lock();
            let removed = state.peers.remove(&id);
            (removed, state.peers.len())
        };

        match removed {
            Some(mut record) => {
                record.state = PeerState::Disconnected;
                debug!(
                    peer_id = %id,
                    addr = %record.addr,
                    bytes_sent = record.bytes_sent,
                    bytes_recv = record.bytes_recv,
                    "Peer disconnected"
                );
                self.emit(RegistryEvent::ConnectionCountChanged { count });
                true
            }
            None => false,
        }
    }

    /// True when the session for `id` must drop its socket: the peer was
    /// banned, the registry is shutting down, or the record is gone.
    pub fn should_disconnect(&self, id: PeerId) -> bool {
        let state = self.state.lock();
        state.shutting_down
            || state
                .peers
                .get(&id)
                .map_or(true, |record| record.disconnect_requested)
    }

    /// Finalize every live record once and cancel in-flight dials.
    ///
    /// Returns the number of records finalized.
    pub fn shutdown(&self) -> usize {
        self.shutdown.send_replace(true);

        let drained: Vec<PeerRecord> = {
            let mut state = self.state.lock();
            state.shutting_down = true;
            state.peers.drain().map(|(_, record)| record).collect()
        };

        info!(peers = drained.len(), "Peer registry shut down");
        if !drained.is_empty() {
            self.emit(RegistryEvent::ConnectionCountChanged { count: 0 });
        }
        drained.len()
    }

    // =========================================================================
    // TRAFFIC
    // =========================================================================

    /// Account bytes written to `id`. Process totals are updated even if the
    /// record is already gone.
    pub fn record_send(&self, id: PeerId, bytes: u64) {
        self.record_traffic(id, bytes, 0);
    }

    pub fn record_recv(&self, id: PeerId, bytes: u64) {
        self.record_traffic(id, 0, bytes);
    }

    pub fn record_traffic(&self, id: PeerId, sent: u64, recv: u64) {
        let now = self.now();
        let mut state = self.state.lock();
        state.total_bytes_sent = state.total_bytes_sent.saturating_add(sent);
        state.total_bytes_recv = state.total_bytes_recv.saturating_add(recv);
        if let Some(record) = state.peers.get_mut(&id) {
            if sent > 0 {
                record.bytes_sent = record.bytes_sent.saturating_add(sent);
                record.last_send = Some(now);
            }
            if recv > 0 {
                record.bytes_recv = record.bytes_recv.saturating_add(recv);
                record.last_recv = Some(now);
            }
        }
    }

    /// Cumulative bytes over the process lifetime, disconnected peers included.
    pub fn net_totals(&self) -> NetTotals {
        let time_millis = self.now_millis();
        let state = self.state.lock();
        NetTotals {
            total_bytes_recv: state.total_bytes_recv,
            total_bytes_sent: state.total_bytes_sent,
            time_millis,
        }
    }

    // =========================================================================
    // PING
    // =========================================================================

    /// Flag every active peer for a ping. Returns how many were flagged.
    pub fn queue_ping_all(&self) -> usize {
        let mut state = self.state.lock();
        let mut queued = 0;
        for record in state.peers.values_mut() {
            if record.state == PeerState::Active {
                record.ping.queued = true;
                queued += 1;
            }
        }
        queued
    }

    /// Consume the ping flag for `id`. When set, the ping clock starts for
    /// `nonce` and the caller must send the ping.
    pub fn take_ping_request(&self, id: PeerId, nonce: u64) -> bool {
        let now_ms = self.now_millis();
        let mut state = self.state.lock();
        match state.peers.get_mut(&id) {
            Some(record) if record.ping.queued => {
                record.ping.queued = false;
                record.ping.in_flight = Some((nonce, now_ms));
                true
            }
            _ => false,
        }
    }

    /// Match a `pong` against the outstanding nonce and record the round
    /// trip. Returns `false` for an unknown peer or a nonce mismatch.
    pub fn record_pong(&self, id: PeerId, nonce: u64) -> bool {
        let now_ms = self.now_millis();
        let mut state = self.state.lock();
        let Some(record) = state.peers.get_mut(&id) else {
            return false;
        };
        match record.ping.in_flight {
            Some((expected, started)) if expected == nonce => {
                let rtt = now_ms.saturating_sub(started);
                record.ping.in_flight = None;
                record.ping.last_rtt_ms = Some(rtt);
                record.ping.min_rtt_ms = Some(record.ping.min_rtt_ms.map_or(rtt, |m| m.min(rtt)));
                true
            }
            _ => false,
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn connection_count(&self, filter: ConnectionFilter) -> usize {
        let state = self.state.lock();
        state
            .peers
            .values()
            .filter(|r| filter.matches(r.direction))
            .count()
    }

    /// Non-blocking `connection_count`; `None` when the lock is contended.
    pub fn try_connection_count(&self, filter: ConnectionFilter) -> Option<usize> {
        let state = self.state.try_lock()?;
        Some(
            state
                .peers
                .values()
                .filter(|r| filter.matches(r.direction))
                .count(),
        )
    }

    /// Non-blocking connection count and byte totals from one lock
    /// acquisition; `None` when the lock is contended.
    pub fn try_net_status(&self) -> Option<(usize, NetTotals)> {
        let time_millis = self.now_millis();
        let state = self.state.try_lock()?;
        let totals = NetTotals {
            total_bytes_recv: state.total_bytes_recv,
            total_bytes_sent: state.total_bytes_sent,
            time_millis,
        };
        Some((state.peers.len(), totals))
    }

    /// Per-peer stats, ordered by id.
    pub fn snapshot(&self) -> Vec<PeerStats> {
        let now_ms = self.now_millis();
        let state = self.state.lock();
        Self::collect_stats(&state.peers, now_ms)
    }

    /// Non-blocking `snapshot`; `None` when the lock is contended.
    pub fn try_snapshot(&self) -> Option<Vec<PeerStats>> {
        let now_ms = self.now_millis();
        let state = self.state.try_lock()?;
        Some(Self::collect_stats(&state.peers, now_ms))
    }

    pub fn peer(&self, id: PeerId) -> Option<PeerStats> {
        let now_ms = self.now_millis();
        self.state.lock().peers.get(&id).map(|r| r.stats(now_ms))
    }

    fn collect_stats(
        peers: &HashMap<PeerId, PeerRecord>,
        now_ms: u64,
    ) -> Vec<PeerStats> {
        let mut stats: Vec<PeerStats> = peers.values().map(|r| r.stats(now_ms)).collect();
        stats.sort_by_key(|s| s.id);
        stats
    }

    pub(crate) fn direction_of(&self, addr: &SocketAddr) -> Option<ConnectionDirection> {
        self.state
            .lock()
            .peers
            .values()
            .find(|r| r.addr == *addr)
            .map(|r| r.direction)
    }

    // =========================================================================
    // OUTBOUND DIALS
    // =========================================================================

    /// Dial `target` through the `Connector`.
    ///
    /// The record is registered before the connect attempt so it is counted
    /// and visible; a failed, timed-out or cancelled attempt finalizes it.
    pub async fn dial(self: &Arc<Self>, target: SocketAddr) -> Result<PeerId, DialError> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return Err(DialError::Cancelled);
        }
        let id = self
            .register(target, ConnectionDirection::Outbound, true)
            .map_err(|e| match e {
                RegistryError::Banned(_) => DialError::Banned(target),
                RegistryError::AlreadyConnected(_) => DialError::AlreadyConnected(target),
                RegistryError::ShuttingDown => DialError::Cancelled,
                other => DialError::Io(other.to_string()),
            })?;

        let attempt = self.connector.connect(Arc::clone(self), id, target);
        let result = tokio::select! {
            outcome = tokio::time::timeout(self.config.connect_timeout(), attempt) => {
                outcome.unwrap_or(Err(DialError::Timeout(target)))
            }
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => Err(DialError::Cancelled),
        };

        match result {
            Ok(()) => {
                debug!(peer_id = %id, %target, "Outbound connection established");
                Ok(id)
            }
            Err(e) => {
                self.disconnect(id);
                debug!(peer_id = %id, %target, error = %e, "Dial failed");
                Err(e)
            }
        }
    }

    /// Resolve `host` and dial its addresses in order until one connects.
    pub async fn dial_host(self: &Arc<Self>, host: &str) -> Result<PeerId, DialError> {
        let addrs = self
            .resolver
            .resolve(host, self.default_port)
            .await
            .map_err(|_| DialError::Unresolvable(host.to_string()))?;

        let mut last_error = DialError::Unresolvable(host.to_string());
        for addr in addrs {
            match self.dial(addr).await {
                Ok(id) => return Ok(id),
                Err(DialError::Cancelled) => return Err(DialError::Cancelled),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }
}
