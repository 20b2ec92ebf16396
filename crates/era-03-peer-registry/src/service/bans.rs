//! Misbehavior scoring and the ban list.

use std::net::IpAddr;
use std::time::Duration;

use shared_types::Timestamp;
use tracing::{debug, info, warn};

use crate::domain::{MisbehaviorOutcome, PeerId, PeerState, Violation};
use crate::service::{PeerRegistry, RegistryEvent};

impl PeerRegistry {
    /// Add the violation's weight to the peer's score.
    ///
    /// At the ban threshold the peer moves to `Banned`, its IP is banned for
    /// the configured duration and the session is told to disconnect,
    /// inbound or outbound alike.
    pub fn misbehaving(&self, id: PeerId, violation: Violation) -> MisbehaviorOutcome {
        let now = self.now();
        let until = now.add_secs(self.config.ban_duration_secs);

        let (outcome, banned_ip) = {
            let mut state = self.state.lock();
            let Some(record) = state.peers.get_mut(&id) else {
                return MisbehaviorOutcome::UnknownPeer;
            };

            record.misbehavior = record.misbehavior.saturating_add(violation.weight());
            let score = record.misbehavior;
            let ip = record.addr.ip();

            if score < self.config.ban_threshold {
                debug!(peer_id = %id, %violation, score, "Peer misbehaving");
                return MisbehaviorOutcome::Penalized { score };
            }

            if record.state == PeerState::Banned {
                let until = state.bans.banned_until(&ip).unwrap_or(until);
                return MisbehaviorOutcome::Banned { score, until };
            }

            record.state = PeerState::Banned;
            record.disconnect_requested = true;
            state.bans.ban(ip, until);
            (MisbehaviorOutcome::Banned { score, until }, ip)
        };

        warn!(
            peer_id = %id,
            ip = %banned_ip,
            %violation,
            until = until.as_secs(),
            "Peer banned for misbehavior"
        );
        self.emit(RegistryEvent::PeerBanned {
            peer: Some(id),
            ip: banned_ip,
            until,
        });
        outcome
    }

    /// Ban `ip` for `duration` and flag its live connections for disconnect.
    pub fn ban_address(&self, ip: IpAddr, duration: Duration) -> Timestamp {
        let until = self.now().add_secs(duration.as_secs());
        let flagged = {
            let mut state = self.state.lock();
            state.bans.ban(ip, until);
            let mut flagged = 0;
            for record in state.peers.values_mut().filter(|r| r.addr.ip() == ip) {
                if record.state.can_transition_to(PeerState::Banned) {
                    record.state = PeerState::Banned;
                }
                record.disconnect_requested = true;
                flagged += 1;
            }
            flagged
        };

        warn!(%ip, until = until.as_secs(), flagged, "Address banned");
        self.emit(RegistryEvent::PeerBanned {
            peer: None,
            ip,
            until,
        });
        until
    }

    pub fn unban_address(&self, ip: &IpAddr) -> bool {
        let removed = self.state.lock().bans.unban(ip);
        if removed {
            info!(%ip, "Address unbanned");
        }
        removed
    }

    /// True while a ban on `ip` is in force. Expired bans are dropped here.
    pub fn is_banned(&self, ip: &IpAddr) -> bool {
        let now = self.now();
        self.state.lock().bans.is_banned(ip, now)
    }

    /// Drop every expired ban. Returns how many were removed.
    pub fn sweep_bans(&self) -> usize {
        let now = self.now();
        self.state.lock().bans.sweep(now)
    }

    pub fn banned_count(&self) -> usize {
        self.state.lock().bans.len()
    }
}
