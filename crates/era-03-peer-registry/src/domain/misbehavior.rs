//! # Misbehavior Scoring
//!
//! Each protocol violation adds a fixed weight to the peer's score. At the
//! ban threshold the peer is evicted and its IP refused for the ban
//! duration, whichever direction the connection had.
//!
//! ## Weights
//!
//! | Violation | Weight |
//! |---|---|
//! | hardened checkpoint mismatch, sync checkpoint violation, invalid block | 100 |
//! | oversized message | 20 |
//! | wrong network magic, bad checksum | 10 |
//! | duplicate version, unexpected message | 1 |

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use shared_types::Timestamp;

/// Default score at which a peer is banned.
pub const DEFAULT_BAN_THRESHOLD: u32 = 100;

/// Default ban length: 24 hours.
pub const DEFAULT_BAN_DURATION_SECS: u64 = 24 * 60 * 60;

/// Protocol violations a session or validator can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    HardenedCheckpointMismatch,
    SyncCheckpointViolation,
    InvalidBlock,
    WrongNetworkMagic,
    BadChecksum,
    OversizedMessage,
    DuplicateVersion,
    UnexpectedMessage,
    Custom(u32),
}

impl Violation {
    pub fn weight(&self) -> u32 {
        match self {
            Violation::HardenedCheckpointMismatch
            | Violation::SyncCheckpointViolation
            | Violation::InvalidBlock => 100,
            Violation::OversizedMessage => 20,
            Violation::WrongNetworkMagic | Violation::BadChecksum => 10,
            Violation::DuplicateVersion | Violation::UnexpectedMessage => 1,
            Violation::Custom(weight) => *weight,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::HardenedCheckpointMismatch => write!(f, "hardened checkpoint mismatch"),
            Violation::SyncCheckpointViolation => write!(f, "sync checkpoint violation"),
            Violation::InvalidBlock => write!(f, "invalid block"),
            Violation::WrongNetworkMagic => write!(f, "wrong network magic"),
            Violation::BadChecksum => write!(f, "bad checksum"),
            Violation::OversizedMessage => write!(f, "oversized message"),
            Violation::DuplicateVersion => write!(f, "duplicate version"),
            Violation::UnexpectedMessage => write!(f, "unexpected message"),
            Violation::Custom(w) => write!(f, "custom violation ({w})"),
        }
    }
}

/// Result of reporting a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MisbehaviorOutcome {
    /// Score increased, peer kept.
    Penalized { score: u32 },
    /// Threshold reached: peer banned and flagged for disconnect.
    Banned { score: u32, until: Timestamp },
    /// No live record for that id.
    UnknownPeer,
}

// =============================================================================
// BAN LIST
// =============================================================================

/// IP ban list with expiry. Expired entries are swept lazily.
#[derive(Debug, Default)]
pub struct BanList {
    entries: HashMap<IpAddr, Timestamp>,
}

impl BanList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ban until `until`. An existing longer ban is kept.
    pub fn ban(&mut self, ip: IpAddr, until: Timestamp) {
        let entry = self.entries.entry(ip).or_insert(until);
        if until > *entry {
            *entry = until;
        }
    }

    pub fn unban(&mut self, ip: &IpAddr) -> bool {
        self.entries.remove(ip).is_some()
    }

    /// True while `now` is before the ban expiry. Expired entries are dropped.
    pub fn is_banned(&mut self, ip: &IpAddr, now: Timestamp) -> bool {
        match self.entries.get(ip) {
            Some(until) if now < *until => true,
            Some(_) => {
                self.entries.remove(ip);
                false
            }
            None => false,
        }
    }

    /// Remove all expired entries; returns how many were removed.
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, until| now < *until);
        before - self.entries.len()
    }

    pub fn banned_until(&self, ip: &IpAddr) -> Option<Timestamp> {
        self.entries.get(ip).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
