//! Registry configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::misbehavior::{DEFAULT_BAN_DURATION_SECS, DEFAULT_BAN_THRESHOLD};

/// Tunables for `PeerRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Misbehavior score at which a peer is banned.
    pub ban_threshold: u32,
    /// How long a ban lasts, in seconds.
    pub ban_duration_secs: u64,
    /// Upper bound on a single outbound dial, in seconds.
    pub connect_timeout_secs: u64,
    /// Capacity of the registry event channel.
    pub event_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ban_threshold: DEFAULT_BAN_THRESHOLD,
            ban_duration_secs: DEFAULT_BAN_DURATION_SECS,
            connect_timeout_secs: 5,
            event_capacity: 256,
        }
    }
}

impl RegistryConfig {
    /// Short timeouts for tests.
    pub fn for_testing() -> Self {
        Self {
            ban_threshold: DEFAULT_BAN_THRESHOLD,
            ban_duration_secs: 60,
            connect_timeout_secs: 1,
            event_capacity: 64,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
