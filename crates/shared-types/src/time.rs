//! # Time
//!
//! Unix-seconds timestamps and the `TimeSource` port. Everything that stamps
//! a record (seed freshness, peer connect/send/recv times, bans) reads the
//! clock through `TimeSource` so tests can pin it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// One week in seconds.
pub const ONE_WEEK_SECS: u64 = 7 * 24 * 60 * 60;

/// Unix timestamp in seconds.
///
/// Clamped to a sane upper bound so arithmetic on peer-supplied values
/// cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Maximum reasonable timestamp (year 9999).
    pub const MAX_REASONABLE: u64 = 253_402_300_799;

    /// Create a new timestamp, clamping to `MAX_REASONABLE`.
    pub fn new(secs: u64) -> Self {
        Self(secs.min(Self::MAX_REASONABLE))
    }

    #[inline]
    pub fn try_new(secs: u64) -> Option<Self> {
        (secs <= Self::MAX_REASONABLE).then_some(Self(secs))
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Add seconds (saturating at `MAX_REASONABLE`).
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs).min(Self::MAX_REASONABLE))
    }

    /// Subtract seconds (saturating at 0).
    pub fn sub_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    /// Signed difference `self - other` in seconds.
    pub fn diff_secs(&self, other: Timestamp) -> i64 {
        self.0 as i64 - other.0 as i64
    }
}

/// Abstract clock.
pub trait TimeSource: Send + Sync {
    /// Current time in whole seconds.
    fn now(&self) -> Timestamp;

    /// Current time in milliseconds. Defaults to second resolution.
    fn now_millis(&self) -> u64 {
        self.now().as_secs().saturating_mul(1000)
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Timestamp::new(secs)
    }

    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A time source pinned to a given value, advanced manually by tests.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    secs: AtomicU64,
}

impl FixedTimeSource {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}
