//! # Shared Types Crate
//!
//! Primitive types used by every era subsystem.
//!
//! - [`Hash256`]: 256-bit digest stored in wire order, displayed byte-reversed.
//! - [`Timestamp`] and the [`TimeSource`] port, with a wall clock and a
//!   fixed clock for deterministic tests.

pub mod hash;
pub mod time;

pub use hash::{sha256d, Hash256, HexError};
pub use time::{FixedTimeSource, SystemTimeSource, TimeSource, Timestamp, ONE_WEEK_SECS};
