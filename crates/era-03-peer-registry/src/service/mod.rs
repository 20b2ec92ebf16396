//! # Peer Registry Service
//!
//! `PeerRegistry` owns every live `PeerRecord`, the ban list and the
//! added-node list behind one `parking_lot::Mutex`. The lock is never held
//! across I/O: resolution, dials and added-node persistence all run after
//! the guard is dropped.
//!
//! Outbound dials take `self: &Arc<Self>` so the connector can hand the
//! registry to the session it spawns.

mod added;
mod bans;
mod connections;
mod core;
mod events;

pub use self::core::{PeerRegistry, RegistryPorts};
pub use events::RegistryEvent;
