//! # Peer Registry
//!
//! **Subsystem ID:** 3
//!
//! The live peer set. Tracks every connection through
//! `Connecting -> Handshaking -> Active -> Banned -> Disconnected`, scores
//! misbehavior and bans offenders, and keeps the operator's added-node
//! list on disk.
//!
//! ## Architecture
//!
//! - **Domain Layer:** `PeerRecord`, `PeerState`, `Violation`, `BanList`,
//!   `AddedNodeList`, `RegistryConfig`
//! - **Ports Layer:** `Connector`, `Resolver`, `AddedNodeStore`
//! - **Service Layer:** `PeerRegistry`, `RegistryEvent`
//! - **Adapters Layer:** `JsonFileStore`, `MemoryStore`, `DnsResolver`,
//!   `StaticResolver`
//!
//! ## Example
//!
//! ```rust
//! # use std::net::SocketAddr;
//! # use std::sync::Arc;
//! # use era_03_peer_registry::*;
//! # use shared_types::FixedTimeSource;
//! # struct Refuse;
//! # #[async_trait::async_trait]
//! # impl Connector for Refuse {
//! #     async fn connect(&self, _: Arc<PeerRegistry>, _: PeerId, t: SocketAddr) -> Result<(), DialError> {
//! #         Err(DialError::Refused(t))
//! #     }
//! # }
//! let registry = PeerRegistry::new(
//!     RegistryConfig::default(),
//!     13546,
//!     RegistryPorts {
//!         connector: Arc::new(Refuse),
//!         resolver: Arc::new(StaticResolver::new()),
//!         store: None,
//!         time_source: Arc::new(FixedTimeSource::new(1_000)),
//!     },
//! )
//! .unwrap();
//!
//! let addr: SocketAddr = "10.0.0.9:13546".parse().unwrap();
//! let id = registry.register_connection(addr, ConnectionDirection::Inbound).unwrap();
//! let outcome = registry.misbehaving(id, Violation::InvalidBlock);
//!
//! assert!(matches!(outcome, MisbehaviorOutcome::Banned { score: 100, .. }));
//! assert!(registry.should_disconnect(id));
//! assert!(registry.is_banned(&addr.ip()));
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::{DnsResolver, JsonFileStore, MemoryStore, StaticResolver};
pub use domain::*;
pub use ports::{AddedNodeStore, Connector, DialError, ResolveError, Resolver, StoreError};
pub use service::{PeerRegistry, RegistryEvent, RegistryPorts};
