//! # Network Profile & Protocol Upgrade Gate
//!
//! **Subsystem ID:** 1
//!
//! Describes which network this node belongs to and which rule set applies
//! at a given height.
//!
//! ## Architecture
//!
//! - **Domain Layer:** profile records, genesis construction, seeds, upgrades
//! - **Ports Layer:** `BlockHasher`, the chain's identity hash
//! - **Service Layer:** `ProfileSelector`, one-shot activation
//!
//! ## Example
//!
//! ```rust
//! use era_01_network_profile::{Network, ProfileSelector, Upgrade};
//!
//! let selector = ProfileSelector::new();
//! let profile = selector.select(Network::Main).unwrap();
//!
//! assert_eq!(profile.default_port(), 13546);
//! assert!(profile.upgrades.is_active(Upgrade::Halving, 472_178));
//! assert!(selector.select(Network::Testnet).is_err());
//! ```

pub mod domain;
pub mod ports;
pub mod service;

pub use domain::*;
pub use ports::{BlockHasher, HeaderDigestHasher};
pub use service::ProfileSelector;
