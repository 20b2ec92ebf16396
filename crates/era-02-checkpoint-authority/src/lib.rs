//! # Checkpoint Authority
//!
//! **Subsystem ID:** 2
//!
//! Hardened, release-bundled checkpoints and the runtime synchronization
//! checkpoint. Every check is a pure predicate; a `false` (or an `Err` from
//! `verify_block`) means the block is invalid, not that it should be
//! retried later.
//!
//! ## Architecture
//!
//! - **Domain Layer:** `CheckpointTable`, `BlockRef`, `CheckpointError`
//! - **Ports Layer:** `BlockIndex`, read access to the block-index store
//! - **Service Layer:** `CheckpointAuthority`
//! - **Adapters Layer:** `InMemoryBlockIndex`
//!
//! ## Example
//!
//! ```rust
//! use era_01_network_profile::{Network, NetworkProfile};
//! use era_02_checkpoint_authority::{CheckpointAuthority, InMemoryBlockIndex};
//!
//! let profile = NetworkProfile::for_network(Network::Main, None).unwrap();
//! let authority = CheckpointAuthority::from_profile(&profile).unwrap();
//! let index = InMemoryBlockIndex::with_genesis(profile.genesis_hash);
//!
//! assert!(authority.check_hardened(0, &profile.genesis_hash));
//! assert_eq!(authority.auto_select_sync_checkpoint(&index).height, 0);
//! assert!(!authority.check_sync(0));
//! ```

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::InMemoryBlockIndex;
pub use domain::*;
pub use ports::BlockIndex;
pub use service::{CheckpointAuthority, CHECKPOINT_SPAN};
