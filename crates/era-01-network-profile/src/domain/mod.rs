//! Domain Layer - Pure chain-parameter logic with no I/O
//!
//! - Network selector and per-network profile records
//! - Genesis block construction (coinbase, merkle root, compact target)
//! - Fixed and DNS seeds
//! - Protocol upgrade activation heights

pub mod errors;
pub mod genesis;
pub mod network;
pub mod prefixes;
pub mod profile;
pub mod seeds;
pub mod upgrades;

pub use errors::*;
pub use genesis::*;
pub use network::*;
pub use prefixes::*;
pub use profile::*;
pub use seeds::*;
pub use upgrades::*;
