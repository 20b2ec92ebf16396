//! # Wiring
//!
//! Long-running loops that connect the registry to the network.

pub mod connman;

pub use connman::ConnectionManager;
