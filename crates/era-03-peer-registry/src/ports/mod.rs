//! Ports layer: what the registry needs from its host.

pub mod outbound;

pub use outbound::*;
