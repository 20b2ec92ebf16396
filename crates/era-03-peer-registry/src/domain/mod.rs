//! Domain layer: peer records, misbehavior scoring, added nodes.

pub mod added_nodes;
pub mod config;
pub mod errors;
pub mod misbehavior;
pub mod peer;

pub use added_nodes::*;
pub use config::*;
pub use errors::*;
pub use misbehavior::*;
pub use peer::*;
