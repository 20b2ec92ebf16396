//! # Container
//!
//! Configuration loading and the component container.

pub mod config;
pub mod subsystems;

pub use config::{ConfigError, NetworkConfig, NodeConfig, PeersConfig, StorageConfig};
pub use subsystems::{ContainerPorts, NodeContainer};
