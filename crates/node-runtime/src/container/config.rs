//! # Node Configuration
//!
//! `NodeConfig` is layered: an optional TOML file, then `ERA_*` environment
//! variables, then command-line flags (see `cli`). Every field has a
//! default, so an empty file and no file are equivalent.
//!
//! ```toml
//! [network]
//! testnet = true
//! max_outbound = 8
//!
//! [peers]
//! ban_threshold = 100
//!
//! [storage]
//! data_dir = "/var/lib/era"
//! ```

use std::env;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use era_01_network_profile::Network;
use era_03_peer_registry::RegistryConfig;
use era_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var}={value:?} is not valid")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub peers: PeersConfig,
    pub storage: StorageConfig,
    pub telemetry: TelemetryConfig,
}

/// Network configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Join the test network instead of mainnet.
    pub testnet: bool,
    /// Accept inbound connections.
    pub listen: bool,
    /// Address the inbound listener binds to.
    pub bind: IpAddr,
    /// P2P port; the profile's default when unset.
    pub p2p_port: Option<u16>,
    /// RPC port; the profile's default when unset.
    pub rpc_port: Option<u16>,
    /// Outbound connections the connection manager keeps open.
    pub max_outbound: usize,
    /// Inbound connections accepted before new ones are refused.
    pub max_inbound: usize,
    pub connect_timeout_secs: u64,
    /// Delay between passes over the added-node list.
    pub added_node_retry_secs: u64,
    /// Delay between keep-alive pings.
    pub ping_interval_secs: u64,
    /// Bootstrap from DNS and fixed seeds when short of outbound peers.
    pub dns_seed: bool,
    /// Nodes from `--addnode`, listed for this run and never persisted.
    pub add_nodes: Vec<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            testnet: false,
            listen: true,
            bind: IpAddr::from([0, 0, 0, 0]),
            p2p_port: None,
            rpc_port: None,
            max_outbound: 8,
            max_inbound: 117,
            connect_timeout_secs: 5,
            added_node_retry_secs: 120,
            ping_interval_secs: 120,
            dns_seed: true,
            add_nodes: Vec::new(),
        }
    }
}

/// Misbehavior scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    pub ban_threshold: u32,
    pub ban_duration_secs: u64,
}

impl Default for PeersConfig {
    fn default() -> Self {
        let registry = RegistryConfig::default();
        Self {
            ban_threshold: registry.ban_threshold,
            ban_duration_secs: registry.ban_duration_secs,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base data directory. Testnet state lives in a subdirectory.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl NodeConfig {
    /// Read `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&contents)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Apply `ERA_P2P_PORT`, `ERA_RPC_PORT`, `ERA_TESTNET` and the telemetry
    /// variables from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        let mut config = self.apply_env(|var| env::var(var).ok())?;
        config.telemetry = config.telemetry.with_env_overrides();
        Ok(config)
    }

    /// Apply node-level overrides from `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let port = |var: &'static str| -> Result<Option<u16>, ConfigError> {
            let Some(value) = lookup(var) else {
                return Ok(None);
            };
            match value.trim().parse::<u16>() {
                Ok(port) => Ok(Some(port)),
                Err(_) => Err(ConfigError::InvalidEnv { var, value }),
            }
        };

        if let Some(p2p) = port("ERA_P2P_PORT")? {
            self.network.p2p_port = Some(p2p);
        }
        if let Some(rpc) = port("ERA_RPC_PORT")? {
            self.network.rpc_port = Some(rpc);
        }
        if let Some(value) = lookup("ERA_TESTNET") {
            self.network.testnet = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "ERA_TESTNET",
                        value,
                    })
                }
            };
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peers.ban_threshold == 0 {
            return Err(ConfigError::Invalid("peers.ban_threshold must be positive".into()));
        }
        if self.network.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "network.connect_timeout_secs must be positive".into(),
            ));
        }
        if self.network.added_node_retry_secs == 0 || self.network.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid("network intervals must be positive".into()));
        }
        Ok(())
    }

    pub fn network_kind(&self) -> Network {
        Network::from_testnet_flag(self.network.testnet)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            ban_threshold: self.peers.ban_threshold,
            ban_duration_secs: self.peers.ban_duration_secs,
            connect_timeout_secs: self.network.connect_timeout_secs,
            ..RegistryConfig::default()
        }
    }

    /// Loopback-only, no seeding, short intervals.
    pub fn for_testing(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            network: NetworkConfig {
                testnet: true,
                listen: false,
                bind: IpAddr::from([127, 0, 0, 1]),
                p2p_port: Some(0),
                connect_timeout_secs: 1,
                added_node_retry_secs: 1,
                ping_interval_secs: 1,
                dns_seed: false,
                ..NetworkConfig::default()
            },
            peers: PeersConfig {
                ban_threshold: 100,
                ban_duration_secs: 60,
            },
            storage: StorageConfig {
                data_dir: data_dir.into(),
            },
            telemetry: TelemetryConfig {
                status_poll_ms: 50,
                ..TelemetryConfig::default()
            },
        }
    }
}

impl NetworkConfig {
    pub fn added_node_retry(&self) -> Duration {
        Duration::from_secs(self.added_node_retry_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> =
            pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert!(!config.network.testnet);
        assert!(config.network.listen);
        assert_eq!(config.network.max_outbound, 8);
        assert_eq!(config.peers.ban_threshold, 100);
        assert_eq!(config.peers.ban_duration_secs, 86_400);
        assert_eq!(config.network_kind(), Network::Main);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(NodeConfig::from_toml("").unwrap(), NodeConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let config = NodeConfig::from_toml(
            r#"
            [network]
            testnet = true
            max_outbound = 4

            [peers]
            ban_threshold = 50

            [telemetry]
            log_level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.network_kind(), Network::Testnet);
        assert_eq!(config.network.max_outbound, 4);
        assert_eq!(config.network.max_inbound, 117);
        assert_eq!(config.peers.ban_threshold, 50);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            NodeConfig::from_toml("[network]\nmax_outbound = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = NodeConfig::load(Some(Path::new("/nonexistent/era.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let config = NodeConfig::default()
            .apply_env(env_of(&[
                ("ERA_P2P_PORT", "23546"),
                ("ERA_RPC_PORT", "23545"),
                ("ERA_TESTNET", "1"),
            ]))
            .unwrap();

        assert_eq!(config.network.p2p_port, Some(23546));
        assert_eq!(config.network.rpc_port, Some(23545));
        assert!(config.network.testnet);
    }

    #[test]
    fn test_env_invalid_port() {
        let result = NodeConfig::default().apply_env(env_of(&[("ERA_P2P_PORT", "70000")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv { var: "ERA_P2P_PORT", .. })
        ));
    }

    #[test]
    fn test_registry_config_mapping() {
        let mut config = NodeConfig::default();
        config.peers.ban_threshold = 40;
        config.network.connect_timeout_secs = 9;

        let registry = config.registry_config();
        assert_eq!(registry.ban_threshold, 40);
        assert_eq!(registry.connect_timeout_secs, 9);
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = NodeConfig::default();
        config.peers.ban_threshold = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
