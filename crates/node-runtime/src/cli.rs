//! Command-line flags. Applied last, over the file and environment.

use std::path::PathBuf;

use clap::Parser;

use crate::container::NodeConfig;

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "era-node", version, about = "Proof-of-stake full node")]
pub struct Cli {
    /// Use the test network
    #[arg(long)]
    pub testnet: bool,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Base data directory
    #[arg(long, value_name = "PATH")]
    pub datadir: Option<PathBuf>,

    /// Add a node to connect to and keep connected (repeatable)
    #[arg(long = "addnode", value_name = "ADDR")]
    pub add_nodes: Vec<String>,

    /// Accept inbound connections
    #[arg(long, overrides_with = "no_listen")]
    pub listen: bool,

    /// Do not accept inbound connections
    #[arg(long = "no-listen", overrides_with = "listen")]
    pub no_listen: bool,

    /// P2P listen port
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Log filter, e.g. `debug` or `era_03_peer_registry=trace,info`
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn apply(&self, mut config: NodeConfig) -> NodeConfig {
        if self.testnet {
            config.network.testnet = true;
        }
        if let Some(dir) = &self.datadir {
            config.storage.data_dir = dir.clone();
        }
        if self.no_listen {
            config.network.listen = false;
        } else if self.listen {
            config.network.listen = true;
        }
        if let Some(port) = self.port {
            config.network.p2p_port = Some(port);
        }
        if let Some(level) = &self.log_level {
            config.telemetry.log_level = level.clone();
        }
        for node in &self.add_nodes {
            if !config.network.add_nodes.contains(node) {
                config.network.add_nodes.push(node.clone());
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("era-node").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_no_flags_means_mainnet() {
        let config = parse(&[]).apply(NodeConfig::default());
        assert!(!config.network.testnet);
        assert!(config.network.listen);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = parse(&[
            "--testnet",
            "--datadir",
            "/tmp/era",
            "--addnode",
            "10.0.0.1",
            "--addnode",
            "seed.example.org:13546",
            "--no-listen",
        ]);
        let config = cli.apply(NodeConfig::default());

        assert!(config.network.testnet);
        assert!(!config.network.listen);
        assert_eq!(config.storage.data_dir, PathBuf::from("/tmp/era"));
        assert_eq!(
            config.network.add_nodes,
            vec!["10.0.0.1".to_string(), "seed.example.org:13546".to_string()]
        );
    }

    #[test]
    fn test_last_listen_flag_wins() {
        let config = parse(&["--no-listen", "--listen"]).apply(NodeConfig::default());
        assert!(config.network.listen);
    }

    #[test]
    fn test_addnode_not_duplicated() {
        let mut base = NodeConfig::default();
        base.network.add_nodes.push("10.0.0.1".into());
        let config = parse(&["--addnode", "10.0.0.1"]).apply(base);
        assert_eq!(config.network.add_nodes.len(), 1);
    }
}
