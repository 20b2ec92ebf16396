//! Network selector.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::ChainParamsError;

/// The networks this node knows how to join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Testnet,
}

impl Network {
    /// Select from the boolean startup flag. Absence of the flag is mainnet.
    pub fn from_testnet_flag(testnet: bool) -> Self {
        if testnet {
            Network::Testnet
        } else {
            Network::Main
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Main => "main",
            Network::Testnet => "test",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ChainParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Testnet),
            other => Err(ChainParamsError::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Numeric selector used by older configuration files (0 = main, 1 = testnet).
impl TryFrom<u32> for Network {
    type Error = ChainParamsError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Network::Main),
            1 => Ok(Network::Testnet),
            other => Err(ChainParamsError::UnsupportedNetwork(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_networks() {
        assert_eq!("main".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("MainNet".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Testnet);
        assert_eq!(Network::try_from(1).unwrap(), Network::Testnet);
    }

    #[test]
    fn test_unknown_selector_is_unsupported() {
        assert_eq!(
            "regtest".parse::<Network>(),
            Err(ChainParamsError::UnsupportedNetwork("regtest".into()))
        );
        assert!(matches!(
            Network::try_from(7),
            Err(ChainParamsError::UnsupportedNetwork(_))
        ));
    }

    #[test]
    fn test_flag_defaults_to_main() {
        assert_eq!(Network::from_testnet_flag(false), Network::Main);
        assert_eq!(Network::from_testnet_flag(true), Network::Testnet);
    }
}
