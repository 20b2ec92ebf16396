//! Base58 version bytes for address and key encodings.

use serde::{Deserialize, Serialize};

/// Discriminators consumed by the address codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base58Prefixes {
    pub pubkey_hash: u8,
    pub script_hash: u8,
    pub secret_key: u8,
    pub ext_public_key: [u8; 4],
    pub ext_secret_key: [u8; 4],
}

impl Base58Prefixes {
    pub const MAINNET: Base58Prefixes = Base58Prefixes {
        pubkey_hash: 34,
        script_hash: 62,
        secret_key: 83,
        ext_public_key: [0x1f, 0x46, 0x20, 0x9f],
        ext_secret_key: [0x1f, 0x88, 0x95, 0xbf],
    };

    pub const TESTNET: Base58Prefixes = Base58Prefixes {
        pubkey_hash: 32,
        script_hash: 63,
        secret_key: 145,
        ext_public_key: [0x82, 0x3a, 0xa0, 0x03],
        ext_secret_key: [0x82, 0x3a, 0x06, 0x97],
    };
}
