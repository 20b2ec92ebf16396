//! # 256-bit Digests
//!
//! Block hashes, merkle roots and checkpoint hashes are 32-byte digests.
//! Bytes are stored in wire order (the order they are serialized in a block
//! header); the human-readable hex form is byte-reversed, matching how the
//! chain's explorers and release notes print them.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors produced when parsing a digest from hex.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    /// Input is not exactly 64 hex characters (after an optional `0x`).
    #[error("expected 64 hex characters, got {0}")]
    InvalidLength(usize),

    /// Input contains a non-hex character.
    #[error("invalid hex digit in digest")]
    InvalidHex,
}

/// A 256-bit digest in wire byte order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero digest (used as the genesis parent hash).
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Wrap raw wire-order bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw wire-order bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse the byte-reversed display form, e.g. a checkpoint literal.
    pub fn from_hex(input: &str) -> Result<Self, HexError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 64 {
            return Err(HexError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| HexError::InvalidHex)?;
        bytes.reverse();
        Ok(Self(bytes))
    }

    /// Byte-reversed hex, the conventional display form.
    pub fn to_hex(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Interpret the digest as a little-endian 256-bit integer, for
    /// comparison against a proof-of-work target.
    pub fn to_u256(&self) -> U256 {
        U256::from_little_endian(&self.0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_hex())
    }
}

impl FromStr for Hash256 {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash256::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Double SHA-256, the digest used for transaction ids, merkle nodes,
/// header digests and frame checksums.
pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    Hash256(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENESIS: &str = "0000aab7dff29b0749519a7886b8a8d3f2806eb5dd861f9a0dbb7441f9a97f6a";

    #[test]
    fn test_hex_display_is_byte_reversed() {
        let hash = Hash256::from_hex(GENESIS).unwrap();
        // Leading zeros of the display form are the trailing wire bytes.
        assert_eq!(hash.as_bytes()[31], 0x00);
        assert_eq!(hash.as_bytes()[30], 0x00);
        assert_eq!(hash.as_bytes()[0], 0x6a);
        assert_eq!(hash.to_string(), GENESIS);
    }

    #[test]
    fn test_hex_accepts_prefix() {
        let with_prefix = format!("0x{}", GENESIS);
        assert_eq!(
            Hash256::from_hex(&with_prefix).unwrap(),
            Hash256::from_hex(GENESIS).unwrap()
        );
    }

    #[test]
    fn test_hex_rejects_bad_input() {
        assert_eq!(Hash256::from_hex("abcd"), Err(HexError::InvalidLength(4)));
        let bad = "zz".repeat(32);
        assert_eq!(Hash256::from_hex(&bad), Err(HexError::InvalidHex));
    }

    #[test]
    fn test_sha256d_empty() {
        // SHA-256d("") in wire order
        let digest = sha256d(b"");
        assert_eq!(
            hex::encode(digest.as_bytes()),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_serde_uses_display_form() {
        let hash = Hash256::from_hex(GENESIS).unwrap();
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", GENESIS));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_to_u256_orders_by_display_value() {
        let small = Hash256::from_hex(GENESIS).unwrap();
        let large = Hash256::from_hex(&"f".repeat(64)).unwrap();
        assert!(small.to_u256() < large.to_u256());
    }
}
