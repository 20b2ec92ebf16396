//! # Network Profile
//!
//! Immutable description of one network. Profiles are described as plain
//! data (`ProfileRecord`); testnet is the mainnet record with named
//! overrides applied through `ProfileBuilder`. `build()` constructs the
//! genesis block and refuses to return a profile whose genesis does not
//! match the pinned expectations.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use primitive_types::U256;
use rand::Rng;
use serde::Serialize;
use shared_types::{Hash256, Timestamp};
use tracing::{debug, info};

use super::errors::{ChainParamsError, MagicMismatch};
use super::genesis::{build_genesis, target_to_compact, Block, GenesisParams, GENESIS_HEADLINE, GENESIS_TIME};
use super::network::Network;
use super::prefixes::Base58Prefixes;
use super::seeds::{convert_fixed_seeds, mainnet_dns_seeds, DnsSeed, FixedSeed, SeedAddress, MAINNET_FIXED_SEEDS};
use super::upgrades::{Upgrade, UpgradeGate};
use crate::ports::BlockHasher;

/// Sentinel for "proof-of-work never ends".
pub const LAST_POW_BLOCK_UNSET: u32 = i32::MAX as u32;

/// A release-bundled `(height, hash)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Checkpoint {
    pub height: u32,
    pub hash: Hash256,
}

impl Checkpoint {
    pub fn new(height: u32, hash: Hash256) -> Self {
        Self { height, hash }
    }
}

/// Values the built genesis block must reproduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenesisExpectations {
    /// Documented block identity (the hash checkpoints refer to).
    pub block_hash: Hash256,
    pub merkle_root: Hash256,
    /// SHA-256d of the serialized 80-byte header.
    pub header_digest: Hash256,
}

// Literals passed here are 64-char hex constants; parsing cannot fail.
fn pinned(hex: &str, what: &str) -> Hash256 {
    Hash256::from_hex(hex).expect(what)
}

const GENESIS_MERKLE_ROOT: &str = "22a2e4e28386bf75759112222b20cf3b889cd60f5e55d7184f8dbdec4d8dc6ff";

fn mainnet_checkpoints() -> Vec<Checkpoint> {
    [
        (0, "0000aab7dff29b0749519a7886b8a8d3f2806eb5dd861f9a0dbb7441f9a97f6a"),
        (4, "000059e51262fbdb6b5b636fb841a01f0f13fff549b801265fa751141b8a18ca"),
        (5, "0000b023d186b6986b58373680cfc9e4dd13e70c51a2964688f3f1b4e58b8d8d"),
    ]
    .into_iter()
    .map(|(height, hex)| Checkpoint::new(height, pinned(hex, "mainnet checkpoint")))
    .collect()
}

// =============================================================================
// PROFILE RECORD
// =============================================================================

/// Unverified profile description.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub network: Network,
    pub magic: [u8; 4],
    pub default_port: u16,
    pub rpc_port: u16,
    pub pow_limit: U256,
    pub genesis_time: u32,
    pub genesis_nonce: u32,
    pub genesis_headline: String,
    pub genesis: GenesisExpectations,
    pub prefixes: Base58Prefixes,
    pub dns_seeds: Vec<DnsSeed>,
    pub fixed_seeds: Vec<FixedSeed>,
    pub last_pow_block_height: u32,
    pub upgrades: UpgradeGate,
    pub checkpoints: Vec<Checkpoint>,
    pub data_dir_suffix: Option<String>,
}

impl ProfileRecord {
    pub fn mainnet() -> Self {
        Self {
            network: Network::Main,
            magic: [0x61, 0x32, 0x70, 0x3a],
            default_port: 13546,
            rpc_port: 13547,
            pow_limit: U256::MAX >> 16,
            genesis_time: GENESIS_TIME,
            genesis_nonce: 53_683,
            genesis_headline: GENESIS_HEADLINE.to_string(),
            genesis: GenesisExpectations {
                block_hash: pinned(
                    "0000aab7dff29b0749519a7886b8a8d3f2806eb5dd861f9a0dbb7441f9a97f6a",
                    "mainnet genesis hash",
                ),
                merkle_root: pinned(GENESIS_MERKLE_ROOT, "genesis merkle root"),
                header_digest: pinned(
                    "f174ebb0a4b49a941d67d5ab4242223a1f57a728553f85bc3135ee4be046749f",
                    "mainnet header digest",
                ),
            },
            prefixes: Base58Prefixes::MAINNET,
            dns_seeds: mainnet_dns_seeds(),
            fixed_seeds: MAINNET_FIXED_SEEDS.to_vec(),
            last_pow_block_height: LAST_POW_BLOCK_UNSET,
            upgrades: UpgradeGate::standard(),
            checkpoints: mainnet_checkpoints(),
            data_dir_suffix: None,
        }
    }

    /// Mainnet with testnet overrides.
    pub fn testnet() -> Self {
        ProfileBuilder::new(Self::mainnet())
            .network(Network::Testnet)
            .magic([0x05, 0x6c, 0x9c, 0x70])
            .ports(23536, 23537)
            .pow_limit(U256::MAX >> 14)
            .genesis_nonce(13_731)
            .genesis_expectations(GenesisExpectations {
                block_hash: pinned(
                    "000149d0c0dec3468068735e9f9ccdd6d329ed2f6f60add7459773e502f067c5",
                    "testnet genesis hash",
                ),
                merkle_root: pinned(GENESIS_MERKLE_ROOT, "genesis merkle root"),
                header_digest: pinned(
                    "ee8bd13794d394a794082769af29426c3be07e4996462b000e1ca05190a78c74",
                    "testnet header digest",
                ),
            })
            .prefixes(Base58Prefixes::TESTNET)
            .seeds(Vec::new(), Vec::new())
            .checkpoints(Vec::new())
            .data_dir_suffix(Some("testnet".to_string()))
            .into_record()
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => Self::mainnet(),
            Network::Testnet => Self::testnet(),
        }
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Applies named overrides to a base record, then builds and verifies.
#[derive(Debug, Clone)]
pub struct ProfileBuilder {
    record: ProfileRecord,
}

impl ProfileBuilder {
    pub fn new(base: ProfileRecord) -> Self {
        Self { record: base }
    }

    pub fn network(mut self, network: Network) -> Self {
        self.record.network = network;
        self
    }

    pub fn magic(mut self, magic: [u8; 4]) -> Self {
        self.record.magic = magic;
        self
    }

    pub fn ports(mut self, default_port: u16, rpc_port: u16) -> Self {
        self.record.default_port = default_port;
        self.record.rpc_port = rpc_port;
        self
    }

    pub fn pow_limit(mut self, limit: U256) -> Self {
        self.record.pow_limit = limit;
        self
    }

    pub fn genesis_nonce(mut self, nonce: u32) -> Self {
        self.record.genesis_nonce = nonce;
        self
    }

    pub fn genesis_expectations(mut self, expectations: GenesisExpectations) -> Self {
        self.record.genesis = expectations;
        self
    }

    pub fn prefixes(mut self, prefixes: Base58Prefixes) -> Self {
        self.record.prefixes = prefixes;
        self
    }

    pub fn seeds(mut self, dns: Vec<DnsSeed>, fixed: Vec<FixedSeed>) -> Self {
        self.record.dns_seeds = dns;
        self.record.fixed_seeds = fixed;
        self
    }

    pub fn checkpoints(mut self, checkpoints: Vec<Checkpoint>) -> Self {
        self.record.checkpoints = checkpoints;
        self
    }

    pub fn data_dir_suffix(mut self, suffix: Option<String>) -> Self {
        self.record.data_dir_suffix = suffix;
        self
    }

    pub fn last_pow_block_height(mut self, height: u32) -> Self {
        self.record.last_pow_block_height = height;
        self
    }

    pub fn upgrades(mut self, upgrades: UpgradeGate) -> Self {
        self.record.upgrades = upgrades;
        self
    }

    pub fn into_record(self) -> ProfileRecord {
        self.record
    }

    /// Construct genesis and verify it. With a `hasher`, the identity hash
    /// is checked as well.
    pub fn build(self, hasher: Option<&dyn BlockHasher>) -> Result<NetworkProfile, ChainParamsError> {
        let record = self.record;

        let genesis = build_genesis(&GenesisParams {
            time: record.genesis_time,
            bits: target_to_compact(record.pow_limit),
            nonce: record.genesis_nonce,
            headline: record.genesis_headline.clone(),
        });

        let computed_root = genesis.compute_merkle_root();
        if computed_root != record.genesis.merkle_root {
            return Err(ChainParamsError::MerkleRootMismatch {
                expected: record.genesis.merkle_root,
                computed: computed_root,
            });
        }

        let digest = genesis.header.digest();
        if digest != record.genesis.header_digest {
            return Err(ChainParamsError::HeaderDigestMismatch {
                expected: record.genesis.header_digest,
                computed: digest,
            });
        }

        if let Some(hasher) = hasher {
            let identity = hasher.block_hash(&genesis.header);
            if identity != record.genesis.block_hash {
                return Err(ChainParamsError::GenesisHashMismatch {
                    expected: record.genesis.block_hash,
                    computed: identity,
                });
            }
        } else {
            debug!(network = %record.network, "no block hasher supplied, identity hash taken as documented");
        }

        if record.genesis.block_hash.to_u256() > record.pow_limit {
            return Err(ChainParamsError::GenesisAboveTarget(record.genesis.block_hash));
        }

        info!(
            network = %record.network,
            genesis = %record.genesis.block_hash,
            bits = %format!("{:#010x}", genesis.header.bits),
            "Network profile built"
        );

        Ok(NetworkProfile {
            network: record.network,
            magic: record.magic,
            default_port: record.default_port,
            rpc_port: record.rpc_port,
            pow_limit: record.pow_limit,
            genesis_hash: record.genesis.block_hash,
            genesis,
            prefixes: record.prefixes,
            dns_seeds: record.dns_seeds,
            fixed_seeds: record.fixed_seeds,
            last_pow_block_height: record.last_pow_block_height,
            upgrades: record.upgrades,
            checkpoints: record.checkpoints,
            data_dir_suffix: record.data_dir_suffix,
        })
    }
}

// =============================================================================
// VERIFIED PROFILE
// =============================================================================

/// A verified, immutable network profile. Shared behind `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkProfile {
    pub network: Network,
    pub magic: [u8; 4],
    pub default_port: u16,
    pub rpc_port: u16,
    pub pow_limit: U256,
    pub genesis: Block,
    /// Block identity of `genesis`.
    pub genesis_hash: Hash256,
    pub prefixes: Base58Prefixes,
    pub dns_seeds: Vec<DnsSeed>,
    pub fixed_seeds: Vec<FixedSeed>,
    pub last_pow_block_height: u32,
    pub upgrades: UpgradeGate,
    pub checkpoints: Vec<Checkpoint>,
    pub data_dir_suffix: Option<String>,
}

impl NetworkProfile {
    /// Build the stock profile for `network`.
    pub fn for_network(network: Network, hasher: Option<&dyn BlockHasher>) -> Result<Self, ChainParamsError> {
        ProfileBuilder::new(ProfileRecord::for_network(network)).build(hasher)
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    /// Reject frames that do not start with this network's magic.
    pub fn check_message_start(&self, frame: &[u8]) -> Result<(), MagicMismatch> {
        let mut actual = [0u8; 4];
        let n = frame.len().min(4);
        actual[..n].copy_from_slice(&frame[..n]);
        if n == 4 && actual == self.magic {
            Ok(())
        } else {
            Err(MagicMismatch {
                expected: self.magic,
                actual,
            })
        }
    }

    pub fn is_proof_of_work_allowed(&self, height: u32) -> bool {
        height <= self.last_pow_block_height
    }

    pub fn is_upgrade_active(&self, upgrade: Upgrade, height: u32) -> bool {
        self.upgrades.is_active(upgrade, height)
    }

    /// Network-specific data directory below `base`.
    pub fn data_dir(&self, base: &Path) -> PathBuf {
        match &self.data_dir_suffix {
            Some(suffix) => base.join(suffix),
            None => base.to_path_buf(),
        }
    }

    /// Fixed seeds as address records with randomly aged `last_seen`.
    pub fn fixed_seed_addresses<R: Rng + ?Sized>(&self, now: Timestamp, rng: &mut R) -> Vec<SeedAddress> {
        convert_fixed_seeds(&self.fixed_seeds, now, rng)
    }

    /// Default-port address for a DNS seed host given as a literal IP.
    pub fn dns_seed_literal(&self, seed: &DnsSeed) -> Option<SocketAddr> {
        seed.host
            .parse::<std::net::IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.default_port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BlockHeader;
    use crate::ports::HeaderDigestHasher;

    // =========================================================================
    // TEST GROUP 1: Stock Profiles
    // =========================================================================

    #[test]
    fn test_mainnet_builds() {
        let profile = NetworkProfile::for_network(Network::Main, None).unwrap();
        assert_eq!(profile.magic, [0x61, 0x32, 0x70, 0x3a]);
        assert_eq!(profile.default_port(), 13546);
        assert_eq!(profile.rpc_port, 13547);
        assert_eq!(profile.genesis.header.bits, 0x1f00_ffff);
        assert_eq!(profile.genesis.header.nonce, 53_683);
        assert_eq!(
            profile.genesis_hash.to_string(),
            "0000aab7dff29b0749519a7886b8a8d3f2806eb5dd861f9a0dbb7441f9a97f6a"
        );
        assert_eq!(profile.checkpoints.len(), 3);
        assert_eq!(profile.checkpoints[0].hash, profile.genesis_hash);
        assert_eq!(profile.data_dir_suffix, None);
    }

    #[test]
    fn test_testnet_builds_with_overrides() {
        let profile = NetworkProfile::for_network(Network::Testnet, None).unwrap();
        assert_eq!(profile.magic, [0x05, 0x6c, 0x9c, 0x70]);
        assert_eq!(profile.default_port, 23536);
        assert_eq!(profile.rpc_port, 23537);
        assert_eq!(profile.genesis.header.bits, 0x1f03_ffff);
        assert_eq!(profile.genesis.header.nonce, 13_731);
        assert_eq!(
            profile.genesis.header.merkle_root.to_string(),
            "22a2e4e28386bf75759112222b20cf3b889cd60f5e55d7184f8dbdec4d8dc6ff"
        );
        assert_eq!(
            profile.genesis_hash.to_string(),
            "000149d0c0dec3468068735e9f9ccdd6d329ed2f6f60add7459773e502f067c5"
        );
        assert!(profile.checkpoints.is_empty());
        assert!(profile.dns_seeds.is_empty());
        assert!(profile.fixed_seeds.is_empty());
        assert_eq!(profile.prefixes, Base58Prefixes::TESTNET);
        assert_eq!(profile.data_dir(Path::new("/data")), PathBuf::from("/data/testnet"));
    }

    #[test]
    fn test_upgrade_table_shared_by_both_networks() {
        let main = ProfileRecord::mainnet();
        let test = ProfileRecord::testnet();
        assert_eq!(main.upgrades, test.upgrades);
        assert_eq!(main.genesis_time, test.genesis_time);
        assert_eq!(main.last_pow_block_height, LAST_POW_BLOCK_UNSET);
    }

    // =========================================================================
    // TEST GROUP 2: Genesis Verification
    // =========================================================================

    #[test]
    fn test_mutated_nonce_is_fatal() {
        let result = ProfileBuilder::new(ProfileRecord::mainnet())
            .genesis_nonce(53_684)
            .build(None);
        assert!(matches!(result, Err(ChainParamsError::HeaderDigestMismatch { .. })));
    }

    #[test]
    fn test_mutated_pow_limit_is_fatal() {
        let result = ProfileBuilder::new(ProfileRecord::mainnet())
            .pow_limit(U256::MAX >> 20)
            .build(None);
        assert!(matches!(result, Err(ChainParamsError::HeaderDigestMismatch { .. })));
    }

    #[test]
    fn test_mutated_headline_fails_merkle_check() {
        let mut record = ProfileRecord::mainnet();
        record.genesis_headline = "something else".into();
        let result = ProfileBuilder::new(record).build(None);
        assert!(matches!(result, Err(ChainParamsError::MerkleRootMismatch { .. })));
    }

    #[test]
    fn test_hasher_mismatch_is_fatal() {
        // The header digest is not this chain's identity hash.
        let result = ProfileBuilder::new(ProfileRecord::mainnet()).build(Some(&HeaderDigestHasher));
        assert!(matches!(result, Err(ChainParamsError::GenesisHashMismatch { .. })));
    }

    /// Stands in for the chain's identity hash.
    struct FixedHasher(Hash256);

    impl BlockHasher for FixedHasher {
        fn block_hash(&self, _header: &BlockHeader) -> Hash256 {
            self.0
        }
    }

    #[test]
    fn test_hasher_match_is_accepted() {
        let record = ProfileRecord::mainnet();
        let hasher = FixedHasher(record.genesis.block_hash);
        let profile = ProfileBuilder::new(record).build(Some(&hasher)).unwrap();
        assert_eq!(profile.genesis_hash, hasher.0);
    }

    #[test]
    fn test_genesis_hash_above_work_limit_is_fatal() {
        // The header digest is a valid SHA-256d but far above 0x0000ffff...
        let mut record = ProfileRecord::mainnet();
        record.genesis.block_hash = record.genesis.header_digest;
        let result = ProfileBuilder::new(record).build(Some(&HeaderDigestHasher));
        assert!(matches!(result, Err(ChainParamsError::GenesisAboveTarget(_))));
    }

    // =========================================================================
    // TEST GROUP 3: Queries
    // =========================================================================

    #[test]
    fn test_message_start() {
        let profile = NetworkProfile::for_network(Network::Main, None).unwrap();
        assert!(profile.check_message_start(&[0x61, 0x32, 0x70, 0x3a, 0x00]).is_ok());
        let err = profile
            .check_message_start(&[0x05, 0x6c, 0x9c, 0x70])
            .unwrap_err();
        assert_eq!(err.actual, [0x05, 0x6c, 0x9c, 0x70]);
        assert!(profile.check_message_start(&[0x61, 0x32]).is_err());
    }

    #[test]
    fn test_proof_of_work_cutoff() {
        let profile = ProfileBuilder::new(ProfileRecord::mainnet())
            .last_pow_block_height(10_000)
            .build(None)
            .unwrap();
        assert!(profile.is_proof_of_work_allowed(10_000));
        assert!(!profile.is_proof_of_work_allowed(10_001));

        let stock = NetworkProfile::for_network(Network::Main, None).unwrap();
        assert!(stock.is_proof_of_work_allowed(2_000_000_000));
    }

    #[test]
    fn test_dns_seed_literal_uses_default_port() {
        let profile = NetworkProfile::for_network(Network::Main, None).unwrap();
        let addr = profile.dns_seed_literal(&profile.dns_seeds[0]).unwrap();
        assert_eq!(addr.to_string(), "64.150.189.104:13546");
        assert!(profile.dns_seed_literal(&DnsSeed::new("x", "seed.example.org")).is_none());
    }

    #[test]
    fn test_builder_overrides_are_field_exact() {
        let base = ProfileRecord::mainnet();
        let record = ProfileBuilder::new(base.clone()).ports(1, 2).into_record();
        assert_eq!(record.default_port, 1);
        assert_eq!(record.rpc_port, 2);
        assert_eq!(record.magic, base.magic);
        assert_eq!(record.checkpoints, base.checkpoints);
        assert_eq!(record.genesis, base.genesis);
    }
}
