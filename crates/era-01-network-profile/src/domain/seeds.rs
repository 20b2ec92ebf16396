//! # Seed Peers
//!
//! Release-bundled bootstrap data: DNS seed hosts and compiled fixed seeds.
//! Fixed seeds are stored as raw IPv6-mapped addresses and turned into
//! address records with a synthetic, randomly aged `last_seen`.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use rand::Rng;
use serde::{Deserialize, Serialize};
use shared_types::{Timestamp, ONE_WEEK_SECS};

/// Service bit advertised by full nodes.
pub const NODE_NETWORK: u64 = 1;

/// A DNS seed: a display name and the host to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSeed {
    pub name: String,
    pub host: String,
}

impl DnsSeed {
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
        }
    }
}

/// A compiled seed: 16-byte IPv6 (or IPv4-mapped) address and port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSeed {
    pub addr: [u8; 16],
    pub port: u16,
}

impl FixedSeed {
    pub fn socket_addr(&self) -> SocketAddr {
        let v6 = Ipv6Addr::from(self.addr);
        let ip = match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        };
        SocketAddr::new(ip, self.port)
    }
}

/// Peer-address record synthesized from a fixed seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedAddress {
    pub addr: SocketAddr,
    pub services: u64,
    pub last_seen: Timestamp,
}

/// Mainnet DNS seeds.
pub fn mainnet_dns_seeds() -> Vec<DnsSeed> {
    vec![DnsSeed::new("seed1", "64.150.189.104")]
}

/// Mainnet fixed seeds: `::ffff:64.150.189.104` port 13546.
pub const MAINNET_FIXED_SEEDS: &[FixedSeed] = &[FixedSeed {
    addr: [
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 64, 150, 189, 104,
    ],
    port: 13546,
}];

/// Convert fixed seeds into address records.
///
/// Each record gets `last_seen = now - uniform[1, one week) - one week`, so
/// every value lies strictly between two weeks and one week ago.
pub fn convert_fixed_seeds<R: Rng + ?Sized>(
    seeds: &[FixedSeed],
    now: Timestamp,
    rng: &mut R,
) -> Vec<SeedAddress> {
    seeds
        .iter()
        .map(|seed| {
            let age = rng.gen_range(1..ONE_WEEK_SECS) + ONE_WEEK_SECS;
            SeedAddress {
                addr: seed.socket_addr(),
                services: NODE_NETWORK,
                last_seen: now.sub_secs(age),
            }
        })
        .collect()
}
