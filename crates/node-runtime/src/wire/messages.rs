//! `version`, `ping` and `pong` payloads.

use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use era_03_peer_registry::VersionInfo;

use super::frame::WireError;

/// Protocol version this node speaks.
pub const PROTOCOL_VERSION: i32 = 60014;
/// Sub-version string sent in `version`.
pub const USER_AGENT: &str = concat!("/era-node:", env!("CARGO_PKG_VERSION"), "/");
/// Longest sub-version accepted from a peer.
const MAX_USER_AGENT_LEN: u64 = 256;

/// `net_addr` without a timestamp: services, 16-byte IP and big-endian port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetAddress {
    pub services: u64,
    pub addr: SocketAddr,
}

impl NetAddress {
    pub const ENCODED_LEN: usize = 26;

    pub fn new(addr: SocketAddr, services: u64) -> Self {
        Self { services, addr }
    }

    /// The all-zero address some peers send for themselves.
    pub fn unspecified() -> Self {
        Self::new(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0), 0)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.services.to_le_bytes());
        let v6 = match self.addr.ip() {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        out.extend_from_slice(&v6.octets());
        out.extend_from_slice(&self.addr.port().to_be_bytes());
    }

    fn decode(reader: &mut PayloadReader<'_>) -> Result<Self, WireError> {
        let services = reader.u64("addr services")?;
        let mut octets = [0u8; 16];
        octets.copy_from_slice(reader.take(16, "addr ip")?);
        let v6 = Ipv6Addr::from(octets);
        let ip = match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        };
        let port = u16::from_be_bytes(reader.array("addr port")?);
        Ok(Self::new(SocketAddr::new(ip, port), services))
    }
}

/// The `version` payload.
///
/// ```text
/// int32    version
/// uint64   services
/// int64    timestamp
/// net_addr addr_recv
/// net_addr addr_from
/// uint64   nonce
/// var_str  user_agent
/// int32    start_height
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub addr_recv: NetAddress,
    pub addr_from: NetAddress,
    /// Random per-process value; seeing our own nonce means we dialed ourselves.
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
}

impl VersionMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(86 + self.user_agent.len());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        self.addr_recv.encode(&mut out);
        self.addr_from.encode(&mut out);
        out.extend_from_slice(&self.nonce.to_le_bytes());
        write_varint(self.user_agent.len() as u64, &mut out);
        out.extend_from_slice(self.user_agent.as_bytes());
        out.extend_from_slice(&self.start_height.to_le_bytes());
        out
    }

    /// Decode a peer's `version`. Trailing fields from newer protocol
    /// versions (relay flag and the like) are ignored.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut reader = PayloadReader::new(payload);
        let version = reader.i32("version")?;
        let services = reader.u64("services")?;
        let timestamp = reader.u64("timestamp")? as i64;
        let addr_recv = NetAddress::decode(&mut reader)?;
        let addr_from = NetAddress::decode(&mut reader)?;
        let nonce = reader.u64("nonce")?;

        let ua_len = reader.varint("user agent length")?;
        if ua_len > MAX_USER_AGENT_LEN {
            return Err(WireError::Truncated("user agent"));
        }
        let user_agent = String::from_utf8_lossy(reader.take(ua_len as usize, "user agent")?).into_owned();
        let start_height = reader.i32("start height")?;

        Ok(Self {
            version,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
        })
    }

    /// The fields the peer registry keeps.
    pub fn to_version_info(&self) -> VersionInfo {
        VersionInfo {
            version: self.version,
            services: self.services,
            subversion: self.user_agent.clone(),
            starting_height: self.start_height,
            timestamp: self.timestamp,
        }
    }
}

/// `ping` and `pong` carry a single little-endian nonce.
pub fn encode_nonce(nonce: u64) -> Vec<u8> {
    nonce.to_le_bytes().to_vec()
}

pub fn decode_nonce(payload: &[u8]) -> Result<u64, WireError> {
    PayloadReader::new(payload).u64("nonce")
}

fn write_varint(value: u64, out: &mut Vec<u8>) {
    match value {
        0..=0xFC => out.push(value as u8),
        0xFD..=0xFFFF => {
            out.push(0xFD);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xFFFF_FFFF => {
            out.push(0xFE);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xFF);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

struct PayloadReader<'a> {
    bytes: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], WireError> {
        if self.bytes.len() < n {
            return Err(WireError::Truncated(field));
        }
        let (head, rest) = self.bytes.split_at(n);
        self.bytes = rest;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, WireError> {
        Ok(self.take(1, field)?[0])
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, WireError> {
        self.array(field).map(i32::from_le_bytes)
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, WireError> {
        self.array(field).map(u64::from_le_bytes)
    }

    fn varint(&mut self, field: &'static str) -> Result<u64, WireError> {
        match self.u8(field)? {
            0xFD => self.array::<2>(field).map(|b| u16::from_le_bytes(b) as u64),
            0xFE => self.array::<4>(field).map(|b| u32::from_le_bytes(b) as u64),
            0xFF => self.u64(field),
            n => Ok(n as u64),
        }
    }
}
