//! # Genesis Block
//!
//! Deterministic construction of the chain's first block: a single coinbase
//! transaction carrying the provenance headline, wrapped in an 80-byte
//! header with a precomputed nonce. Nothing here searches for a nonce.
//!
//! Transactions carry a timestamp after the version field (proof-of-stake
//! transaction layout), so the serialization below is not byte-compatible
//! with upstream Bitcoin transactions.

use primitive_types::U256;
use shared_types::{sha256d, Hash256};

/// Headline embedded in the genesis coinbase.
pub const GENESIS_HEADLINE: &str =
    "Bittrex Bars Users Residing in 5 Countries Under US Embargo | JP Buntinx | The Merkle | March 6, 2018";

/// Genesis block and coinbase timestamp (both networks).
pub const GENESIS_TIME: u32 = 1_520_366_800;

pub const GENESIS_VERSION: i32 = 1;

// =============================================================================
// SCRIPT
// =============================================================================

const OP_0: u8 = 0x00;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// Raw script bytes with the handful of push helpers genesis needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Push the integer zero as `OP_0`.
    pub fn push_zero(mut self) -> Self {
        self.0.push(OP_0);
        self
    }

    /// Push a non-negative integer as a minimal little-endian sign-magnitude
    /// byte vector (the legacy bignum encoding).
    pub fn push_bignum(self, value: u64) -> Self {
        let mut bytes = Vec::new();
        let mut v = value;
        while v > 0 {
            bytes.push((v & 0xff) as u8);
            v >>= 8;
        }
        if bytes.last().is_some_and(|b| b & 0x80 != 0) {
            bytes.push(0x00);
        }
        self.push_data(&bytes)
    }

    /// Push arbitrary data with the smallest push opcode that fits.
    pub fn push_data(mut self, data: &[u8]) -> Self {
        let len = data.len();
        if len < OP_PUSHDATA1 as usize {
            self.0.push(len as u8);
        } else if len <= 0xff {
            self.0.push(OP_PUSHDATA1);
            self.0.push(len as u8);
        } else if len <= 0xffff {
            self.0.push(OP_PUSHDATA2);
            self.0.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.0.push(OP_PUSHDATA4);
            self.0.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.0.extend_from_slice(data);
        self
    }
}

// =============================================================================
// TRANSACTION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    /// The null prevout spent by every coinbase.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Script,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value: i64,
    pub script_pubkey: Script,
}

impl TxOut {
    /// Value 0 with an empty script.
    pub fn empty() -> Self {
        Self {
            value: 0,
            script_pubkey: Script::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub time: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(256);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.time.to_le_bytes());

        write_compact_size(&mut out, self.inputs.len() as u64);
        for input in &self.inputs {
            out.extend_from_slice(input.prevout.txid.as_bytes());
            out.extend_from_slice(&input.prevout.index.to_le_bytes());
            write_bytes(&mut out, input.script_sig.as_bytes());
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_compact_size(&mut out, self.outputs.len() as u64);
        for output in &self.outputs {
            out.extend_from_slice(&output.value.to_le_bytes());
            write_bytes(&mut out, output.script_pubkey.as_bytes());
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    pub fn txid(&self) -> Hash256 {
        sha256d(&self.serialize())
    }
}

/// Bitcoin variable-length integer.
pub fn write_compact_size(out: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => out.push(n as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&n.to_le_bytes());
        }
    }
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    write_compact_size(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

/// Merkle root over transaction ids; an odd trailing node is paired with
/// itself at every level.
pub fn merkle_root(txids: &[Hash256]) -> Hash256 {
    if txids.is_empty() {
        return Hash256::ZERO;
    }

    let mut level: Vec<Hash256> = txids.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut buf = [0u8; 64];
                buf[..32].copy_from_slice(left.as_bytes());
                buf[32..].copy_from_slice(right.as_bytes());
                sha256d(&buf)
            })
            .collect();
    }
    level[0]
}

// =============================================================================
// HEADER & BLOCK
// =============================================================================

/// 80-byte block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    pub prev_block: Hash256,
    pub merkle_root: Hash256,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub const SIZE: usize = 80;

    pub fn serialize(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(self.prev_block.as_bytes());
        out[36..68].copy_from_slice(self.merkle_root.as_bytes());
        out[68..72].copy_from_slice(&self.time.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// SHA-256d of the serialized header. Binds every header field.
    pub fn digest(&self) -> Hash256 {
        sha256d(&self.serialize())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn compute_merkle_root(&self) -> Hash256 {
        let txids: Vec<Hash256> = self.transactions.iter().map(Transaction::txid).collect();
        merkle_root(&txids)
    }
}

/// Inputs that vary between networks when building genesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisParams {
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
    pub headline: String,
}

/// Assemble the genesis block. Pure and deterministic.
pub fn build_genesis(params: &GenesisParams) -> Block {
    let script_sig = Script::new()
        .push_zero()
        .push_bignum(42)
        .push_data(params.headline.as_bytes());

    let coinbase = Transaction {
        version: 1,
        time: params.time,
        inputs: vec![TxIn {
            prevout: OutPoint::null(),
            script_sig,
            sequence: u32::MAX,
        }],
        outputs: vec![TxOut::empty()],
        lock_time: 0,
    };

    let merkle = merkle_root(&[coinbase.txid()]);

    Block {
        header: BlockHeader {
            version: GENESIS_VERSION,
            prev_block: Hash256::ZERO,
            merkle_root: merkle,
            time: params.time,
            bits: params.bits,
            nonce: params.nonce,
        },
        transactions: vec![coinbase],
    }
}

// =============================================================================
// COMPACT TARGET ENCODING
// =============================================================================

/// Encode a target in the 32-bit compact ("nBits") form.
pub fn target_to_compact(target: U256) -> u32 {
    let mut size = (target.bits() + 7) / 8;
    let mut compact: u32 = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3))).low_u32()
    };

    // The mantissa is signed; keep the sign bit clear.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | ((size as u32) << 24)
}

/// Decode a compact target. Negative or overflowing encodings yield `None`.
pub fn compact_to_target(compact: u32) -> Option<U256> {
    let size = (compact >> 24) as usize;
    let mantissa = compact & 0x007f_ffff;
    if compact & 0x0080_0000 != 0 && mantissa != 0 {
        return None;
    }
    if mantissa == 0 {
        return Some(U256::zero());
    }

    if size <= 3 {
        return Some(U256::from(mantissa >> (8 * (3 - size))));
    }
    let shift = 8 * (size - 3);
    if U256::from(mantissa).bits() + shift > 256 {
        return None;
    }
    Some(U256::from(mantissa) << shift)
}
