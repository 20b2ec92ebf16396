//! Frame header codec.

use era_01_network_profile::{MagicMismatch, NetworkProfile};
use shared_types::sha256d;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const HEADER_LEN: usize = 24;
pub const COMMAND_LEN: usize = 12;
/// Largest payload accepted from a peer (32 MiB).
pub const MAX_PAYLOAD_LEN: u32 = 32 * 1024 * 1024;
/// Up-front reservation for a payload; the rest grows only as bytes arrive.
const PAYLOAD_CHUNK: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum WireError {
    #[error(transparent)]
    WrongMagic(#[from] MagicMismatch),

    #[error("checksum mismatch on '{command}'")]
    BadChecksum { command: String },

    #[error("payload of {0} bytes exceeds the frame limit")]
    Oversized(u32),

    #[error("command field is not NUL-padded ASCII")]
    MalformedCommand,

    #[error("command '{0}' does not fit in {COMMAND_LEN} bytes")]
    CommandTooLong(String),

    #[error("payload truncated reading {0}")]
    Truncated(&'static str),

    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Decoded header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub command: String,
    pub length: u32,
    pub checksum: [u8; 4],
}

/// A command and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            command: command.into(),
            payload,
        }
    }

    /// Bytes this frame occupies on the wire, header included.
    pub fn wire_len(&self) -> u64 {
        (HEADER_LEN + self.payload.len()) as u64
    }
}

/// First four bytes of SHA-256d over `payload`.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = sha256d(payload);
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest.as_bytes()[..4]);
    out
}

pub fn encode_frame(magic: [u8; 4], frame: &Frame) -> Result<Vec<u8>, WireError> {
    let command = frame.command.as_bytes();
    if command.len() > COMMAND_LEN {
        return Err(WireError::CommandTooLong(frame.command.clone()));
    }
    let length = u32::try_from(frame.payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_LEN)
        .ok_or(WireError::Oversized(u32::MAX))?;

    let mut buf = Vec::with_capacity(HEADER_LEN + frame.payload.len());
    buf.extend_from_slice(&magic);
    let mut padded = [0u8; COMMAND_LEN];
    padded[..command.len()].copy_from_slice(command);
    buf.extend_from_slice(&padded);
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&checksum(&frame.payload));
    buf.extend_from_slice(&frame.payload);
    Ok(buf)
}

/// Parse a header without checking its magic.
pub fn decode_header(bytes: &[u8; HEADER_LEN]) -> Result<FrameHeader, WireError> {
    let mut magic = [0u8; 4];
    magic.copy_from_slice(&bytes[0..4]);

    let raw = &bytes[4..4 + COMMAND_LEN];
    let end = raw.iter().position(|b| *b == 0).unwrap_or(COMMAND_LEN);
    if raw[end..].iter().any(|b| *b != 0) || !raw[..end].iter().all(u8::is_ascii_graphic) {
        return Err(WireError::MalformedCommand);
    }
    let command = String::from_utf8_lossy(&raw[..end]).into_owned();

    let mut length = [0u8; 4];
    length.copy_from_slice(&bytes[16..20]);
    let mut sum = [0u8; 4];
    sum.copy_from_slice(&bytes[20..24]);

    Ok(FrameHeader {
        magic,
        command,
        length: u32::from_le_bytes(length),
        checksum: sum,
    })
}

/// Read one frame.
///
/// A wrong magic or an oversized length is returned before the payload is
/// read, leaving the stream unusable. A checksum mismatch is returned after
/// the payload is consumed, so the caller may keep reading.
pub async fn read_frame<R>(reader: &mut R, profile: &NetworkProfile) -> Result<Frame, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut raw = [0u8; HEADER_LEN];
    reader.read_exact(&mut raw).await?;
    profile.check_message_start(&raw)?;

    let header = decode_header(&raw)?;
    if header.length > MAX_PAYLOAD_LEN {
        return Err(WireError::Oversized(header.length));
    }

    let mut payload = Vec::new();
    read_payload(reader, header.length, &mut payload).await?;
    if checksum(&payload) != header.checksum {
        return Err(WireError::BadChecksum {
            command: header.command,
        });
    }

    Ok(Frame {
        command: header.command,
        payload,
    })
}

/// Append exactly `length` payload bytes to `buf`.
///
/// The declared length is peer-controlled, so memory is committed as data
/// arrives rather than up front.
async fn read_payload<R>(reader: &mut R, length: u32, buf: &mut Vec<u8>) -> Result<(), WireError>
where
    R: AsyncRead + Unpin,
{
    let length = length as usize;
    buf.reserve(length.min(PAYLOAD_CHUNK));
    let read = (&mut *reader).take(length as u64).read_to_end(buf).await?;
    if read < length {
        return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}

/// Write one frame and flush. Returns the bytes written.
pub async fn write_frame<W>(writer: &mut W, magic: [u8; 4], frame: &Frame) -> Result<u64, WireError>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_frame(magic, frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(bytes.len() as u64)
}
