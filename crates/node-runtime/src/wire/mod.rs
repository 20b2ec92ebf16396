//! # Wire Framing
//!
//! The 24-byte message header every peer frame starts with, and the handful
//! of payloads the session loop understands itself.
//!
//! ```text
//! magic[4] | command[12] NUL-padded | length u32 LE | checksum[4]
//! ```
//!
//! The checksum is the first four bytes of SHA-256d over the payload.
//! Anything other than `version`, `verack`, `ping` and `pong` is counted
//! and handed off untouched.

pub mod frame;
pub mod messages;

pub use frame::{
    checksum, decode_header, encode_frame, read_frame, write_frame, Frame, FrameHeader, WireError,
    COMMAND_LEN, HEADER_LEN, MAX_PAYLOAD_LEN,
};
pub use messages::{
    decode_nonce, encode_nonce, NetAddress, VersionMessage, PROTOCOL_VERSION, USER_AGENT,
};
