//! Wire envelope shared by the login and gateway listeners.
//!
//! Every frame starts with a fixed 17 byte big-endian header:
//!
//! ```text
//! | u32 total_len | u8 version | i32 command_id | u32 user_id | i32 seq_or_result | body... |
//! ```
//!
//! `total_len` counts the whole frame including its own four bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Size of the fixed header in bytes
pub const HEADER_LEN: usize = 17;

/// Version byte written into every outgoing header
pub const PROTOCOL_VERSION: u8 = 0x31;

/// Largest frame a peer may declare (1 MiB)
pub const MAX_PACKET_LEN: usize = 1 << 20;

/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 5000;

/// Default login port
pub const DEFAULT_LOGIN_PORT: u16 = 1863;

/// Default Flash policy port
pub const DEFAULT_POLICY_PORT: u16 = 843;

/// Errors produced while framing or decoding packets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Buffer is shorter than the fixed header
    #[error("malformed packet: {0} bytes is shorter than the {HEADER_LEN} byte header")]
    MalformedPacket(usize),

    /// Declared length is outside the accepted window
    #[error("invalid packet length {0}, accepted range is {HEADER_LEN}..={MAX_PACKET_LEN}")]
    InvalidLength(usize),
}

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Declared total length (header + body)
    pub length: u32,
    pub version: u8,
    pub command_id: i32,
    pub user_id: u32,
    /// Sequence id on requests, result code on responses
    pub seq: i32,
    pub body: Bytes,
}

impl Packet {
    /// Decode a complete frame.
    ///
    /// The body is everything after the header; the declared length is reported
    /// as-is and not cross-checked against the buffer (framing already did that).
    pub fn decode(frame: &[u8]) -> Result<Self, PacketError> {
        if frame.len() < HEADER_LEN {
            return Err(PacketError::MalformedPacket(frame.len()));
        }

        let mut header = &frame[..HEADER_LEN];
        let length = header.get_u32();
        let version = header.get_u8();
        let command_id = header.get_i32();
        let user_id = header.get_u32();
        let seq = header.get_i32();

        Ok(Self {
            length,
            version,
            command_id,
            user_id,
            seq,
            body: Bytes::copy_from_slice(&frame[HEADER_LEN..]),
        })
    }
}

/// Build a response frame.
///
/// `result` must be 0 for success; the legacy client treats anything else as
/// an error on most commands.
pub fn encode(command_id: i32, user_id: u32, result: i32, body: &[u8]) -> Bytes {
    let total = HEADER_LEN + body.len();
    let mut buf = BytesMut::with_capacity(total);
    buf.put_u32(total as u32);
    buf.put_u8(PROTOCOL_VERSION);
    buf.put_i32(command_id);
    buf.put_u32(user_id);
    buf.put_i32(result);
    buf.put_slice(body);
    buf.freeze()
}

/// Check a declared frame length against the accepted window.
pub fn validate_length(declared: u32) -> Result<usize, PacketError> {
    let len = declared as usize;
    if !(HEADER_LEN..=MAX_PACKET_LEN).contains(&len) {
        return Err(PacketError::InvalidLength(len));
    }
    Ok(len)
}
