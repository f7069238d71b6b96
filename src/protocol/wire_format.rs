//! Wire format encoding and decoding.
//!
//! Control channel headers are 14 bytes:
//! ```text
//! request:  ┌──────────┬──────────┬──────────┐
//!           │ Req ID   │ Opcode   │ Length   │
//!           │ uint32 BE│ uint16 BE│ uint64 BE│
//!           └──────────┴──────────┴──────────┘
//! response: ┌──────────┬──────────┬──────────┐
//!           │ Req ID   │ Status   │ Length   │
//!           │ uint32 BE│ uint16 BE│ uint64 BE│
//!           └──────────┴──────────┴──────────┘
//! ```
//!
//! The init handshake precedes multiplexing and uses a 10-byte header
//! (`uint16 command | uint64 length`) answered by a bare `uint16` status.
//!
//! All multi-byte integers are Big Endian.

use crate::error::{CloudError, Result};

/// Request/response header size in bytes (fixed, exactly 14).
pub const HEADER_SIZE: usize = 14;

/// Init handshake header size in bytes.
pub const INIT_HEADER_SIZE: usize = 10;

/// Default maximum response body accepted from the server (64 MiB).
pub const DEFAULT_MAX_BODY_SIZE: u64 = 64 * 1024 * 1024;

/// Header of a request frame written by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Correlation ID allocated by the dispatcher.
    pub id: u32,
    /// Operation code (see `opcode`).
    pub opcode: u16,
    /// Payload length in bytes.
    pub length: u64,
}

impl RequestHeader {
    /// Create a new request header.
    pub fn new(id: u32, opcode: u16, length: u64) -> Self {
        Self { id, opcode, length }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use cloud9_client::protocol::{RequestHeader, HEADER_SIZE};
    ///
    /// let bytes = RequestHeader::new(7, 2, 16).encode();
    /// assert_eq!(bytes.len(), HEADER_SIZE);
    /// assert_eq!(&bytes[0..4], &[0, 0, 0, 7]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        encode_parts(self.id, self.opcode, self.length)
    }

    /// Decode header from bytes. Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let (id, opcode, length) = decode_parts(buf)?;
        Some(Self { id, opcode, length })
    }

    /// Decode header from an exactly-sized buffer.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let (id, opcode, length) = split_header(buf);
        Self { id, opcode, length }
    }
}

/// Header of a response frame sent by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// ID of the request this response answers.
    pub id: u32,
    /// Request status (see `status`).
    pub status: u16,
    /// Body length in bytes.
    pub length: u64,
}

impl ResponseHeader {
    /// Create a new response header.
    pub fn new(id: u32, status: u16, length: u64) -> Self {
        Self { id, status, length }
    }

    /// Encode header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        encode_parts(self.id, self.status, self.length)
    }

    /// Decode header from bytes. Returns `None` if buffer is too short.
    ///
    /// # Example
    ///
    /// ```
    /// use cloud9_client::protocol::ResponseHeader;
    ///
    /// let bytes = [0, 0, 0, 42, 0, 0, 0, 0, 0, 0, 0, 0, 0, 16];
    /// let header = ResponseHeader::decode(&bytes).unwrap();
    /// assert_eq!(header.id, 42);
    /// assert_eq!(header.status, 0);
    /// assert_eq!(header.length, 16);
    /// ```
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let (id, status, length) = decode_parts(buf)?;
        Some(Self { id, status, length })
    }

    /// Decode header from an exactly-sized buffer.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        let (id, status, length) = split_header(buf);
        Self { id, status, length }
    }

    /// Reject bodies larger than the configured limit.
    pub fn validate(&self, max_body_size: u64) -> Result<()> {
        validate_length(self.length, max_body_size)
    }
}

/// Reject a declared payload/body length above `max`.
pub fn validate_length(length: u64, max: u64) -> Result<()> {
    if length > max {
        return Err(CloudError::Protocol(format!(
            "Body size {} exceeds maximum {}",
            length, max
        )));
    }
    Ok(())
}

/// Encode the init handshake header.
pub fn encode_init_header(command: u16, length: u64) -> [u8; INIT_HEADER_SIZE] {
    let mut buf = [0u8; INIT_HEADER_SIZE];
    buf[0..2].copy_from_slice(&command.to_be_bytes());
    buf[2..10].copy_from_slice(&length.to_be_bytes());
    buf
}

/// Decode the init handshake header.
pub fn decode_init_header(buf: &[u8]) -> Option<(u16, u64)> {
    let buf = buf.get(..INIT_HEADER_SIZE)?;
    let command = u16::from_be_bytes([buf[0], buf[1]]);
    let mut length = [0u8; 8];
    length.copy_from_slice(&buf[2..10]);
    Some((command, u64::from_be_bytes(length)))
}

fn encode_parts(id: u32, code: u16, length: u64) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&id.to_be_bytes());
    buf[4..6].copy_from_slice(&code.to_be_bytes());
    buf[6..14].copy_from_slice(&length.to_be_bytes());
    buf
}

fn decode_parts(buf: &[u8]) -> Option<(u32, u16, u64)> {
    let fixed: &[u8; HEADER_SIZE] = buf.get(..HEADER_SIZE)?.try_into().ok()?;
    Some(split_header(fixed))
}

fn split_header(buf: &[u8; HEADER_SIZE]) -> (u32, u16, u64) {
    let id = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let code = u16::from_be_bytes([buf[4], buf[5]]);
    let mut length = [0u8; 8];
    length.copy_from_slice(&buf[6..14]);
    (id, code, u64::from_be_bytes(length))
}
