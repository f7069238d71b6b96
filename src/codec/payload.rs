//! Payload builder and reader for request/response bodies.
//!
//! Builds on `bytes::BufMut` / `bytes::Buf`. All integers are Big Endian;
//! short names are `u8 length | bytes`.
//!
//! # Example
//!
//! ```
//! use cloud9_client::codec::{PayloadReader, PayloadWriter};
//! use cloud9_client::Node;
//!
//! let mut writer = PayloadWriter::new();
//! writer.put_node(&Node::default());
//! writer.put_name("abc").unwrap();
//!
//! let mut reader = PayloadReader::new(writer.freeze(), "example");
//! assert_eq!(reader.get_node().unwrap(), Node::default());
//! assert_eq!(reader.get_name().unwrap(), "abc");
//! assert!(reader.is_empty());
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CloudError, Result};
use crate::node::Node;

/// Longest name encodable with a `u8` length prefix.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Builder for request payloads.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.put_u64(value);
        self
    }

    pub fn put_node(&mut self, node: &Node) -> &mut Self {
        self.buf.put_slice(node.as_bytes());
        self
    }

    /// Append bytes without a length prefix (trailing field).
    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.put_slice(bytes);
        self
    }

    /// Append a `u8`-length-prefixed name.
    pub fn put_name(&mut self, name: &str) -> Result<&mut Self> {
        if name.len() > MAX_NAME_LEN {
            return Err(CloudError::InvalidArgument(format!(
                "name longer than {} bytes",
                MAX_NAME_LEN
            )));
        }
        self.buf.put_u8(name.len() as u8);
        self.buf.put_slice(name.as_bytes());
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish the payload.
    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a response body.
///
/// Every short read fails with `CloudError::Protocol` naming the operation
/// whose body was malformed.
#[derive(Debug)]
pub struct PayloadReader {
    body: Bytes,
    op: &'static str,
}

impl PayloadReader {
    pub fn new(body: Bytes, op: &'static str) -> Self {
        Self { body, op }
    }

    fn need(&self, n: usize, what: &str) -> Result<()> {
        if self.body.remaining() < n {
            return Err(CloudError::Protocol(format!(
                "{}: truncated body while reading {} ({} of {} bytes)",
                self.op,
                what,
                self.body.remaining(),
                n
            )));
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.need(1, "u8")?;
        Ok(self.body.get_u8())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.need(4, "u32")?;
        Ok(self.body.get_u32())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.need(8, "u64")?;
        Ok(self.body.get_u64())
    }

    pub fn get_node(&mut self) -> Result<Node> {
        self.need(Node::SIZE, "node")?;
        let mut bytes = [0u8; Node::SIZE];
        self.body.copy_to_slice(&mut bytes);
        Ok(Node::from_bytes(bytes))
    }

    /// Read a `u8`-length-prefixed name.
    pub fn get_name(&mut self) -> Result<String> {
        let len = self.get_u8()? as usize;
        self.need(len, "name")?;
        let raw = self.body.split_to(len);
        self.text(raw, "name")
    }

    /// Take everything left as text (trailing name field).
    pub fn rest_string(&mut self) -> Result<String> {
        let raw = self.body.split_to(self.body.len());
        self.text(raw, "trailing name")
    }

    fn text(&self, raw: Bytes, what: &str) -> Result<String> {
        String::from_utf8(raw.to_vec()).map_err(|_| {
            CloudError::Protocol(format!("{}: {} is not valid UTF-8", self.op, what))
        })
    }

    /// Take everything left (zero-copy).
    pub fn rest(&mut self) -> Bytes {
        self.body.split_to(self.body.len())
    }

    pub fn remaining(&self) -> usize {
        self.body.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}
