//! Node identifiers and the metadata the server reports about them.
//!
//! A [`Node`] is an opaque 128-bit ID issued by the server. Its textual form
//! is 32 lowercase hex digits, byte order as on the wire.
//!
//! # Example
//!
//! ```
//! use cloud9_client::{Node, Rights};
//!
//! let node: Node = "000102030405060708090a0b0c0d0e0f".parse().unwrap();
//! assert_eq!(node.as_bytes()[15], 0x0f);
//!
//! let rights: Rights = "1010".parse().unwrap();
//! assert!(rights.contains(Rights::GROUP_READ | Rights::ALL_READ));
//! assert_eq!(rights.to_string(), "1010");
//! ```

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CloudError, Result};

/// Opaque 128-bit identifier of a file or directory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Node([u8; Node::SIZE]);

impl Node {
    /// Size of a node ID on the wire.
    pub const SIZE: usize = 16;

    /// Create a node from its raw bytes.
    #[inline]
    pub const fn from_bytes(bytes: [u8; Node::SIZE]) -> Self {
        Node(bytes)
    }

    /// Raw bytes, as sent on the wire.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; Node::SIZE] {
        &self.0
    }

    /// Parse the 32-hex-digit textual form.
    pub fn from_hex(text: &str) -> Result<Self> {
        if text.len() != Node::SIZE * 2 {
            return Err(CloudError::InvalidArgument(format!(
                "node id must be {} hex digits, got '{}'",
                Node::SIZE * 2,
                text
            )));
        }
        let mut bytes = [0u8; Node::SIZE];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|_| CloudError::InvalidArgument(format!("invalid node id '{}'", text)))?;
        Ok(Node(bytes))
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.to_hex())
    }
}

impl FromStr for Node {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self> {
        Node::from_hex(s)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Node::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// Kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

impl NodeType {
    /// Wire value.
    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            NodeType::File => 0,
            NodeType::Directory => 1,
        }
    }

    /// Decode a wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeType::File),
            1 => Some(NodeType::Directory),
            _ => None,
        }
    }
}

bitflags! {
    /// Permission mask of a node. The owner always has full rights.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Rights: u8 {
        const GROUP_READ = 0b0001;
        const GROUP_WRITE = 0b0010;
        const ALL_READ = 0b0100;
        const ALL_WRITE = 0b1000;
    }
}

/// Text order of the rights flags.
const RIGHTS_ORDER: [Rights; 4] = [
    Rights::GROUP_READ,
    Rights::GROUP_WRITE,
    Rights::ALL_READ,
    Rights::ALL_WRITE,
];

impl fmt::Display for Rights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in RIGHTS_ORDER {
            f.write_str(if self.contains(flag) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Rights {
    type Err = CloudError;

    /// Parse exactly four `0`/`1` characters: group-read, group-write,
    /// any-read, any-write.
    fn from_str(s: &str) -> Result<Self> {
        if s.len() != RIGHTS_ORDER.len() {
            return Err(CloudError::InvalidArgument(format!("invalid rights '{}'", s)));
        }
        let mut rights = Rights::empty();
        for (c, flag) in s.chars().zip(RIGHTS_ORDER) {
            match c {
                '1' => rights |= flag,
                '0' => {}
                _ => return Err(CloudError::InvalidArgument(format!("invalid rights '{}'", s))),
            }
        }
        Ok(rights)
    }
}

impl Serialize for Rights {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Snapshot of a node's metadata. Never cached; fetch again to observe changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub size: u64,
    pub rights: Rights,
}

impl NodeInfo {
    #[inline]
    pub fn is_directory(&self) -> bool {
        self.node_type == NodeType::Directory
    }
}

/// One child returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    pub name: String,
    pub node: Node,
}

/// Mode a file descriptor is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdMode {
    Read,
    Write,
}

impl FdMode {
    /// Wire value.
    #[inline]
    pub fn as_u8(self) -> u8 {
        match self {
            FdMode::Read => 0,
            FdMode::Write => 1,
        }
    }
}
