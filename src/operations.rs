//! Typed leaf operations.
//!
//! Each operation builds its payload, issues one framed request and decodes
//! the body. A status other than `OK` fails with [`CloudError::Request`];
//! a malformed body fails with [`CloudError::Protocol`] naming the operation.

use bytes::Bytes;

use crate::client::CloudClient;
use crate::codec::{PayloadReader, PayloadWriter, MAX_NAME_LEN};
use crate::error::{CloudError, Result};
use crate::node::{DirEntry, FdMode, Node, NodeInfo, NodeType, Rights};
use crate::protocol::opcode;

/// Open file descriptor handle as issued by the server.
pub type Fd = u8;

fn node_payload(node: &Node) -> Bytes {
    Bytes::copy_from_slice(node.as_bytes())
}

fn check_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(CloudError::InvalidArgument(format!(
            "name longer than {} bytes",
            MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn reader(body: Bytes, op: u16) -> PayloadReader {
    PayloadReader::new(body, opcode::name(op))
}

impl CloudClient {
    /// Home node of `user`. An empty user means the caller's own home.
    pub async fn get_home(&self, user: &str) -> Result<Node> {
        let body = self
            .request(opcode::GET_HOME, Bytes::copy_from_slice(user.as_bytes()))
            .await?;
        reader(body, opcode::GET_HOME).get_node()
    }

    /// Children of a directory, in server order.
    pub async fn list_directory(&self, node: &Node) -> Result<Vec<DirEntry>> {
        let body = self
            .request(opcode::LIST_DIRECTORY, node_payload(node))
            .await?;
        let mut body = reader(body, opcode::LIST_DIRECTORY);
        let mut entries = Vec::new();
        while !body.is_empty() {
            let node = body.get_node()?;
            let name = body.get_name()?;
            entries.push(DirEntry { name, node });
        }
        Ok(entries)
    }

    /// Parent of `node`, or `None` for a home root.
    pub async fn get_parent(&self, node: &Node) -> Result<Option<Node>> {
        let body = self.request(opcode::GET_PARENT, node_payload(node)).await?;
        if body.is_empty() {
            return Ok(None);
        }
        reader(body, opcode::GET_PARENT).get_node().map(Some)
    }

    /// Create a file or directory named `name` under `parent`.
    pub async fn make_node(&self, parent: &Node, name: &str, node_type: NodeType) -> Result<Node> {
        let mut payload = PayloadWriter::with_capacity(Node::SIZE + 2 + name.len());
        payload
            .put_node(parent)
            .put_name(name)?
            .put_u8(node_type.as_u8());
        let body = self.request(opcode::MAKE_NODE, payload.freeze()).await?;
        reader(body, opcode::MAKE_NODE).get_node()
    }

    /// Name of the user owning `node`.
    pub async fn get_node_owner(&self, node: &Node) -> Result<String> {
        let body = self
            .request(opcode::GET_NODE_OWNER, node_payload(node))
            .await?;
        reader(body, opcode::GET_NODE_OWNER).rest_string()
    }

    /// Name of the group `node` belongs to.
    pub async fn get_node_group(&self, node: &Node) -> Result<String> {
        let body = self
            .request(opcode::GET_NODE_GROUP, node_payload(node))
            .await?;
        reader(body, opcode::GET_NODE_GROUP).rest_string()
    }

    /// Fresh metadata snapshot of `node`.
    pub async fn get_node_info(&self, node: &Node) -> Result<NodeInfo> {
        let body = self
            .request(opcode::GET_NODE_INFO, node_payload(node))
            .await?;
        let mut body = reader(body, opcode::GET_NODE_INFO);
        let raw_type = body.get_u8()?;
        let node_type = NodeType::from_u8(raw_type).ok_or_else(|| {
            CloudError::Protocol(format!("get_node_info: unknown node type {}", raw_type))
        })?;
        let size = body.get_u64()?;
        let rights = Rights::from_bits_truncate(body.get_u8()?);
        Ok(NodeInfo {
            node_type,
            size,
            rights,
        })
    }

    /// Replace the access rights of `node`.
    pub async fn set_node_rights(&self, node: &Node, rights: Rights) -> Result<()> {
        let mut payload = PayloadWriter::with_capacity(Node::SIZE + 1);
        payload.put_node(node).put_u8(rights.bits());
        self.request(opcode::SET_NODE_RIGHTS, payload.freeze())
            .await
            .map(drop)
    }

    /// Move `node` into `group`.
    pub async fn set_node_group(&self, node: &Node, group: &str) -> Result<()> {
        let mut payload = PayloadWriter::with_capacity(Node::SIZE + group.len());
        payload.put_node(node).put_bytes(group.as_bytes());
        self.request(opcode::SET_NODE_GROUP, payload.freeze())
            .await
            .map(drop)
    }

    /// Delete a file or an empty directory.
    pub async fn delete_node(&self, node: &Node) -> Result<()> {
        self.request(opcode::DELETE_NODE, node_payload(node))
            .await
            .map(drop)
    }

    /// Rename `node` in place.
    pub async fn rename_node(&self, node: &Node, name: &str) -> Result<()> {
        check_name(name)?;
        let mut payload = PayloadWriter::with_capacity(Node::SIZE + name.len());
        payload.put_node(node).put_bytes(name.as_bytes());
        self.request(opcode::RENAME_NODE, payload.freeze())
            .await
            .map(drop)
    }

    /// Reparent `node` under `new_parent`, keeping its name.
    pub async fn move_node(&self, node: &Node, new_parent: &Node) -> Result<()> {
        let mut payload = PayloadWriter::with_capacity(Node::SIZE * 2);
        payload.put_node(node).put_node(new_parent);
        self.request(opcode::MOVE_NODE, payload.freeze())
            .await
            .map(drop)
    }

    /// Clone `node` next to itself under a new name.
    pub async fn copy_node(&self, node: &Node, name: &str) -> Result<Node> {
        check_name(name)?;
        let mut payload = PayloadWriter::with_capacity(Node::SIZE + name.len());
        payload.put_node(node).put_bytes(name.as_bytes());
        let body = self.request(opcode::COPY_NODE, payload.freeze()).await?;
        reader(body, opcode::COPY_NODE).get_node()
    }

    /// Members of the caller's group.
    pub async fn group_list(&self) -> Result<Vec<String>> {
        let body = self.request(opcode::GROUP_LIST, Bytes::new()).await?;
        let mut body = reader(body, opcode::GROUP_LIST);
        let mut members = Vec::new();
        while !body.is_empty() {
            members.push(body.get_name()?);
        }
        Ok(members)
    }

    /// Add `user` to the caller's group.
    pub async fn group_invite(&self, user: &str) -> Result<()> {
        self.request(opcode::GROUP_INVITE, Bytes::copy_from_slice(user.as_bytes()))
            .await
            .map(drop)
    }

    /// Remove `user` from the caller's group.
    pub async fn group_kick(&self, user: &str) -> Result<()> {
        self.request(opcode::GROUP_KICK, Bytes::copy_from_slice(user.as_bytes()))
            .await
            .map(drop)
    }

    /// Open a file for reading or writing.
    pub async fn fd_open(&self, node: &Node, mode: FdMode) -> Result<Fd> {
        let mut payload = PayloadWriter::with_capacity(Node::SIZE + 1);
        payload.put_node(node).put_u8(mode.as_u8());
        let body = self.request(opcode::FD_OPEN, payload.freeze()).await?;
        reader(body, opcode::FD_OPEN).get_u8()
    }

    /// Release a descriptor from [`fd_open`](Self::fd_open).
    pub async fn fd_close(&self, fd: Fd) -> Result<()> {
        self.request(opcode::FD_CLOSE, Bytes::copy_from_slice(&[fd]))
            .await
            .map(drop)
    }

    /// Read up to `buf.len()` bytes in one frame. Returns the number of bytes
    /// the server sent; fewer than requested means end of file.
    pub async fn fd_read(&self, fd: Fd, buf: &mut [u8]) -> Result<usize> {
        let wanted = u32::try_from(buf.len()).map_err(|_| {
            CloudError::InvalidArgument("short read larger than one frame".to_string())
        })?;
        let mut payload = PayloadWriter::with_capacity(5);
        payload.put_u8(fd).put_u32(wanted);
        let body = self.request(opcode::FD_READ, payload.freeze()).await?;
        if body.len() > buf.len() {
            return Err(CloudError::Protocol(format!(
                "fd_read: {} bytes returned for a {} byte read",
                body.len(),
                buf.len()
            )));
        }
        buf[..body.len()].copy_from_slice(&body);
        Ok(body.len())
    }

    /// Write `data` in one frame.
    pub async fn fd_write(&self, fd: Fd, data: &[u8]) -> Result<()> {
        let mut payload = PayloadWriter::with_capacity(1 + data.len());
        payload.put_u8(fd).put_bytes(data);
        self.request(opcode::FD_WRITE, payload.freeze())
            .await
            .map(drop)
    }
}
