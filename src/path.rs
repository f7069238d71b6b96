//! Path resolution over the remote tree.
//!
//! ```text
//! #<32 hex digits>/a/b     node by ID, then children
//! ~alice/a                 alice's home, then children
//! ~/a                      own home
//! a/../b                   relative to the current node
//! ```
//!
//! Paths are resolved fresh on every call; nothing is cached.

use crate::client::CloudClient;
use crate::error::{CloudError, Result};
use crate::node::{Node, NodeType};
use crate::protocol::status;

/// Sigil selecting addressing by node ID.
pub const NODE_SIGIL: char = '#';
/// Sigil selecting addressing by user home.
pub const HOME_SIGIL: char = '~';
/// Segment separator.
pub const DIVIDER: char = '/';
/// Segment moving to the parent node.
pub const PARENT: &str = "..";
/// Stand-in for a segment whose name could not be listed.
pub const UNKNOWN: &str = "?";

/// Node a path resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPath {
    pub node: Node,
    /// The path ended with a divider (`dir/`): callers may read this as
    /// "the contents of" rather than "the node itself".
    pub trailing_divider: bool,
}

/// True if `path` starts with one of the absolute addressing sigils.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(NODE_SIGIL) || path.starts_with(HOME_SIGIL)
}

/// Split a path at its last divider into the parent path and the final name.
///
/// The parent is `None` when `path` has no divider, meaning the name lives
/// directly under the current node.
///
/// ```
/// use cloud9_client::path::split_parent;
///
/// assert_eq!(split_parent("~alice/docs/a.txt"), (Some("~alice/docs"), "a.txt"));
/// assert_eq!(split_parent("a.txt"), (None, "a.txt"));
/// ```
pub fn split_parent(path: &str) -> (Option<&str>, &str) {
    match path.rfind(DIVIDER) {
        Some(i) => (Some(&path[..i]), &path[i + DIVIDER.len_utf8()..]),
        None => (None, path),
    }
}

fn attach_segment(err: CloudError, segment: &str) -> CloudError {
    match err {
        CloudError::Request { status, info } if info.is_empty() => {
            CloudError::request_with_info(status, segment)
        }
        other => other,
    }
}

impl CloudClient {
    /// Resolve `path` to a node. Relative paths start at `cwd`.
    pub async fn resolve_path(&self, cwd: &Node, path: &str) -> Result<ResolvedPath> {
        let (mut current, rest) = if is_absolute(path) {
            let base_len = path.find(DIVIDER).unwrap_or(path.len());
            let (base, rest) = path.split_at(base_len);
            (self.resolve_base(base).await?, rest)
        } else {
            (*cwd, path)
        };

        for segment in rest.split(DIVIDER).filter(|s| !s.is_empty()) {
            current = if segment == PARENT {
                self.get_parent(&current)
                    .await
                    .map_err(|e| attach_segment(e, segment))?
                    .ok_or_else(|| CloudError::Path(format!("'{}': no parent", segment)))?
            } else {
                self.child_named(&current, segment).await?
            };
        }

        Ok(ResolvedPath {
            node: current,
            trailing_divider: path.ends_with(DIVIDER),
        })
    }

    async fn resolve_base(&self, base: &str) -> Result<Node> {
        if let Some(hex) = base.strip_prefix(NODE_SIGIL) {
            return Node::from_hex(hex).map_err(|_| CloudError::Path(format!("invalid base '{}'", base)));
        }
        if let Some(user) = base.strip_prefix(HOME_SIGIL) {
            return self
                .get_home(user)
                .await
                .map_err(|e| attach_segment(e, base));
        }
        Err(CloudError::Path(format!("invalid base '{}'", base)))
    }

    async fn child_named(&self, parent: &Node, name: &str) -> Result<Node> {
        let entries = self
            .list_directory(parent)
            .await
            .map_err(|e| attach_segment(e, name))?;
        entries
            .into_iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.node)
            .ok_or_else(|| CloudError::Path(format!("'{}' not found", name)))
    }

    /// Path of `node` below its home root, e.g. `/docs/a.txt`. A home root
    /// yields an empty string. Levels whose parent listing is forbidden show
    /// up as `?`.
    pub async fn node_path(&self, node: &Node) -> Result<String> {
        let mut names = Vec::new();
        let mut current = *node;
        while let Some(parent) = self.get_parent(&current).await? {
            let name = match self.list_directory(&parent).await {
                Ok(entries) => match entries.into_iter().find(|e| e.node == current) {
                    Some(entry) => entry.name,
                    None => {
                        tracing::debug!(node = %current, "node missing from its parent listing");
                        UNKNOWN.to_string()
                    }
                },
                Err(e) if e.status() == Some(status::ERR_FORBIDDEN) => UNKNOWN.to_string(),
                Err(e) => return Err(e),
            };
            names.push(name);
            current = parent;
        }

        let mut path = String::new();
        for name in names.iter().rev() {
            path.push(DIVIDER);
            path.push_str(name);
        }
        Ok(path)
    }

    /// Full display path: `~owner/...`.
    pub async fn absolute_node_path(&self, node: &Node) -> Result<String> {
        let owner = self.get_node_owner(node).await?;
        let path = self.node_path(node).await?;
        Ok(format!("{}{}{}", HOME_SIGIL, owner, path))
    }

    /// Create a node at `path`, whose last segment names the new node.
    pub async fn make_node_at(&self, cwd: &Node, path: &str, node_type: NodeType) -> Result<Node> {
        let (parent, name) = match split_parent(path) {
            (Some(parent), name) => (self.resolve_path(cwd, parent).await?.node, name),
            (None, name) => (*cwd, name),
        };
        if name.is_empty() {
            return Err(CloudError::Path(format!("'{}' names no node", path)));
        }
        self.make_node(&parent, name, node_type).await
    }
}
