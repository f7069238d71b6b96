//! # cloud9-client
//!
//! Async client engine for the Cloud9 remote node store protocol.
//!
//! The server exposes a tree of files and directories addressed by opaque
//! 128-bit [`Node`] IDs. This crate multiplexes many concurrent requests
//! over one connection and supports the raw bulk-transfer mode used for
//! large file I/O.
//!
//! ## Architecture
//!
//! - **Framed mode**: 14-byte headers, requests correlated to responses by
//!   ID; one background task reads and dispatches responses
//! - **Raw mode**: after a `SWITCH_OK`, a declared number of unframed bytes
//!   flows while all framed traffic is held back
//! - **Paths**: `#<hex>` / `~user` / relative paths resolved through
//!   directory listings
//!
//! ## Example
//!
//! ```ignore
//! use cloud9_client::{transport, CloudClient, FdMode};
//!
//! #[tokio::main]
//! async fn main() -> cloud9_client::Result<()> {
//!     let target = transport::Target::parse("alice@files.local")?;
//!     let options = target.port_or(Default::default());
//!     let conn = transport::connect(&target.host, &options).await?;
//!
//!     let client = CloudClient::builder()
//!         .login("alice")
//!         .authenticate(conn, || Ok(std::env::var("CLOUD9_PASSWORD").unwrap_or_default()))
//!         .await?;
//!
//!     let home = client.get_home("").await?;
//!     let file = client.resolve_path(&home, "docs/report.txt").await?.node;
//!     let fd = client.fd_open(&file, FdMode::Read).await?;
//!     let size = client.get_node_info(&file).await?.size;
//!     let mut data = Vec::new();
//!     client
//!         .fd_read_long(fd, size, 64 * 1024, |chunk| {
//!             data.extend_from_slice(chunk);
//!             Ok(())
//!         })
//!         .await?;
//!     client.fd_close(fd).await?;
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod error;
pub mod node;
pub mod path;
pub mod protocol;
pub mod transport;

mod bulk;
mod client;
mod operations;
mod pending;

#[cfg(test)]
mod test_support;

pub use client::{ClientBuilder, CloudClient, DEFAULT_MAX_IN_FLIGHT};
pub use error::{CloudError, Result};
pub use node::{DirEntry, FdMode, Node, NodeInfo, NodeType, Rights};
pub use operations::Fd;
pub use path::ResolvedPath;
pub use protocol::DEFAULT_MAX_BODY_SIZE;
