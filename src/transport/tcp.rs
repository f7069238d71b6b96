//! TCP connection establishment and `[user@]host[:port]` targets.
//!
//! TLS termination is left to the embedding application: anything that is
//! `AsyncRead + AsyncWrite` can be handed to the client as a [`Connection`].
//!
//! # Example
//!
//! ```ignore
//! use cloud9_client::transport::{connect, ConnectOptions, Target};
//!
//! let target = Target::parse("alice@files.example.org:4449")?;
//! let conn = connect(&target.host, target.port_or(ConnectOptions::default())).await?;
//! ```

use tokio::io::{AsyncRead, AsyncWrite, BufStream};
use tokio::net::TcpStream;

use crate::error::{CloudError, Result};

/// Default server port.
pub const DEFAULT_PORT: u16 = 4449;

/// Default size of the read and write buffers wrapped around the socket (1 MiB).
pub const DEFAULT_NET_BUFFER_SIZE: usize = 1024 * 1024;

/// Separates the login from the host in a target string.
pub const LOGIN_DIV: char = '@';

/// A duplex, ordered, reliable byte stream the client can run over.
///
/// Closing is done by dropping/shutting down the stream; the client's
/// background reader then observes EOF and declares the connection lost.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Options for [`connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub port: u16,
    pub net_buffer_size: usize,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            net_buffer_size: DEFAULT_NET_BUFFER_SIZE,
        }
    }
}

impl ConnectOptions {
    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the size of the socket read/write buffers.
    pub fn net_buffer_size(mut self, size: usize) -> Self {
        self.net_buffer_size = size;
        self
    }
}

/// Open a buffered TCP connection to `host`.
pub async fn connect(host: &str, options: &ConnectOptions) -> Result<BufStream<TcpStream>> {
    if options.net_buffer_size == 0 {
        return Err(CloudError::InvalidArgument(
            "network buffer size is too small".to_string(),
        ));
    }
    let stream = TcpStream::connect((host, options.port)).await?;
    stream.set_nodelay(true)?;
    tracing::debug!(host, port = options.port, "connected");
    Ok(BufStream::with_capacity(
        options.net_buffer_size,
        options.net_buffer_size,
        stream,
    ))
}

/// Parsed `[user@]host[:port]` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub login: Option<String>,
    pub host: String,
    pub port: Option<u16>,
}

impl Target {
    /// Parse a target string.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let (login, rest) = match text.split_once(LOGIN_DIV) {
            Some((login, rest)) => (Some(login.to_string()), rest),
            None => (None, text),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| CloudError::InvalidArgument(format!("invalid port '{}'", port)))?;
                (host, Some(port))
            }
            None => (rest, None),
        };
        if host.is_empty() {
            return Err(CloudError::InvalidArgument("no target specified".to_string()));
        }
        Ok(Self {
            login,
            host: host.to_string(),
            port,
        })
    }

    /// Login from the target, falling back to `$USER`.
    pub fn login_or_env(&self) -> Option<String> {
        self.login
            .clone()
            .or_else(|| std::env::var("USER").ok())
    }

    /// Connect options with this target's port applied, if any.
    pub fn port_or(&self, options: ConnectOptions) -> ConnectOptions {
        match self.port {
            Some(port) => options.port(port),
            None => options,
        }
    }
}
