//! Transport module - the byte stream the client runs over.
//!
//! Provides:
//! - The [`Connection`] trait (any tokio duplex stream)
//! - Buffered TCP connection establishment
//! - `[user@]host[:port]` target parsing

mod tcp;

pub use tcp::{
    connect, ConnectOptions, Connection, Target, DEFAULT_NET_BUFFER_SIZE, DEFAULT_PORT, LOGIN_DIV,
};
