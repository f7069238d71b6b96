//! Error types for cloud9-client.

use thiserror::Error;

use crate::protocol::status;

/// Main error type for all client operations.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The authentication/registration handshake was rejected.
    #[error("{desc}")]
    Init {
        /// Raw init status code sent by the server.
        status: u16,
        /// Human-readable description of the status.
        desc: String,
    },

    /// A framed request completed with a non-success status.
    #[error("{}", describe_request(.status, .info))]
    Request {
        /// Raw request status code sent by the server.
        status: u16,
        /// Optional caller-side context (offending path segment, etc.).
        info: String,
    },

    /// The connection was lost; every further operation fails the same way.
    #[error("not connected")]
    NotConnected,

    /// A path could not be resolved to a node.
    #[error("{0}")]
    Path(String),

    /// Malformed frame or body, or a link state violation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Argument rejected locally before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Local I/O error (connect, bulk transfer callbacks).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CloudError {
    /// Build an init error from a raw handshake status.
    pub fn init(status: u16) -> Self {
        CloudError::Init {
            status,
            desc: status::init_status_string(status),
        }
    }

    /// Build a request error without extra context.
    pub fn request(status: u16) -> Self {
        CloudError::Request {
            status,
            info: String::new(),
        }
    }

    /// Build a request error carrying caller context.
    pub fn request_with_info(status: u16, info: impl Into<String>) -> Self {
        CloudError::Request {
            status,
            info: info.into(),
        }
    }

    /// Status code carried by `Init` and `Request` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudError::Init { status, .. } | CloudError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the whole session is unusable (connection lost).
    pub fn is_fatal(&self) -> bool {
        matches!(self, CloudError::NotConnected)
    }
}

fn describe_request(status: &u16, info: &str) -> String {
    let desc = status::request_status_string(*status);
    if info.is_empty() {
        desc
    } else {
        format!("{} ({})", desc, info)
    }
}

/// Result type alias using CloudError.
pub type Result<T> = std::result::Result<T, CloudError>;
