//! Status taxonomy for the init handshake and for framed responses.

// Init handshake

/// Handshake command: authenticate an existing user.
pub const INIT_CMD_AUTH: u16 = 1;
/// Handshake command: register a new user with an invitation code.
pub const INIT_CMD_REGISTER: u16 = 2;

pub const INIT_OK: u16 = 0;
pub const INIT_ERR_AUTH_FAILED: u16 = 1;
pub const INIT_ERR_USER_NOT_FOUND: u16 = 2;
pub const INIT_ERR_USER_EXISTS: u16 = 3;
pub const INIT_ERR_INVALID_INVITE: u16 = 4;
pub const INIT_ERR_MALFORMED: u16 = 5;

// Framed responses

pub const OK: u16 = 0;
/// The server accepted a bulk request and switched to raw mode.
pub const SWITCH_OK: u16 = 1;
pub const ERR_FORBIDDEN: u16 = 2;
pub const ERR_NOT_FOUND: u16 = 3;
pub const ERR_EXISTS: u16 = 4;
pub const ERR_INVALID_NAME: u16 = 5;
pub const ERR_NOT_A_DIRECTORY: u16 = 6;
pub const ERR_NOT_A_FILE: u16 = 7;
pub const ERR_BAD_FD: u16 = 8;
pub const ERR_TOO_MANY_FDS: u16 = 9;
pub const ERR_NOT_EMPTY: u16 = 10;
pub const ERR_MALFORMED: u16 = 11;
pub const ERR_TOO_LARGE: u16 = 12;

/// Describe an init handshake status.
pub fn init_status_string(status: u16) -> String {
    match status {
        INIT_OK => "ok".to_string(),
        INIT_ERR_AUTH_FAILED => "authentication failed".to_string(),
        INIT_ERR_USER_NOT_FOUND => "user not found".to_string(),
        INIT_ERR_USER_EXISTS => "user already exists".to_string(),
        INIT_ERR_INVALID_INVITE => "invalid invitation code".to_string(),
        INIT_ERR_MALFORMED => "malformed handshake".to_string(),
        other => format!("unknown init error ({})", other),
    }
}

/// Describe a framed response status.
pub fn request_status_string(status: u16) -> String {
    match status {
        OK => "ok".to_string(),
        SWITCH_OK => "switched to raw mode".to_string(),
        ERR_FORBIDDEN => "forbidden".to_string(),
        ERR_NOT_FOUND => "not found".to_string(),
        ERR_EXISTS => "already exists".to_string(),
        ERR_INVALID_NAME => "invalid name".to_string(),
        ERR_NOT_A_DIRECTORY => "not a directory".to_string(),
        ERR_NOT_A_FILE => "not a file".to_string(),
        ERR_BAD_FD => "bad file descriptor".to_string(),
        ERR_TOO_MANY_FDS => "too many open file descriptors".to_string(),
        ERR_NOT_EMPTY => "directory not empty".to_string(),
        ERR_MALFORMED => "malformed request".to_string(),
        ERR_TOO_LARGE => "request too large".to_string(),
        other => format!("unknown error ({})", other),
    }
}
