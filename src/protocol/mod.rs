//! Protocol module - wire format, framing, opcodes and statuses.
//!
//! This module implements the binary protocol of the control channel:
//! - 14-byte request/response header encoding/decoding
//! - Exact-length async frame reads and single-write frame writes
//! - The init handshake frame that precedes multiplexing
//! - Opcode table and status taxonomy

mod frame;
pub mod opcode;
pub mod status;
mod wire_format;

pub use frame::{
    build_request_frame, build_response_frame, read_init, read_init_status, read_request,
    read_response, write_init, write_request, write_response, Request, Response,
};
pub use wire_format::{
    decode_init_header, encode_init_header, validate_length, RequestHeader, ResponseHeader,
    DEFAULT_MAX_BODY_SIZE, HEADER_SIZE, INIT_HEADER_SIZE,
};
