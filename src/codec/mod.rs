//! Codec module - body encoding/decoding for framed requests.
//!
//! - [`PayloadWriter`] - builds request payloads (`BufMut`)
//! - [`PayloadReader`] - decodes response bodies (`Buf`), failing with a
//!   protocol error that names the operation on truncated input
//!
//! # Design
//!
//! Layouts are fixed per operation, so the codec is a pair of cursors rather
//! than a serialization framework.

mod payload;

pub use payload::{PayloadReader, PayloadWriter, MAX_NAME_LEN};
