//! Request and response frames and their async I/O.
//!
//! Frames are read with exact-length reads only: the reader never consumes a
//! byte past the end of the current frame, so the stream can be handed over
//! to a raw transfer right after a `SWITCH_OK` response.
//!
//! # Example
//!
//! ```
//! use cloud9_client::protocol::{build_request_frame, Request, HEADER_SIZE};
//! use bytes::Bytes;
//!
//! let request = Request::new(3, 1, Bytes::from_static(b"alice"));
//! let bytes = build_request_frame(&request);
//! assert_eq!(bytes.len(), HEADER_SIZE + 5);
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::wire_format::{
    decode_init_header, encode_init_header, validate_length, RequestHeader, ResponseHeader,
    HEADER_SIZE, INIT_HEADER_SIZE,
};
use crate::error::{CloudError, Result};

/// A request frame, built per call and dropped once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u32,
    pub opcode: u16,
    pub payload: Bytes,
}

impl Request {
    pub fn new(id: u32, opcode: u16, payload: Bytes) -> Self {
        Self {
            id,
            opcode,
            payload,
        }
    }

    /// Header describing this request.
    #[inline]
    pub fn header(&self) -> RequestHeader {
        RequestHeader::new(self.id, self.opcode, self.payload.len() as u64)
    }
}

/// A response frame, delivered exactly once to the caller that owns `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: u32,
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(id: u32, status: u16, body: Bytes) -> Self {
        Self { id, status, body }
    }

    /// Get a reference to the body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Header describing this response.
    #[inline]
    pub fn header(&self) -> ResponseHeader {
        ResponseHeader::new(self.id, self.status, self.body.len() as u64)
    }
}

/// Build a complete request frame as a single byte vector.
pub fn build_request_frame(request: &Request) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + request.payload.len());
    buf.extend_from_slice(&request.header().encode());
    buf.extend_from_slice(&request.payload);
    buf
}

/// Build a complete response frame as a single byte vector.
pub fn build_response_frame(response: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + response.body.len());
    buf.extend_from_slice(&response.header().encode());
    buf.extend_from_slice(&response.body);
    buf
}

/// Write one request frame with a single contiguous write, then flush.
pub async fn write_request<W>(writer: &mut W, request: &Request) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&build_request_frame(request)).await?;
    writer.flush().await?;
    Ok(())
}

/// Write one response frame, then flush.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    writer.write_all(&build_response_frame(response)).await?;
    writer.flush().await?;
    Ok(())
}

/// Read exactly one response frame.
///
/// Bodies larger than `max_body_size` are rejected before allocation.
pub async fn read_response<R>(reader: &mut R, max_body_size: u64) -> Result<Response>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;
    let header = ResponseHeader::from_bytes(&header_buf);
    header.validate(max_body_size)?;
    let body = read_body(reader, header.length).await?;
    Ok(Response::new(header.id, header.status, body))
}

/// Read exactly one request frame.
pub async fn read_request<R>(reader: &mut R, max_payload_size: u64) -> Result<Request>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header_buf = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;
    let header = RequestHeader::from_bytes(&header_buf);
    validate_length(header.length, max_payload_size)?;
    let payload = read_body(reader, header.length).await?;
    Ok(Request::new(header.id, header.opcode, payload))
}

/// Write the init handshake frame (`command | length | body`).
pub async fn write_init<W>(writer: &mut W, command: u16, body: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(INIT_HEADER_SIZE + body.len());
    buf.extend_from_slice(&encode_init_header(command, body.len() as u64));
    buf.extend_from_slice(body);
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Read the init handshake frame. Used by servers and test harnesses.
pub async fn read_init<R>(reader: &mut R, max_body_size: u64) -> Result<(u16, Bytes)>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header_buf = [0u8; INIT_HEADER_SIZE];
    reader.read_exact(&mut header_buf).await?;
    let (command, length) = decode_init_header(&header_buf)
        .ok_or_else(|| CloudError::Protocol("short init header".to_string()))?;
    validate_length(length, max_body_size)?;
    let body = read_body(reader, length).await?;
    Ok((command, body))
}

/// Read the bare `u16` status that answers the init frame.
pub async fn read_init_status<R>(reader: &mut R) -> Result<u16>
where
    R: AsyncRead + Unpin + ?Sized,
{
    Ok(reader.read_u16().await?)
}

async fn read_body<R>(reader: &mut R, length: u64) -> Result<Bytes>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if length == 0 {
        return Ok(Bytes::new());
    }
    let mut body = vec![0u8; length as usize];
    reader.read_exact(&mut body).await?;
    Ok(Bytes::from(body))
}
