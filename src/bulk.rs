//! Bulk transfers over raw mode.
//!
//! A bulk request names an open descriptor and a byte count. Once the server
//! answers `SWITCH_OK`, exactly that many unframed bytes follow on the
//! stream (server to client for reads, client to server for writes) and
//! framed traffic resumes. Nothing else is written or parsed meanwhile: the
//! transfer owns the link lock and the listener's read half until the count
//! is reached.
//!
//! Any failure once raw mode is entered leaves the stream out of sync, so it
//! ends the whole session with [`CloudError::NotConnected`].

use std::io;

use crate::client::CloudClient;
use crate::codec::PayloadWriter;
use crate::error::{CloudError, Result};
use crate::operations::Fd;
use crate::protocol::opcode;

fn bulk_payload(fd: Fd, count: u64) -> bytes::Bytes {
    let mut payload = PayloadWriter::with_capacity(9);
    payload.put_u8(fd).put_u64(count);
    payload.freeze()
}

fn chunk_buffer(buf_size: usize, count: u64) -> Result<Vec<u8>> {
    if buf_size == 0 {
        return Err(CloudError::InvalidArgument(
            "bulk buffer size must be at least 1".to_string(),
        ));
    }
    let len = (buf_size as u64).min(count) as usize;
    Ok(vec![0u8; len])
}

impl CloudClient {
    /// Read exactly `count` bytes from `fd`, handing them to `sink` in chunks
    /// of at most `buf_size` bytes.
    ///
    /// If `sink` fails, the remaining bytes are still drained so the stream
    /// stays usable, and the first sink error is returned.
    pub async fn fd_read_long<F>(&self, fd: Fd, count: u64, buf_size: usize, mut sink: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> io::Result<()>,
    {
        let mut buf = chunk_buffer(buf_size, count)?;
        let mut session = self
            .switch_to_raw(opcode::FD_READ_LONG, bulk_payload(fd, count))
            .await?;

        let mut remaining = count;
        let mut sink_error = None;
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            session.read_exact(&mut buf[..chunk]).await?;
            remaining -= chunk as u64;
            if sink_error.is_none() {
                if let Err(e) = sink(&buf[..chunk]) {
                    tracing::warn!(fd, remaining, error = %e, "bulk read sink failed, draining");
                    sink_error = Some(e);
                }
            }
        }
        session.finish().await?;
        tracing::debug!(fd, count, "bulk read complete");

        match sink_error {
            Some(e) => Err(CloudError::Io(e)),
            None => Ok(()),
        }
    }

    /// Write exactly `count` bytes to `fd`. `source` fills the buffer it is
    /// given (at most `buf_size` bytes) and returns how many bytes it wrote.
    ///
    /// The declared count is a commitment: if `source` fails or returns 0
    /// before `count` bytes were sent, the session is ended.
    pub async fn fd_write_long<F>(
        &self,
        fd: Fd,
        count: u64,
        buf_size: usize,
        mut source: F,
    ) -> Result<()>
    where
        F: FnMut(&mut [u8]) -> io::Result<usize>,
    {
        let mut buf = chunk_buffer(buf_size, count)?;
        let mut session = self
            .switch_to_raw(opcode::FD_WRITE_LONG, bulk_payload(fd, count))
            .await?;

        let mut remaining = count;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let filled = match source(&mut buf[..want]) {
                Ok(0) => Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended {} bytes early", remaining),
                )),
                Ok(n) if n > want => Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("source reported {} bytes for a {} byte buffer", n, want),
                )),
                other => other,
            };
            let n = match filled {
                Ok(n) => n,
                Err(e) => {
                    tracing::error!(fd, remaining, error = %e, "bulk write source failed");
                    session.poison().await;
                    return Err(CloudError::Io(e));
                }
            };
            session.write_all(&buf[..n]).await?;
            remaining -= n as u64;
        }
        session.finish().await?;
        tracing::debug!(fd, count, "bulk write complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::status;
    use crate::test_support::{answer, session};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_read_long_chunks() {
        let (client, mut server) = session().await;
        let data: Vec<u8> = (0..10u8).collect();
        let served = data.clone();
        let server_task = tokio::spawn(async move {
            let request = answer(&mut server, status::SWITCH_OK, &[]).await;
            server.write_all(&served).await.unwrap();
            // Framed traffic resumes right after the raw bytes.
            answer(&mut server, status::OK, &[]).await;
            (request, server)
        });

        let mut chunks = Vec::new();
        client
            .fd_read_long(2, 10, 4, |chunk| {
                chunks.push(chunk.to_vec());
                Ok(())
            })
            .await
            .unwrap();
        client.fd_close(2).await.unwrap();

        let (request, _server) = server_task.await.unwrap();
        assert_eq!(request.opcode, opcode::FD_READ_LONG);
        assert_eq!(&request.payload[..], &[2, 0, 0, 0, 0, 0, 0, 0, 10]);
        assert_eq!(
            chunks.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_read_long_sink_error_drains() {
        let (client, mut server) = session().await;
        let server_task = tokio::spawn(async move {
            answer(&mut server, status::SWITCH_OK, &[]).await;
            server.write_all(&[9u8; 6]).await.unwrap();
            answer(&mut server, status::OK, &[]).await;
            server
        });

        let mut calls = 0;
        let err = client
            .fd_read_long(1, 6, 2, |_| {
                calls += 1;
                Err(io::Error::new(io::ErrorKind::Other, "disk full"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Io(_)));
        assert_eq!(calls, 1);
        assert!(client.is_connected());
        client.fd_close(1).await.unwrap();
        let _server = server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_read_long_refused() {
        let (client, mut server) = session().await;
        let (result, _) = tokio::join!(
            client.fd_read_long(1, 100, 10, |_| Ok(())),
            answer(&mut server, status::ERR_BAD_FD, &[])
        );
        assert_eq!(result.unwrap_err().status(), Some(status::ERR_BAD_FD));
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_read_long_connection_lost_mid_transfer() {
        let (client, mut server) = session().await;
        tokio::spawn(async move {
            answer(&mut server, status::SWITCH_OK, &[]).await;
            server.write_all(&[1u8; 3]).await.unwrap();
        });

        let err = client
            .fd_read_long(1, 10, 4, |_| Ok(()))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(!client.is_connected());
        assert!(matches!(
            client.get_home("").await,
            Err(CloudError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_write_long_sends_exact_count() {
        let (client, mut server) = session().await;
        let server_task = tokio::spawn(async move {
            let request = answer(&mut server, status::SWITCH_OK, &[]).await;
            let mut raw = vec![0u8; 7];
            server.read_exact(&mut raw).await.unwrap();
            let next = answer(&mut server, status::OK, &[]).await;
            (request, raw, next, server)
        });

        let mut source = &b"abcdefg"[..];
        client
            .fd_write_long(4, 7, 3, |buf| {
                let n = buf.len().min(source.len());
                buf[..n].copy_from_slice(&source[..n]);
                source = &source[n..];
                Ok(n)
            })
            .await
            .unwrap();
        client.fd_close(4).await.unwrap();

        let (request, raw, next, _server) = server_task.await.unwrap();
        assert_eq!(request.opcode, opcode::FD_WRITE_LONG);
        assert_eq!(raw, b"abcdefg");
        assert_eq!(next.opcode, opcode::FD_CLOSE);
    }

    #[tokio::test]
    async fn test_write_long_short_source_ends_session() {
        let (client, mut server) = session().await;
        let server_task = tokio::spawn(async move {
            answer(&mut server, status::SWITCH_OK, &[]).await;
            server
        });

        let mut sent = false;
        let err = client
            .fd_write_long(4, 100, 16, |buf| {
                if sent {
                    return Ok(0);
                }
                sent = true;
                buf.fill(1);
                Ok(buf.len())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CloudError::Io(_)));
        assert!(!client.is_connected());
        let _server = server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_buffer_rejected() {
        let (client, _server) = session().await;
        let result = client.fd_write_long(1, 10, 0, |_| Ok(0)).await;
        assert!(matches!(result, Err(CloudError::InvalidArgument(_))));
        assert!(client.is_connected());
    }
}
