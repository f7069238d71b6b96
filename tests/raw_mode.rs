//! Bulk transfers against framed traffic on the same connection.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::time::timeout;

use cloud9_client::protocol::{opcode, read_request, status};
use cloud9_client::{CloudError, FdMode};
use common::{connect, connect_scripted, node, reply, MockTree};

const PATIENCE: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_read_long_exact_count_in_chunks() {
    let (client, server) = connect(MockTree::sample()).await;
    let file = client.resolve_path(&node(1), "file.txt").await.unwrap().node;
    let size = client.get_node_info(&file).await.unwrap().size;
    let fd = client.fd_open(&file, FdMode::Read).await.unwrap();

    let mut chunks = Vec::new();
    client
        .fd_read_long(fd, size, 4, |chunk| {
            chunks.push(chunk.to_vec());
            Ok(())
        })
        .await
        .unwrap();
    client.fd_close(fd).await.unwrap();

    assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![4, 4, 3]);
    assert_eq!(chunks.concat(), b"hello world");
    assert_eq!(
        server.log.lock().opcodes,
        vec![
            opcode::LIST_DIRECTORY,
            opcode::GET_NODE_INFO,
            opcode::FD_OPEN,
            opcode::FD_READ_LONG,
            opcode::FD_CLOSE
        ]
    );
}

/// A request issued mid-write is held until every raw byte is out.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_framed_request_waits_for_bulk_write() {
    let (client, server) = connect(MockTree::sample()).await;
    let client = Arc::new(client);
    let started = Arc::new(Notify::new());
    let fd = client.fd_open(&node(5), FdMode::Write).await.unwrap();

    let other = {
        let client = client.clone();
        let started = started.clone();
        tokio::spawn(async move {
            started.notified().await;
            client.get_home("alice").await
        })
    };

    let payload: Vec<u8> = (0..64u8).collect();
    let mut offset = 0;
    client
        .fd_write_long(fd, payload.len() as u64, 8, |buf| {
            if offset == 0 {
                started.notify_one();
            }
            std::thread::sleep(Duration::from_millis(5));
            buf.copy_from_slice(&payload[offset..offset + buf.len()]);
            offset += buf.len();
            Ok(buf.len())
        })
        .await
        .unwrap();

    let home = timeout(PATIENCE, other).await.unwrap().unwrap().unwrap();
    assert_eq!(home, node(10));
    assert_eq!(server.tree.lock().entries[&5].data, payload);
    assert_eq!(
        server.log.lock().opcodes,
        vec![opcode::FD_OPEN, opcode::FD_WRITE_LONG, opcode::GET_HOME]
    );
}

/// Nothing reaches the wire while the server streams raw bytes.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_frame_written_during_bulk_read() {
    let (client, mut server) = connect_scripted().await;
    let client = Arc::new(client);
    let started = Arc::new(Notify::new());

    let other = {
        let client = client.clone();
        let started = started.clone();
        tokio::spawn(async move {
            started.notified().await;
            client.get_home("").await
        })
    };

    let server_task = tokio::spawn(async move {
        let bulk = read_request(&mut server, 1024).await.unwrap();
        assert_eq!(bulk.opcode, opcode::FD_READ_LONG);
        reply(&mut server, bulk.id, status::SWITCH_OK, &[]).await;
        server.write_all(&[7u8; 8]).await.unwrap();

        // The client is mid-transfer and another caller is waiting.
        let mut byte = [0u8; 1];
        let quiet = timeout(Duration::from_millis(100), server.read(&mut byte)).await;
        assert!(quiet.is_err(), "bytes written during raw mode");

        server.write_all(&[7u8; 8]).await.unwrap();
        let next = read_request(&mut server, 1024).await.unwrap();
        assert_eq!(next.opcode, opcode::GET_HOME);
        reply(&mut server, next.id, status::OK, node(1).as_bytes()).await;
        server
    });

    let mut received = 0;
    client
        .fd_read_long(3, 16, 8, |chunk| {
            if received == 0 {
                started.notify_one();
            }
            received += chunk.len();
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(received, 16);

    let home = timeout(PATIENCE, other).await.unwrap().unwrap().unwrap();
    assert_eq!(home, node(1));
    let _server = server_task.await.unwrap();
}

#[tokio::test]
async fn test_switch_refused_stays_framed() {
    let (client, _server) = connect(MockTree::sample()).await;
    let err = client
        .fd_read_long(99, 10, 4, |_| Ok(()))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(status::ERR_BAD_FD));
    assert!(client.is_connected());
    assert_eq!(client.get_home("").await.unwrap(), node(1));
}

#[tokio::test]
async fn test_peer_gone_mid_transfer_is_fatal() {
    let (client, mut server) = connect_scripted().await;
    tokio::spawn(async move {
        let bulk = read_request(&mut server, 1024).await.unwrap();
        reply(&mut server, bulk.id, status::SWITCH_OK, &[]).await;
        server.write_all(b"part").await.unwrap();
    });

    let err = timeout(PATIENCE, client.fd_read_long(1, 100, 16, |_| Ok(())))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, CloudError::NotConnected));
    assert!(matches!(
        client.get_parent(&node(1)).await,
        Err(CloudError::NotConnected)
    ));
}

/// A bulk call dropped before the server answers leaves the stream state
/// unknown, so the session ends.
#[tokio::test]
async fn test_abandoned_switch_ends_session() {
    let (client, mut server) = connect_scripted().await;
    let waited = timeout(
        Duration::from_millis(50),
        client.fd_read_long(1, 10, 4, |_| Ok(())),
    )
    .await;
    assert!(waited.is_err());
    assert!(!client.is_connected());

    let bulk = read_request(&mut server, 1024).await.unwrap();
    assert_eq!(bulk.opcode, opcode::FD_READ_LONG);
    reply(&mut server, bulk.id, status::ERR_BAD_FD, &[]).await;

    let later = timeout(PATIENCE, client.get_home("")).await.unwrap();
    assert!(matches!(later, Err(CloudError::NotConnected)));
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn test_dropped_transfer_mid_stream_is_fatal() {
    let (client, mut server) = connect_scripted().await;
    let server_task = tokio::spawn(async move {
        let bulk = read_request(&mut server, 1024).await.unwrap();
        reply(&mut server, bulk.id, status::SWITCH_OK, &[]).await;
        server.write_all(b"part").await.unwrap();
        server
    });

    let mut received = 0;
    let waited = timeout(
        Duration::from_millis(200),
        client.fd_read_long(1, 10, 4, |chunk| {
            received += chunk.len();
            Ok(())
        }),
    )
    .await;
    assert!(waited.is_err());
    assert_eq!(received, 4);
    assert!(!client.is_connected());

    let later = timeout(PATIENCE, client.get_parent(&node(1))).await.unwrap();
    assert!(matches!(later, Err(CloudError::NotConnected)));
    let _server = server_task.await.unwrap();
}
