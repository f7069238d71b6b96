//! Scripted server side of a duplex connection for unit tests.

use bytes::Bytes;
use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

use crate::client::CloudClient;
use crate::protocol::{read_init, read_request, status, write_response, Request, Response};

/// Authenticated client plus the server end of its connection.
pub(crate) async fn session() -> (CloudClient, DuplexStream) {
    let (conn, mut server) = duplex(64 * 1024);
    let handshake = tokio::spawn(async move {
        read_init(&mut server, 1024).await.unwrap();
        server.write_u16(status::INIT_OK).await.unwrap();
        server
    });
    let client = CloudClient::builder()
        .login("bob")
        .authenticate(conn, || Ok("pw".to_string()))
        .await
        .unwrap();
    (client, handshake.await.unwrap())
}

/// Read one request and answer it with `status` and `body`.
pub(crate) async fn answer(server: &mut DuplexStream, status: u16, body: &[u8]) -> Request {
    let request = read_request(server, 1 << 20).await.unwrap();
    let response = Response::new(request.id, status, Bytes::copy_from_slice(body));
    write_response(server, &response).await.unwrap();
    request
}
