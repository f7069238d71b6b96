//! In-memory node store served over a duplex stream.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::{Buf, Bytes};
use parking_lot::Mutex;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use cloud9_client::protocol::{
    opcode, read_init, read_request, status, write_response, Request, Response,
};
use cloud9_client::{CloudClient, Node};

pub fn node(id: u8) -> Node {
    Node::from_bytes([id; 16])
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: String,
    pub parent: Option<u8>,
    pub owner: String,
    pub directory: bool,
    pub forbidden: bool,
    pub data: Vec<u8>,
}

/// Tree keyed by the repeated byte of each node ID.
#[derive(Debug, Default, Clone)]
pub struct MockTree {
    pub entries: BTreeMap<u8, Entry>,
    pub homes: BTreeMap<String, u8>,
}

impl MockTree {
    pub fn home(mut self, user: &str, id: u8) -> Self {
        self.homes.insert(user.to_string(), id);
        self.entries.insert(
            id,
            Entry {
                name: String::new(),
                parent: None,
                owner: user.to_string(),
                directory: true,
                forbidden: false,
                data: Vec::new(),
            },
        );
        self
    }

    pub fn dir(self, parent: u8, id: u8, name: &str) -> Self {
        self.child(parent, id, name, true, Vec::new())
    }

    pub fn file(self, parent: u8, id: u8, name: &str, data: &[u8]) -> Self {
        self.child(parent, id, name, false, data.to_vec())
    }

    pub fn forbid(mut self, id: u8) -> Self {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.forbidden = true;
        }
        self
    }

    fn child(mut self, parent: u8, id: u8, name: &str, directory: bool, data: Vec<u8>) -> Self {
        let owner = self.entries[&parent].owner.clone();
        self.entries.insert(
            id,
            Entry {
                name: name.to_string(),
                parent: Some(parent),
                owner,
                directory,
                forbidden: false,
                data,
            },
        );
        self
    }

    /// Home of bob (1): a(2)/b(3)/c(4), file.txt(5) = "hello world".
    /// Home of alice (10), listing forbidden: shared(11)/deep(12).
    pub fn sample() -> Self {
        MockTree::default()
            .home("bob", 1)
            .dir(1, 2, "a")
            .dir(2, 3, "b")
            .dir(3, 4, "c")
            .file(1, 5, "file.txt", b"hello world")
            .home("alice", 10)
            .forbid(10)
            .dir(10, 11, "shared")
            .dir(11, 12, "deep")
    }
}

/// What the server saw, shared with the test.
#[derive(Debug, Default)]
pub struct ServerLog {
    pub opcodes: Vec<u16>,
    pub goodbye: bool,
}

pub struct MockServer {
    pub tree: Arc<Mutex<MockTree>>,
    pub log: Arc<Mutex<ServerLog>>,
}

/// Authenticated client talking to a served `tree`.
pub async fn connect(tree: MockTree) -> (CloudClient, MockServer) {
    let (conn, server) = duplex(64 * 1024);
    let tree = Arc::new(Mutex::new(tree));
    let log = Arc::new(Mutex::new(ServerLog::default()));
    tokio::spawn(serve(server, tree.clone(), log.clone()));
    let client = CloudClient::builder()
        .login("bob")
        .authenticate(conn, || Ok("pw".to_string()))
        .await
        .unwrap();
    (client, MockServer { tree, log })
}

/// Handshake as a bare scripted peer and return the server end.
pub async fn connect_scripted() -> (CloudClient, DuplexStream) {
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

pub async fn reply(server: &mut DuplexStream, id: u32, status: u16, body: &[u8]) {
    let response = Response::new(id, status, Bytes::copy_from_slice(body));
    write_response(server, &response).await.unwrap();
}

fn id_of(payload: &[u8]) -> u8 {
    payload.first().copied().unwrap_or(0)
}

async fn serve(mut stream: DuplexStream, tree: Arc<Mutex<MockTree>>, log: Arc<Mutex<ServerLog>>) {
    if read_init(&mut stream, 1024).await.is_err() {
        return;
    }
    stream.write_u16(status::INIT_OK).await.unwrap();

    while let Ok(request) = read_request(&mut stream, 1 << 20).await {
        log.lock().opcodes.push(request.opcode);
        match request.opcode {
            opcode::GOODBYE => {
                log.lock().goodbye = true;
                return;
            }
            opcode::FD_READ_LONG => {
                let (fd, count) = bulk_args(&request);
                let data = tree.lock().entries.get(&fd).map(|entry| entry.data.clone());
                match data {
                    Some(data) if data.len() >= count => {
                        reply(&mut stream, request.id, status::SWITCH_OK, &[]).await;
                        stream.write_all(&data[..count]).await.unwrap();
                    }
                    _ => reply(&mut stream, request.id, status::ERR_BAD_FD, &[]).await,
                }
            }
            opcode::FD_WRITE_LONG => {
                let (fd, count) = bulk_args(&request);
                if !tree.lock().entries.contains_key(&fd) {
                    reply(&mut stream, request.id, status::ERR_BAD_FD, &[]).await;
                    continue;
                }
                reply(&mut stream, request.id, status::SWITCH_OK, &[]).await;
                let mut data = vec![0u8; count];
                if stream.read_exact(&mut data).await.is_err() {
                    return;
                }
                if let Some(entry) = tree.lock().entries.get_mut(&fd) {
                    entry.data = data;
                }
            }
            _ => {
                let (status, body) = handle(&tree.lock(), &request);
                reply(&mut stream, request.id, status, &body).await;
            }
        }
    }
}

fn bulk_args(request: &Request) -> (u8, usize) {
    let mut payload = request.payload.clone();
    let fd = payload.get_u8();
    let count = payload.get_u64() as usize;
    (fd, count)
}

fn handle(tree: &MockTree, request: &Request) -> (u16, Vec<u8>) {
    let payload = &request.payload[..];
    let target = id_of(payload);
    match request.opcode {
        opcode::GET_HOME => {
            let user = String::from_utf8_lossy(payload).into_owned();
            let user = if user.is_empty() { "bob".to_string() } else { user };
            match tree.homes.get(&user) {
                Some(id) => (status::OK, node(*id).as_bytes().to_vec()),
                None => (status::ERR_NOT_FOUND, Vec::new()),
            }
        }
        opcode::LIST_DIRECTORY => match tree.entries.get(&target) {
            None => (status::ERR_NOT_FOUND, Vec::new()),
            Some(entry) if entry.forbidden => (status::ERR_FORBIDDEN, Vec::new()),
            Some(entry) if !entry.directory => (status::ERR_NOT_A_DIRECTORY, Vec::new()),
            Some(_) => {
                let mut body = Vec::new();
                for (id, child) in &tree.entries {
                    if child.parent == Some(target) {
                        body.extend_from_slice(node(*id).as_bytes());
                        body.push(child.name.len() as u8);
                        body.extend_from_slice(child.name.as_bytes());
                    }
                }
                (status::OK, body)
            }
        },
        opcode::GET_PARENT => match tree.entries.get(&target) {
            None => (status::ERR_NOT_FOUND, Vec::new()),
            Some(entry) => match entry.parent {
                Some(parent) => (status::OK, node(parent).as_bytes().to_vec()),
                None => (status::OK, Vec::new()),
            },
        },
        opcode::GET_NODE_OWNER => match tree.entries.get(&target) {
            None => (status::ERR_NOT_FOUND, Vec::new()),
            Some(entry) => (status::OK, entry.owner.clone().into_bytes()),
        },
        opcode::GET_NODE_INFO => match tree.entries.get(&target) {
            None => (status::ERR_NOT_FOUND, Vec::new()),
            Some(entry) => {
                let mut body = vec![u8::from(entry.directory)];
                body.extend_from_slice(&(entry.data.len() as u64).to_be_bytes());
                body.push(0);
                (status::OK, body)
            }
        },
        opcode::FD_OPEN => match tree.entries.get(&target) {
            Some(entry) if !entry.directory => (status::OK, vec![target]),
            Some(_) => (status::ERR_NOT_A_FILE, Vec::new()),
            None => (status::ERR_NOT_FOUND, Vec::new()),
        },
        opcode::FD_CLOSE => (status::OK, Vec::new()),
        _ => (status::ERR_MALFORMED, Vec::new()),
    }
}
