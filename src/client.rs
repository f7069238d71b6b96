//! Client builder and request dispatcher.
//!
//! The [`ClientBuilder`] configures the session and performs the init
//! handshake. The [`CloudClient`] then manages the lifecycle:
//! 1. Send the auth (or registration) frame and read the bare status
//! 2. Spawn the background listener that owns the read half
//! 3. Multiplex framed requests, delivering each response by ID
//! 4. Hand the stream to bulk transfers on `SWITCH_OK`
//! 5. Say goodbye and join the listener on shutdown
//!
//! # Example
//!
//! ```ignore
//! use cloud9_client::{transport, CloudClient};
//!
//! #[tokio::main]
//! async fn main() -> cloud9_client::Result<()> {
//!     let conn = transport::connect("files.local", &Default::default()).await?;
//!     let client = CloudClient::builder()
//!         .login("alice")
//!         .authenticate(conn, || Ok("secret".to_string()))
//!         .await?;
//!
//!     let home = client.get_home("").await?;
//!     for entry in client.list_directory(&home).await? {
//!         println!("{}", entry.name);
//!     }
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex, MutexGuard, Semaphore, SemaphorePermit};
use tokio::task::JoinHandle;

use crate::codec::PayloadWriter;
use crate::error::{CloudError, Result};
use crate::pending::PendingTable;
use crate::protocol::{
    opcode, read_init_status, read_response, status, write_init, write_request, Request, Response,
    DEFAULT_MAX_BODY_SIZE,
};
use crate::transport::Connection;

/// Default number of requests that may be awaiting a response at once.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// What the connection is currently carrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LinkMode {
    /// Ordinary multiplexed frames.
    Framed,
    /// A bulk request was written; waiting for the server to accept it.
    SwitchingToRaw,
    /// Unframed transfer bytes. Nothing else may touch the stream.
    Raw,
}

/// Write side of the connection. Holding its lock is the issuance section;
/// a bulk transfer keeps holding it until the raw bytes are done.
struct Link {
    writer: BoxedWriter,
    next_id: u32,
    mode: LinkMode,
}

/// Delivered to the waiter that owns a request ID.
pub(crate) enum Reply {
    Frame(Response),
    /// The server accepted a mode switch. The listener parked itself and
    /// lent the read half to the waiter.
    Switch(Response, RawLease),
}

/// Read half on loan from the listener for the duration of a raw transfer.
///
/// Dropping a lease without [`RawLease::release`] ends the listener, which
/// declares the connection lost.
pub(crate) struct RawLease {
    reader: BoxedReader,
    give_back: oneshot::Sender<BoxedReader>,
}

impl RawLease {
    fn release(self) {
        let _ = self.give_back.send(self.reader);
    }
}

struct Shared {
    link: Mutex<Link>,
    pending: PendingTable<Reply>,
    permits: Semaphore,
    connected: AtomicBool,
    max_body_size: u64,
    login: String,
}

impl Shared {
    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::debug!("connection marked lost");
        }
        self.permits.close();
        let failed = self.pending.close();
        if failed > 0 {
            tracing::debug!(failed, "failed pending requests");
        }
    }
}

/// Builder for configuring a session and running the init handshake.
///
/// Use the fluent API to set the login and limits, then call
/// [`authenticate`](ClientBuilder::authenticate) or
/// [`register`](ClientBuilder::register).
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    login: Option<String>,
    max_in_flight: usize,
    max_body_size: u64,
}

impl ClientBuilder {
    /// Create a new client builder.
    pub fn new() -> Self {
        Self {
            login: None,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Set the user name to log in as.
    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    /// Set the maximum number of requests awaiting a response.
    ///
    /// Further callers wait for a free slot. Default: 256
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = limit;
        self
    }

    /// Set the largest response body accepted before the connection is
    /// dropped as a protocol violation.
    ///
    /// Default: 64 MiB
    pub fn max_body_size(mut self, limit: u64) -> Self {
        self.max_body_size = limit;
        self
    }

    /// Authenticate over `conn` and start the session.
    ///
    /// `credential` is called once, before anything is written.
    pub async fn authenticate<C, F>(self, conn: C, credential: F) -> Result<CloudClient>
    where
        C: Connection,
        F: FnOnce() -> Result<String>,
    {
        let login = self.checked_login()?;
        let credential = credential()?;
        let mut body = PayloadWriter::with_capacity(1 + login.len() + credential.len());
        body.put_name(&login)?.put_bytes(credential.as_bytes());
        self.start(conn, login, status::INIT_CMD_AUTH, body.freeze())
            .await
    }

    /// Register a new account with an invitation code and start the session.
    pub async fn register<C, I, P>(self, conn: C, invite: I, password: P) -> Result<CloudClient>
    where
        C: Connection,
        I: FnOnce() -> Result<String>,
        P: FnOnce() -> Result<String>,
    {
        let login = self.checked_login()?;
        let invite = invite()?;
        let password = password()?;
        let mut body = PayloadWriter::new();
        body.put_name(&login)?
            .put_name(&invite)?
            .put_bytes(password.as_bytes());
        self.start(conn, login, status::INIT_CMD_REGISTER, body.freeze())
            .await
    }

    fn checked_login(&self) -> Result<String> {
        match &self.login {
            Some(login) if !login.is_empty() => Ok(login.clone()),
            _ => Err(CloudError::InvalidArgument("no login specified".to_string())),
        }
    }

    async fn start<C: Connection>(
        self,
        conn: C,
        login: String,
        command: u16,
        body: Bytes,
    ) -> Result<CloudClient> {
        if self.max_in_flight == 0 {
            return Err(CloudError::InvalidArgument(
                "max_in_flight must be at least 1".to_string(),
            ));
        }

        let (reader, writer) = tokio::io::split(conn);
        let mut reader: BoxedReader = Box::new(reader);
        let mut writer: BoxedWriter = Box::new(writer);

        write_init(&mut writer, command, &body).await?;
        let init_status = read_init_status(&mut reader).await?;
        if init_status != status::INIT_OK {
            tracing::warn!(login = %login, status = init_status, "init handshake rejected");
            return Err(CloudError::init(init_status));
        }
        tracing::info!(login = %login, "authenticated");

        let shared = Arc::new(Shared {
            link: Mutex::new(Link {
                writer,
                next_id: 0,
                mode: LinkMode::Framed,
            }),
            pending: PendingTable::new(self.max_in_flight),
            permits: Semaphore::new(self.max_in_flight),
            connected: AtomicBool::new(true),
            max_body_size: self.max_body_size,
            login,
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let listener = tokio::spawn(listen(shared.clone(), reader, stop_rx));

        Ok(CloudClient {
            shared,
            stop: Some(stop_tx),
            listener: Some(listener),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An authenticated session multiplexing requests over one connection.
///
/// All operations take `&self` and may run concurrently from many tasks.
/// Once the connection is lost every operation fails with
/// [`CloudError::NotConnected`].
pub struct CloudClient {
    shared: Arc<Shared>,
    stop: Option<oneshot::Sender<()>>,
    listener: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("login", &self.shared.login)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl CloudClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// User this session authenticated as.
    pub fn login(&self) -> &str {
        &self.shared.login
    }

    /// False once the listener has observed a stream failure.
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.shared.pending.in_flight()
    }

    /// Send one framed request and wait for its response, whatever its
    /// status.
    pub(crate) async fn issue(&self, opcode: u16, payload: Bytes) -> Result<Response> {
        if opcode::is_bulk(opcode) {
            return Err(CloudError::InvalidArgument(format!(
                "{} needs a raw session",
                opcode::name(opcode)
            )));
        }
        let permit = self.acquire().await?;
        let in_flight = {
            let mut link = self.shared.link.lock().await;
            self.send(&mut link, opcode, payload, permit).await?
        };
        match in_flight.wait().await? {
            Reply::Frame(response) => Ok(response),
            Reply::Switch(response, _lease) => {
                // Lease dropped here: the stream is now raw and unusable.
                tracing::error!(
                    id = response.id,
                    op = opcode::name(opcode),
                    "server switched to raw mode on a framed request"
                );
                Err(CloudError::Protocol(format!(
                    "{}: unexpected mode switch",
                    opcode::name(opcode)
                )))
            }
        }
    }

    /// Issue a request and return its body, failing on any status but `OK`.
    pub(crate) async fn request(&self, opcode: u16, payload: Bytes) -> Result<Bytes> {
        let response = self.issue(opcode, payload).await?;
        if response.status != status::OK {
            return Err(CloudError::request(response.status));
        }
        Ok(response.body)
    }

    /// Issue a mode-switch request and, on `SWITCH_OK`, take exclusive
    /// ownership of both stream halves.
    pub(crate) async fn switch_to_raw(&self, opcode: u16, payload: Bytes) -> Result<RawSession<'_>> {
        let permit = self.acquire().await?;
        let mut link = self.shared.link.lock().await;
        let in_flight = self.send(&mut link, opcode, payload, permit).await?;
        link.mode = LinkMode::SwitchingToRaw;

        let pending_switch = PendingSwitch {
            shared: &self.shared,
            armed: true,
        };
        let reply = in_flight.wait().await;
        pending_switch.disarm();
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => {
                link.mode = LinkMode::Framed;
                return Err(e);
            }
        };

        match reply {
            Reply::Switch(response, lease) => {
                link.mode = LinkMode::Raw;
                tracing::debug!(id = response.id, op = opcode::name(opcode), "raw mode");
                Ok(RawSession {
                    client: self,
                    link,
                    lease: Some(lease),
                })
            }
            Reply::Frame(response) => {
                link.mode = LinkMode::Framed;
                if response.status == status::OK {
                    return Err(CloudError::Protocol(format!(
                        "{}: server did not switch modes",
                        opcode::name(opcode)
                    )));
                }
                Err(CloudError::request(response.status))
            }
        }
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        if !self.is_connected() {
            return Err(CloudError::NotConnected);
        }
        self.shared
            .permits
            .acquire()
            .await
            .map_err(|_| CloudError::NotConnected)
    }

    /// Register a slot, then write the frame. Must be called under the link
    /// lock so frames are never interleaved.
    async fn send<'a>(
        &'a self,
        link: &mut Link,
        opcode: u16,
        payload: Bytes,
        permit: SemaphorePermit<'a>,
    ) -> Result<InFlight<'a>> {
        if !self.is_connected() || link.mode != LinkMode::Framed {
            return Err(CloudError::NotConnected);
        }
        let (id, rx) = self.shared.pending.register(link.next_id)?;
        let slot = SlotGuard {
            pending: &self.shared.pending,
            id,
            _permit: permit,
        };
        link.next_id = id.wrapping_add(1);

        let request = Request::new(id, opcode, payload);
        tracing::debug!(
            id,
            op = opcode::name(opcode),
            len = request.payload.len(),
            "issue"
        );
        if let Err(e) = write_request(&mut link.writer, &request).await {
            tracing::warn!(id, error = %e, "request write failed");
            self.shared.disconnect();
            return Err(CloudError::NotConnected);
        }
        Ok(InFlight { rx, _slot: slot })
    }

    /// Say goodbye, close the connection and join the listener.
    ///
    /// Best effort; never fails.
    pub async fn shutdown(mut self) {
        if self.is_connected() {
            let mut link = self.shared.link.lock().await;
            if link.mode == LinkMode::Framed {
                let id = link.next_id;
                link.next_id = id.wrapping_add(1);
                let goodbye = Request::new(id, opcode::GOODBYE, Bytes::new());
                if let Err(e) = write_request(&mut link.writer, &goodbye).await {
                    tracing::debug!(error = %e, "goodbye not sent");
                }
            }
            let _ = link.writer.shutdown().await;
        }
        self.shared.disconnect();

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(listener) = self.listener.take() {
            if let Err(e) = listener.await {
                tracing::warn!(error = %e, "listener task failed");
            }
        }
        tracing::info!(login = %self.shared.login, "session closed");
    }
}

impl Drop for CloudClient {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            self.shared.disconnect();
        }
    }
}

/// Frees the pending slot if the waiter goes away before delivery.
struct SlotGuard<'a> {
    pending: &'a PendingTable<Reply>,
    id: u32,
    _permit: SemaphorePermit<'a>,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.id);
    }
}

/// Ends the session if a mode switch is abandoned before the server
/// answered it. The peer may already be in raw mode, so the stream state is
/// unknown.
struct PendingSwitch<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl PendingSwitch<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingSwitch<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("mode switch abandoned");
            self.shared.disconnect();
        }
    }
}

struct InFlight<'a> {
    rx: oneshot::Receiver<Reply>,
    _slot: SlotGuard<'a>,
}

impl InFlight<'_> {
    async fn wait(self) -> Result<Reply> {
        self.rx.await.map_err(|_| CloudError::NotConnected)
    }
}

/// Exclusive ownership of the stream during a bulk transfer.
///
/// Holds the link lock (no framed request can be written) and the listener's
/// read half (no frame can be parsed). Dropping the session before
/// [`finish`](RawSession::finish) poisons the connection.
pub(crate) struct RawSession<'a> {
    client: &'a CloudClient,
    link: MutexGuard<'a, Link>,
    lease: Option<RawLease>,
}

impl RawSession<'_> {
    /// Fill `buf` completely from the raw stream.
    pub(crate) async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let result = match self.lease.as_mut() {
            Some(lease) => lease.reader.read_exact(buf).await.map(|_| ()),
            None => return Err(CloudError::NotConnected),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "raw read failed");
            self.poison().await;
            return Err(CloudError::NotConnected);
        }
        Ok(())
    }

    /// Write all of `buf` to the raw stream.
    pub(crate) async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if self.lease.is_none() {
            return Err(CloudError::NotConnected);
        }
        if let Err(e) = self.link.writer.write_all(buf).await {
            tracing::warn!(error = %e, "raw write failed");
            self.poison().await;
            return Err(CloudError::NotConnected);
        }
        Ok(())
    }

    /// End raw mode after exactly the declared count and return the stream
    /// to framed traffic.
    pub(crate) async fn finish(mut self) -> Result<()> {
        if let Err(e) = self.link.writer.flush().await {
            tracing::warn!(error = %e, "raw flush failed");
            self.poison().await;
            return Err(CloudError::NotConnected);
        }
        match self.lease.take() {
            Some(lease) => {
                self.link.mode = LinkMode::Framed;
                lease.release();
                tracing::debug!("framed mode");
                Ok(())
            }
            None => Err(CloudError::NotConnected),
        }
    }

    /// Abandon the transfer. The stream is out of sync for good.
    pub(crate) async fn poison(&mut self) {
        self.client.shared.disconnect();
        let _ = self.link.writer.shutdown().await;
        self.lease = None;
    }
}

impl Drop for RawSession<'_> {
    fn drop(&mut self) {
        if self.lease.take().is_some() {
            tracing::warn!("raw transfer abandoned");
            self.client.shared.disconnect();
        }
    }
}

/// Background loop: the only reader of the connection in framed mode.
async fn listen(shared: Arc<Shared>, mut reader: BoxedReader, mut stop: oneshot::Receiver<()>) {
    loop {
        let response = tokio::select! {
            _ = &mut stop => {
                tracing::debug!("listener stopped");
                break;
            }
            result = read_response(&mut reader, shared.max_body_size) => match result {
                Ok(response) => response,
                Err(e) => {
                    if shared.connected.load(Ordering::SeqCst) {
                        tracing::warn!(error = %e, "connection lost");
                    }
                    break;
                }
            },
        };

        let id = response.id;
        if response.status == status::SWITCH_OK {
            let (give_back, returned) = oneshot::channel();
            let lease = RawLease { reader, give_back };
            if shared.pending.deliver(id, Reply::Switch(response, lease)).is_err() {
                tracing::error!(id, "mode switch for unknown request");
                break;
            }
            tracing::debug!(id, "listener parked for raw transfer");
            reader = match returned.await {
                Ok(reader) => reader,
                Err(_) => {
                    tracing::debug!(id, "raw transfer did not return the stream");
                    break;
                }
            };
            continue;
        }

        tracing::debug!(id, status = response.status, len = response.body.len(), "deliver");
        if shared.pending.deliver(id, Reply::Frame(response)).is_err() {
            tracing::warn!(id, "response for unknown request");
        }
    }
    shared.disconnect();
}
