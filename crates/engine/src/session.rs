//! The session engine: the single owner of the socket and of the state
//! variable. Implements the reconnect loop, the reader/writer tasks, and
//! the connection-loss request policy.
//!
//! One dedicated reader task and one dedicated writer task run per
//! connection, combined via `tokio::select!` on the writer side between
//! the outbound queue and the idle-ping timer — a client instance owns
//! exactly one socket at a time, so there is no multiplexing to do.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use bytes::{Buf, BytesMut};
use codec::{
    connect::{ConnectRequest, ConnectResponse},
    envelope::{ReplyHeader, RequestHeader, XID_AUTH, XID_CLOSE_SESSION, XID_NOTIFICATION, XID_PING},
    error_code::ErrorCode,
};
use parking_lot::{Mutex, RwLock};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    sync::{mpsc, oneshot},
};

use crate::{
    auth::SaslAuthenticator,
    dispatcher::{DispatchEvent, Dispatcher, DispatcherHandle},
    error::Error,
    hosts::HostProvider,
    pending::{PendingEntry, PendingTable},
    watch::{EventType, HandlerRef, KeeperState, WatchRegistration, WatchRegistry},
    xid::XidGenerator,
};

/// `{NOT_CONNECTED, CONNECTING, ASSOCIATING, CONNECTED, CLOSED, AUTH_FAILED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    NotConnected,
    Connecting,
    Associating,
    Connected,
    Closed,
    AuthFailed,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Closed | State::AuthFailed)
    }
}

struct ConnectionChannels {
    outbound: mpsc::UnboundedSender<(i32, BytesMut)>,
    pending: Arc<Mutex<PendingTable>>,
}

pub struct EngineOptions {
    pub connect_string: String,
    pub requested_timeout_ms: i32,
    pub session_id: i64,
    pub password: Vec<u8>,
    pub max_frame_len: usize,
    pub authenticator: Arc<dyn SaslAuthenticator>,
    pub default_watcher: Arc<RwLock<Option<HandlerRef>>>,
    pub watch_registry: Arc<WatchRegistry>,
}

/// The public handle a facade holds. Cloneable; every clone shares the
/// same engine state.
#[derive(Clone)]
pub struct Engine(Arc<Shared>);

struct Shared {
    state: RwLock<State>,
    channels: RwLock<Option<ConnectionChannels>>,
    xids: XidGenerator,
    session_id: AtomicI64,
    password: Mutex<Vec<u8>>,
    last_zxid_seen: AtomicI64,
    negotiated_timeout_ms: AtomicI64,
    dispatcher: DispatcherHandle,
    chroot: Option<String>,
    max_frame_len: usize,
}

impl Engine {
    /// Spawns the reconnect loop as a background task and returns a handle
    /// immediately; the handle is usable (and submissions fail fast with
    /// `ConnectionLoss`) before the first connection completes.
    pub fn spawn(options: EngineOptions) -> Result<Self, Error> {
        let hosts = HostProvider::parse(&options.connect_string)?;
        let chroot = hosts.chroot().map(|s| s.to_string());

        let dispatcher = Dispatcher::spawn(
            options.default_watcher,
            options.watch_registry.clone(),
            chroot.clone(),
        );

        let shared = Arc::new(Shared {
            state: RwLock::new(State::NotConnected),
            channels: RwLock::new(None),
            xids: XidGenerator::default(),
            session_id: AtomicI64::new(options.session_id),
            password: Mutex::new(options.password),
            last_zxid_seen: AtomicI64::new(0),
            negotiated_timeout_ms: AtomicI64::new(options.requested_timeout_ms as i64),
            dispatcher,
            chroot,
            max_frame_len: options.max_frame_len,
        });

        let engine = Engine(shared);
        let loop_engine = engine.clone();
        let requested_timeout_ms = options.requested_timeout_ms;
        let authenticator = options.authenticator;
        let watch_registry = options.watch_registry;

        tokio::spawn(async move {
            loop_engine
                .run(hosts, requested_timeout_ms, authenticator, watch_registry)
                .await;
        });

        Ok(engine)
    }

    pub fn state(&self) -> State {
        *self.0.state.read()
    }

    pub fn session_id(&self) -> i64 {
        self.0.session_id.load(Ordering::SeqCst)
    }

    pub fn chroot(&self) -> Option<&str> {
        self.0.chroot.as_deref()
    }

    /// Idempotent close: safe to call from multiple contexts, including
    /// after the session has already reached a terminal state.
    pub fn close(&self) {
        self.set_state(State::Closed);
        if let Some(channels) = self.0.channels.write().take() {
            channels.pending.lock().drain_with(|| Error::Cancelled);
        }
    }

    fn set_state(&self, new_state: State) {
        let mut state = self.0.state.write();
        if state.is_terminal() {
            return;
        }
        *state = new_state;
    }

    /// Submits a request. Fails fast with `ConnectionLoss` unless the
    /// engine is currently `CONNECTED` — per §5, only `NOT_CONNECTED`-style
    /// submissions are required to fail fast, but failing fast for any
    /// non-`CONNECTED` state keeps the rule uniform and easy to reason
    /// about.
    pub async fn submit(
        &self,
        op_code: i32,
        body: BytesMut,
        watch: Option<WatchRegistration>,
    ) -> Result<(i64, BytesMut), Error> {
        if self.state() == State::AuthFailed {
            return Err(Error::AuthFailed);
        }
        if self.state().is_terminal() {
            return Err(Error::SessionExpired);
        }

        let guard = self.0.channels.read();
        let channels = match guard.as_ref() {
            Some(channels) => channels,
            None => return Err(Error::ConnectionLoss),
        };

        let xid = self.0.xids.next();
        let mut request = BytesMut::with_capacity(8 + body.len());
        RequestHeader { xid, op_code }.encode(&mut request);
        request.extend_from_slice(&body);

        let (tx, rx) = oneshot::channel();

        // Insert into the pending table and enqueue on the outbound channel
        // as one critical section: the pending table's expected-reply order
        // must match the order requests actually land on `outbound`, and
        // with the lock dropped between the two, two concurrent submitters
        // could interleave them.
        {
            let mut pending = channels.pending.lock();
            pending.insert(PendingEntry {
                xid,
                request: request.clone(),
                watch,
                completion: tx,
                written: false,
            });
            // An error here means the writer task has already died; the
            // main loop will soon notice and drain this entry with
            // ConnectionLoss.
            let _ = channels.outbound.send((xid, request));
        }
        drop(guard);

        rx.await.unwrap_or(Err(Error::ConnectionLoss))
    }

    /// Sends a close-session request and waits for acknowledgement,
    /// without itself tearing down the engine — callers combine this with
    /// `close()`.
    pub async fn submit_close_session(&self) -> Result<(), Error> {
        let _ = self.submit(XID_CLOSE_SESSION, BytesMut::new(), None).await;
        Ok(())
    }

    async fn run(
        &self,
        mut hosts: HostProvider,
        requested_timeout_ms: i32,
        authenticator: Arc<dyn SaslAuthenticator>,
        watch_registry: Arc<WatchRegistry>,
    ) {
        while !self.state().is_terminal() {
            if let Some(backoff) = hosts.backoff() {
                tokio::time::sleep(backoff).await;
            }

            let host = hosts.next_server().to_addr_string();
            self.set_state(State::Connecting);
            log::info!("connecting to {host}");

            let stream = match TcpStream::connect(&host).await {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn!("connect to {host} failed: {err}");
                    continue;
                }
            };

            self.set_state(State::Associating);

            let last_zxid_seen = self.0.last_zxid_seen.load(Ordering::SeqCst);
            let session_id = self.0.session_id.load(Ordering::SeqCst);
            let password = self.0.password.lock().clone();

            match self
                .handshake(
                    stream,
                    last_zxid_seen,
                    session_id,
                    password,
                    requested_timeout_ms,
                )
                .await
            {
                Ok(None) => {
                    // Server refused the session: expired.
                    self.finish_expired();
                    return;
                }
                Ok(Some((stream, response))) => {
                    self.0.session_id.store(response.session_id, Ordering::SeqCst);
                    *self.0.password.lock() = response.password.clone();
                    self.0
                        .negotiated_timeout_ms
                        .store(response.negotiated_timeout_ms as i64, Ordering::SeqCst);

                    self.set_state(State::Connected);
                    hosts.note_connected();
                    self.0.dispatcher.push(DispatchEvent::State(KeeperState::SyncConnected));
                    log::info!(
                        "session established: session_id={:#x}, timeout_ms={}",
                        response.session_id,
                        response.negotiated_timeout_ms
                    );

                    let auth_info = authenticator.auth_info().await;

                    self.serve_connection(
                        stream,
                        response.negotiated_timeout_ms,
                        &watch_registry,
                        auth_info,
                    )
                    .await;
                }
                Err(err) => {
                    log::warn!("handshake with {host} failed: {err}");
                    continue;
                }
            }

            if self.state().is_terminal() {
                break;
            }

            self.set_state(State::Connecting);
            self.0.dispatcher.push(DispatchEvent::State(KeeperState::Disconnected));
            if let Some(channels) = self.0.channels.write().take() {
                channels.pending.lock().drain_on_connection_loss();
            }
        }
    }

    async fn handshake(
        &self,
        mut stream: TcpStream,
        last_zxid_seen: i64,
        session_id: i64,
        password: Vec<u8>,
        timeout_ms: i32,
    ) -> Result<Option<(TcpStream, ConnectResponse)>, Error> {
        let request = ConnectRequest {
            protocol_version: 0,
            last_zxid_seen,
            timeout_ms,
            session_id,
            password,
        };

        let mut body = BytesMut::new();
        request.encode(&mut body);

        let mut frame = BytesMut::new();
        codec::write_frame(&body, &mut frame);
        stream.write_all(&frame).await?;

        let mut buf = BytesMut::with_capacity(256);
        let deadline = std::time::Duration::from_millis(timeout_ms.max(1) as u64);
        let mut payload = tokio::time::timeout(
            deadline,
            read_one_frame(&mut stream, &mut buf, self.0.max_frame_len),
        )
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connect response timed out",
                ))
            })??;
        let response = ConnectResponse::decode(&mut payload)?;

        if response.is_refused() {
            return Ok(None);
        }

        Ok(Some((stream, response)))
    }

    fn finish_expired(&self) {
        self.set_state(State::Closed);
        if let Some(channels) = self.0.channels.write().take() {
            channels.pending.lock().drain_with(|| Error::SessionExpired);
        }
        self.0.dispatcher.push(DispatchEvent::State(KeeperState::Expired));
        log::info!("session expired");
    }

    fn finish_auth_failed(&self) {
        self.set_state(State::AuthFailed);
        if let Some(channels) = self.0.channels.write().take() {
            channels.pending.lock().drain_with(|| Error::AuthFailed);
        }
        self.0.dispatcher.push(DispatchEvent::State(KeeperState::AuthFailed));
        log::warn!("authentication failed");
    }

    async fn serve_connection(
        &self,
        stream: TcpStream,
        negotiated_timeout_ms: i32,
        watch_registry: &Arc<WatchRegistry>,
        auth_info: Option<Vec<u8>>,
    ) {
        let (read_half, write_half) = stream.into_split();
        let pending = Arc::new(Mutex::new(PendingTable::with_capacity(16)));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        *self.0.channels.write() = Some(ConnectionChannels {
            outbound: outbound_tx.clone(),
            pending: pending.clone(),
        });

        if let Some(auth_info) = auth_info {
            let mut body = BytesMut::new();
            RequestHeader {
                xid: XID_AUTH,
                op_code: codec::methods::OpCode::Auth.into(),
            }
            .encode(&mut body);
            body.extend_from_slice(&auth_info);
            let _ = outbound_tx.send((XID_AUTH, body));
        }

        let ping_interval_ms = (negotiated_timeout_ms / 3).max(1) as u64;
        let read_deadline_ms = (2 * negotiated_timeout_ms / 3).max(1) as u64;

        let writer = tokio::spawn(writer_task(
            write_half,
            outbound_rx,
            ping_interval_ms,
            pending.clone(),
        ));

        let reader_self = self.clone();
        let reader_registry = watch_registry.clone();
        let reader = tokio::spawn(async move {
            reader_self
                .reader_task(read_half, pending, read_deadline_ms, reader_registry)
                .await
        });

        let _ = tokio::join!(writer, reader);
    }

    async fn reader_task(
        &self,
        mut read_half: tokio::net::tcp::OwnedReadHalf,
        pending: Arc<Mutex<PendingTable>>,
        read_deadline_ms: u64,
        watch_registry: Arc<WatchRegistry>,
    ) {
        let mut buf = BytesMut::with_capacity(4096);

        loop {
            let frame = match tokio::time::timeout(
                std::time::Duration::from_millis(read_deadline_ms),
                read_one_frame(&mut read_half, &mut buf, self.0.max_frame_len),
            )
            .await
            {
                Ok(Ok(frame)) => frame,
                Ok(Err(_)) | Err(_) => break,
            };

            if self.dispatch_reply(frame, &pending, &watch_registry).is_err() {
                break;
            }
        }
    }

    /// Returns `Err(())` when the frame forces a reconnect (protocol
    /// error, or an auth reply that failed).
    fn dispatch_reply(
        &self,
        mut frame: BytesMut,
        pending: &Arc<Mutex<PendingTable>>,
        watch_registry: &Arc<WatchRegistry>,
    ) -> Result<(), ()> {
        let header = match ReplyHeader::decode(&mut frame) {
            Ok(header) => header,
            Err(_) => return Err(()),
        };

        match header.xid {
            XID_NOTIFICATION => {
                if let Ok((event_type, path)) = decode_notification(&frame) {
                    self.0
                        .dispatcher
                        .push(DispatchEvent::Node { event_type, path });
                }
                Ok(())
            }
            XID_PING => {
                log::trace!("ping reply received");
                Ok(())
            }
            XID_AUTH => {
                if header.err != 0 {
                    self.finish_auth_failed();
                    return Err(());
                }
                Ok(())
            }
            xid => {
                let mut table = pending.lock();
                if let Some(expected) = table.front_xid() {
                    if expected != xid {
                        log::warn!("xid mismatch: expected {expected}, got {xid}");
                        if let Some(entry) = table.remove(expected) {
                            let _ = entry.completion.send(Err(Error::XidMismatch {
                                expected,
                                got: xid,
                            }));
                        }
                        return Err(());
                    }
                } else {
                    log::warn!("xid mismatch: expected none, got {xid}");
                    return Err(());
                }

                let entry = match table.remove(xid) {
                    Some(entry) => entry,
                    None => return Err(()),
                };
                drop(table);

                self.advance_last_zxid_seen(header.zxid);

                if header.err == 0 {
                    if let Some(watch) = entry.watch {
                        watch_registry.install(watch);
                    }
                    let _ = entry.completion.send(Ok((header.zxid, frame)));
                } else {
                    let code = ErrorCode::from_wire(header.err).unwrap_or(ErrorCode::SystemError);
                    if code == ErrorCode::NoNode {
                        if let Some(watch) = entry.watch {
                            if watch.installs_on_no_node() {
                                watch_registry.install(watch);
                            }
                        }
                    }
                    let _ = entry.completion.send(Err(Error::Server(code)));
                }

                Ok(())
            }
        }
    }

    fn advance_last_zxid_seen(&self, zxid: i64) {
        let mut current = self.0.last_zxid_seen.load(Ordering::SeqCst);
        while zxid > current {
            match self.0.last_zxid_seen.compare_exchange_weak(
                current,
                zxid,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}

async fn writer_task(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<(i32, BytesMut)>,
    ping_interval_ms: u64,
    pending: Arc<Mutex<PendingTable>>,
) {
    let ping_interval = std::time::Duration::from_millis(ping_interval_ms);

    loop {
        tokio::select! {
            item = outbound_rx.recv() => {
                match item {
                    Some((xid, request)) => {
                        let mut frame = BytesMut::new();
                        codec::write_frame(&request, &mut frame);
                        if write_half.write_all(&frame).await.is_err() {
                            break;
                        }
                        pending.lock().mark_written(xid);
                    }
                    None => break,
                }
            }
            _ = tokio::time::sleep(ping_interval) => {
                let mut body = BytesMut::new();
                RequestHeader { xid: XID_PING, op_code: 11 }.encode(&mut body);
                let mut frame = BytesMut::new();
                codec::write_frame(&body, &mut frame);
                if write_half.write_all(&frame).await.is_err() {
                    break;
                }
                log::trace!("ping sent");
            }
        }
    }
}

async fn read_one_frame<R: AsyncReadExt + Unpin>(
    stream: &mut R,
    buf: &mut BytesMut,
    max_frame_len: usize,
) -> Result<BytesMut, Error> {
    loop {
        if let Some(frame) = codec::decode_frame(buf, max_frame_len)? {
            return Ok(frame);
        }

        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }

        buf.extend_from_slice(&chunk[..n]);
    }
}

fn decode_notification(body: &BytesMut) -> Result<(EventType, String), Error> {
    let mut body = body.clone();
    if body.len() < 4 {
        return Err(Error::Protocol(codec::Error::InvalidInput));
    }

    let raw_type = body.get_i32();
    let event_type = match raw_type {
        1 => EventType::NodeCreated,
        2 => EventType::NodeDeleted,
        3 => EventType::NodeDataChanged,
        4 => EventType::NodeChildrenChanged,
        _ => return Err(Error::Protocol(codec::Error::InvalidInput)),
    };

    if body.len() < 4 {
        return Err(Error::Protocol(codec::Error::InvalidInput));
    }
    let len = body.get_i32();
    if len < 0 || body.len() < len as usize {
        return Err(Error::Protocol(codec::Error::InvalidInput));
    }

    let path = String::from_utf8_lossy(&body[..len as usize]).to_string();
    Ok((event_type, path))
}
