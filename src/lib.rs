//! Façade for a hierarchical, strongly-consistent coordination service
//! client: path validation, chroot rewriting, and per-operation request/
//! response marshalling over [`engine::Connection`] — the session and
//! connection subsystem that does the hard part.

pub mod acl;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod path;
mod wire;

use std::sync::Arc;

use bytes::BytesMut;
use codec::{error_code::ErrorCode, methods::OpCode};
use engine::{Connection, ConnectionOptions, HandlerRef, WatchRegistration};

use acl::Acl;
use auth::SaslAuthenticator;
use config::ClientConfig;
use data::{CreateMode, Stat};
use error::ClientError;
use wire::{get_bytes, get_str, put_bytes, put_str};

pub use engine::{EventType, KeeperState, WatchedEvent};

/// A connected session. Cheap to clone; every clone shares the same
/// underlying engine.
#[derive(Clone)]
pub struct Client {
    connection: Connection,
    chroot: Option<String>,
}

impl Client {
    /// Starts connecting per `config`. Returns once the engine handle is
    /// constructed — the handle is usable (submissions queue behind the
    /// first successful connection) before the session is established.
    pub fn connect(
        config: &ClientConfig,
        default_watcher: Option<HandlerRef>,
        authenticator: Option<Arc<dyn SaslAuthenticator>>,
    ) -> Result<Self, ClientError> {
        let connection = Connection::open(ConnectionOptions {
            connect_string: config.connect_string.clone(),
            requested_timeout_ms: config.session_timeout_ms,
            session_id: 0,
            password: Vec::new(),
            max_frame_len: config.max_frame_len,
            authenticator,
        })?;

        if let Some(handler) = default_watcher {
            connection.set_default_watcher(handler);
        }

        let chroot = connection.chroot().map(|s| s.to_string());
        log::info!("client connecting, chroot={chroot:?}");

        Ok(Self { connection, chroot })
    }

    pub fn state(&self) -> engine::State {
        self.connection.state()
    }

    pub fn session_id(&self) -> i64 {
        self.connection.session_id()
    }

    pub fn set_default_watcher(&self, handler: HandlerRef) {
        self.connection.set_default_watcher(handler);
    }

    fn server_path(&self, path: &str) -> String {
        path::prepend_chroot(self.chroot.as_deref(), path)
    }

    fn client_path(&self, path: &str) -> String {
        path::strip_chroot(self.chroot.as_deref(), path)
    }

    fn watch_registration(
        &self,
        kind: WatchKind,
        path: &str,
        handler: Option<HandlerRef>,
    ) -> Option<WatchRegistration> {
        let handler = handler?;
        let path = path.to_string();
        Some(match kind {
            WatchKind::Data => WatchRegistration::Data { path, handler },
            WatchKind::Exist => WatchRegistration::Exist { path, handler },
            WatchKind::Child => WatchRegistration::Child { path, handler },
        })
    }

    pub async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String, ClientError> {
        path::validate(path)?;
        if acl.is_empty() {
            return Err(ClientError::EmptyAcl);
        }

        let server_path = self.server_path(path);
        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);
        put_bytes(&mut body, data);
        acl::encode_acl_list(acl, &mut body);
        {
            use bytes::BufMut;
            body.put_i32(mode.to_flag());
        }

        let (_zxid, mut reply) = self
            .connection
            .submit(OpCode::Create.into(), body, None)
            .await?;

        let created_path = get_str(&mut reply)?;
        Ok(self.client_path(&created_path))
    }

    pub fn create_sync(
        &self,
        path: &str,
        data: &[u8],
        acl: &[Acl],
        mode: CreateMode,
    ) -> Result<String, ClientError> {
        pollster::block_on(self.create(path, data, acl, mode))
    }

    pub async fn delete(&self, path: &str, version: i32) -> Result<(), ClientError> {
        path::validate(path)?;

        let server_path = self.server_path(path);
        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);
        {
            use bytes::BufMut;
            body.put_i32(version);
        }

        self.connection
            .submit(OpCode::Delete.into(), body, None)
            .await?;

        Ok(())
    }

    pub fn delete_sync(&self, path: &str, version: i32) -> Result<(), ClientError> {
        pollster::block_on(self.delete(path, version))
    }

    pub async fn exists(
        &self,
        path: &str,
        watcher: Option<HandlerRef>,
    ) -> Result<Option<Stat>, ClientError> {
        path::validate(path)?;

        let server_path = self.server_path(path);
        let watch = self.watch_registration(WatchKind::Exist, path, watcher);

        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);
        {
            use bytes::BufMut;
            body.put_u8(watch.is_some() as u8);
        }

        match self.connection.submit(OpCode::Exists.into(), body, watch).await {
            Ok((_zxid, mut reply)) => Ok(Some(Stat::decode(&mut reply)?)),
            Err(engine::Error::Server(ErrorCode::NoNode)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub fn exists_sync(
        &self,
        path: &str,
        watcher: Option<HandlerRef>,
    ) -> Result<Option<Stat>, ClientError> {
        pollster::block_on(self.exists(path, watcher))
    }

    pub async fn get_data(
        &self,
        path: &str,
        watcher: Option<HandlerRef>,
    ) -> Result<(Vec<u8>, Stat), ClientError> {
        path::validate(path)?;

        let server_path = self.server_path(path);
        let watch = self.watch_registration(WatchKind::Data, path, watcher);

        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);
        {
            use bytes::BufMut;
            body.put_u8(watch.is_some() as u8);
        }

        let (_zxid, mut reply) = self
            .connection
            .submit(OpCode::GetData.into(), body, watch)
            .await?;

        let data = get_bytes(&mut reply)?;
        let stat = Stat::decode(&mut reply)?;
        Ok((data, stat))
    }

    pub fn get_data_sync(
        &self,
        path: &str,
        watcher: Option<HandlerRef>,
    ) -> Result<(Vec<u8>, Stat), ClientError> {
        pollster::block_on(self.get_data(path, watcher))
    }

    pub async fn set_data(
        &self,
        path: &str,
        data: &[u8],
        version: i32,
    ) -> Result<Stat, ClientError> {
        path::validate(path)?;

        let server_path = self.server_path(path);
        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);
        put_bytes(&mut body, data);
        {
            use bytes::BufMut;
            body.put_i32(version);
        }

        let (_zxid, mut reply) = self
            .connection
            .submit(OpCode::SetData.into(), body, None)
            .await?;

        Stat::decode(&mut reply)
    }

    pub fn set_data_sync(&self, path: &str, data: &[u8], version: i32) -> Result<Stat, ClientError> {
        pollster::block_on(self.set_data(path, data, version))
    }

    pub async fn get_acl(&self, path: &str) -> Result<(Vec<Acl>, Stat), ClientError> {
        path::validate(path)?;

        let server_path = self.server_path(path);
        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);

        let (_zxid, mut reply) = self
            .connection
            .submit(OpCode::GetACL.into(), body, None)
            .await?;

        let acl = acl::decode_acl_list(&mut reply)?;
        let stat = Stat::decode(&mut reply)?;
        Ok((acl, stat))
    }

    pub fn get_acl_sync(&self, path: &str) -> Result<(Vec<Acl>, Stat), ClientError> {
        pollster::block_on(self.get_acl(path))
    }

    pub async fn set_acl(&self, path: &str, acl: &[Acl], version: i32) -> Result<Stat, ClientError> {
        path::validate(path)?;
        if acl.is_empty() {
            return Err(ClientError::EmptyAcl);
        }

        let server_path = self.server_path(path);
        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);
        acl::encode_acl_list(acl, &mut body);
        {
            use bytes::BufMut;
            body.put_i32(version);
        }

        let (_zxid, mut reply) = self
            .connection
            .submit(OpCode::SetACL.into(), body, None)
            .await?;

        Stat::decode(&mut reply)
    }

    pub fn set_acl_sync(&self, path: &str, acl: &[Acl], version: i32) -> Result<Stat, ClientError> {
        pollster::block_on(self.set_acl(path, acl, version))
    }

    pub async fn get_children(
        &self,
        path: &str,
        watcher: Option<HandlerRef>,
    ) -> Result<Vec<String>, ClientError> {
        path::validate(path)?;

        let server_path = self.server_path(path);
        let watch = self.watch_registration(WatchKind::Child, path, watcher);

        let mut body = BytesMut::new();
        put_str(&mut body, &server_path);
        {
            use bytes::BufMut;
            body.put_u8(watch.is_some() as u8);
        }

        let (_zxid, mut reply) = self
            .connection
            .submit(OpCode::GetChildren2.into(), body, watch)
            .await?;

        if reply.len() < 4 {
            return Err(ClientError::Protocol("truncated children count".into()));
        }

        use bytes::Buf;
        let count = reply.get_i32();
        if count < 0 {
            return Err(ClientError::Protocol("negative children count".into()));
        }

        let mut children = Vec::with_capacity(count as usize);
        for _ in 0..count {
            children.push(get_str(&mut reply)?);
        }

        Ok(children)
    }

    pub fn get_children_sync(
        &self,
        path: &str,
        watcher: Option<HandlerRef>,
    ) -> Result<Vec<String>, ClientError> {
        pollster::block_on(self.get_children(path, watcher))
    }

    /// Sends a close-session request and tears down the engine. Idempotent.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connection.close().await?;
        Ok(())
    }

    pub fn close_sync(&self) -> Result<(), ClientError> {
        pollster::block_on(self.close())
    }
}

#[derive(Clone, Copy)]
enum WatchKind {
    Data,
    Exist,
    Child,
}

/// Adapts a plain closure to a [`HandlerRef`] so callers can pass
/// `|event| { .. }` wherever a watcher is expected.
pub fn watcher_fn<F>(f: F) -> HandlerRef
where
    F: Fn(&WatchedEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}
