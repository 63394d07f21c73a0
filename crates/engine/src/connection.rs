//! The public handle the facade crate holds: submission, close, and watch
//! registration wired through to the session engine.

use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::RwLock;

use crate::{
    auth::{NoAuth, SaslAuthenticator},
    error::Error,
    session::{Engine, EngineOptions, State},
    watch::{HandlerRef, WatchRegistration, WatchRegistry},
};

pub struct ConnectionOptions {
    pub connect_string: String,
    pub requested_timeout_ms: i32,
    pub session_id: i64,
    pub password: Vec<u8>,
    pub max_frame_len: usize,
    pub authenticator: Option<Arc<dyn SaslAuthenticator>>,
}

/// One client session: owns the engine handle, the default watcher slot,
/// and the shared watch registry.
#[derive(Clone)]
pub struct Connection {
    engine: Engine,
    default_watcher: Arc<RwLock<Option<HandlerRef>>>,
    watch_registry: Arc<WatchRegistry>,
}

impl Connection {
    pub fn open(options: ConnectionOptions) -> Result<Self, Error> {
        let default_watcher = Arc::new(RwLock::new(None));
        let watch_registry = WatchRegistry::new();

        let engine = Engine::spawn(EngineOptions {
            connect_string: options.connect_string,
            requested_timeout_ms: options.requested_timeout_ms,
            session_id: options.session_id,
            password: options.password,
            max_frame_len: options.max_frame_len,
            authenticator: options.authenticator.unwrap_or_else(|| Arc::new(NoAuth)),
            default_watcher: default_watcher.clone(),
            watch_registry: watch_registry.clone(),
        })?;

        Ok(Self {
            engine,
            default_watcher,
            watch_registry,
        })
    }

    pub fn state(&self) -> State {
        self.engine.state()
    }

    pub fn session_id(&self) -> i64 {
        self.engine.session_id()
    }

    pub fn chroot(&self) -> Option<&str> {
        self.engine.chroot()
    }

    /// Installs the default watcher, replacing any previously installed
    /// one. Receives every state-change event and any node event with no
    /// one-shot handler registered.
    pub fn set_default_watcher(&self, handler: HandlerRef) {
        *self.default_watcher.write() = Some(handler);
    }

    pub async fn submit(
        &self,
        op_code: i32,
        body: BytesMut,
        watch: Option<WatchRegistration>,
    ) -> Result<(i64, BytesMut), Error> {
        self.engine.submit(op_code, body, watch).await
    }

    /// Sends a close-session request and tears down the engine. Idempotent.
    pub async fn close(&self) -> Result<(), Error> {
        let result = self.engine.submit_close_session().await;
        self.engine.close();
        self.watch_registry.clear();
        result
    }
}
