//! Session/connection engine for a hierarchical, strongly-consistent
//! coordination service client: host rotation, the frame-level reconnect
//! loop, the pending-request registry, and the one-shot watch registry.
//!
//! The facade crate builds typed operations (Create, GetData, ...) on top
//! of [`connection::Connection`]; this crate knows nothing about node
//! paths or ACLs, only xids, zxids, and bytes.

pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod hosts;
pub mod pending;
pub mod session;
pub mod watch;
pub mod xid;

pub use connection::{Connection, ConnectionOptions};
pub use error::Error;
pub use session::State;
pub use watch::{EventType, HandlerRef, KeeperState, WatchRegistration, WatchRegistry, Watcher, WatchedEvent};
