//! Event dispatcher: a single-threaded, FIFO event queue delivering state
//! events and node events to registered handlers in causal order. A
//! dedicated task drains an `mpsc::UnboundedReceiver<DispatchEvent>`
//! serially, so handlers never run concurrently with each other.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::watch::{EventType, HandlerRef, KeeperState, WatchRegistry, WatchedEvent};

pub enum DispatchEvent {
    State(KeeperState),
    /// `path` is the raw, still-chrooted server path; the dispatcher
    /// strips the chroot itself before consulting the watch registry.
    Node { event_type: EventType, path: String },
}

/// Handle used by producers (the session engine's reader task) to push
/// events without waiting for the dispatcher to drain them.
#[derive(Clone)]
pub struct DispatcherHandle(mpsc::UnboundedSender<DispatchEvent>);

impl DispatcherHandle {
    pub fn push(&self, event: DispatchEvent) {
        // The dispatcher task only stops once its receiver is dropped
        // (client shutdown); a send error at that point is not actionable.
        let _ = self.0.send(event);
    }
}

/// Owns the default watcher slot (mutable, shared lifetime with the
/// client) and a reference to the facade-owned watch registry, per the
/// cyclic-reference design note: neither the engine nor the facade owns
/// the other.
pub struct Dispatcher {
    default_watcher: Arc<RwLock<Option<HandlerRef>>>,
    watch_registry: Arc<WatchRegistry>,
    chroot: Option<String>,
}

impl Dispatcher {
    pub fn spawn(
        default_watcher: Arc<RwLock<Option<HandlerRef>>>,
        watch_registry: Arc<WatchRegistry>,
        chroot: Option<String>,
    ) -> DispatcherHandle {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher {
            default_watcher,
            watch_registry,
            chroot,
        };

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatcher.deliver(event);
            }
        });

        DispatcherHandle(tx)
    }

    fn strip_chroot<'a>(&self, path: &'a str) -> &'a str {
        match &self.chroot {
            Some(prefix) if path.starts_with(prefix.as_str()) => {
                let stripped = &path[prefix.len()..];
                if stripped.is_empty() { "/" } else { stripped }
            }
            _ => path,
        }
    }

    fn deliver(&self, event: DispatchEvent) {
        match event {
            DispatchEvent::State(state) => {
                if let Some(handler) = self.default_watcher.read().as_ref() {
                    handler.process(&WatchedEvent::State(state));
                }
            }
            DispatchEvent::Node { event_type, path } => {
                let client_path = self.strip_chroot(&path).to_string();
                let handlers = self.watch_registry.consume(event_type, &client_path);

                if handlers.is_empty() {
                    if let Some(handler) = self.default_watcher.read().as_ref() {
                        handler.process(&WatchedEvent::Node {
                            event_type,
                            path: client_path.clone(),
                        });
                    }
                    return;
                }

                for handler in handlers {
                    handler.process(&WatchedEvent::Node {
                        event_type,
                        path: client_path.clone(),
                    });
                }
            }
        }
    }
}
