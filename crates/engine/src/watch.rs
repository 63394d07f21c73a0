//! Watch registry: the three one-shot watch maps (`{Data, Exist, Child}`)
//! and the tagged registration variant, backed by `ahash`-keyed maps under
//! a single `parking_lot::RwLock`.

use std::sync::Arc;

use ahash::HashMap;
use parking_lot::RwLock;

/// State-change events, delivered to the default watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KeeperState {
    SyncConnected,
    Disconnected,
    Expired,
    AuthFailed,
}

/// Node events, fired by server watch notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

/// A single delivered event: either a state event (`path` empty) or a node
/// event (`event_type` set, `path` the client-visible, chroot-stripped
/// path).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WatchedEvent {
    State(KeeperState),
    Node { event_type: EventType, path: String },
}

pub trait Watcher: Send + Sync {
    fn process(&self, event: &WatchedEvent);
}

impl<F> Watcher for F
where
    F: Fn(&WatchedEvent) + Send + Sync,
{
    fn process(&self, event: &WatchedEvent) {
        (self)(event)
    }
}

pub type HandlerRef = Arc<dyn Watcher>;

/// The kind of a one-shot watch, tagging which of the three maps it lives
/// in and whether it also installs on `NoNode` (only `Exist` does).
#[derive(Clone)]
pub enum WatchRegistration {
    Data { path: String, handler: HandlerRef },
    Exist { path: String, handler: HandlerRef },
    Child { path: String, handler: HandlerRef },
}

impl WatchRegistration {
    pub fn path(&self) -> &str {
        match self {
            WatchRegistration::Data { path, .. }
            | WatchRegistration::Exist { path, .. }
            | WatchRegistration::Child { path, .. } => path,
        }
    }

    pub fn handler(&self) -> &HandlerRef {
        match self {
            WatchRegistration::Data { handler, .. }
            | WatchRegistration::Exist { handler, .. }
            | WatchRegistration::Child { handler, .. } => handler,
        }
    }

    /// Whether this registration installs even when the triggering
    /// operation returned `NoNode` — true only for `Exist`.
    pub fn installs_on_no_node(&self) -> bool {
        matches!(self, WatchRegistration::Exist { .. })
    }
}

#[derive(Default)]
struct WatchMaps {
    data: HashMap<String, Vec<HandlerRef>>,
    exist: HashMap<String, Vec<HandlerRef>>,
    child: HashMap<String, Vec<HandlerRef>>,
}

/// Owned jointly by the facade and the session engine (per the cyclic
/// reference design note): neither owns the other, both share an `Arc`.
#[derive(Default)]
pub struct WatchRegistry(RwLock<WatchMaps>);

impl WatchRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs a watch. Called by the session engine only after the
    /// triggering operation succeeds (or, for `Exist`, also on `NoNode`).
    pub fn install(&self, registration: WatchRegistration) {
        let path = registration.path().to_string();
        let mut maps = self.0.write();

        let map = match &registration {
            WatchRegistration::Data { .. } => &mut maps.data,
            WatchRegistration::Exist { .. } => &mut maps.exist,
            WatchRegistration::Child { .. } => &mut maps.child,
        };

        map.entry(path).or_insert_with(Vec::new).push(registration.handler().clone());
    }

    /// Consumes (removes) and returns the handlers that should fire for a
    /// node event of `event_type` at `path`, per the consumption rules:
    /// `NodeCreated`/`NodeDataChanged` consume `data` + `exist`;
    /// `NodeDeleted` consumes `data` + `exist` + `child`;
    /// `NodeChildrenChanged` consumes `child` only.
    pub fn consume(&self, event_type: EventType, path: &str) -> Vec<HandlerRef> {
        let mut maps = self.0.write();
        let mut handlers = Vec::new();

        let mut take = |map: &mut HashMap<String, Vec<HandlerRef>>| {
            if let Some(mut hs) = map.remove(path) {
                handlers.append(&mut hs);
            }
        };

        match event_type {
            EventType::NodeCreated | EventType::NodeDataChanged => {
                take(&mut maps.data);
                take(&mut maps.exist);
            }
            EventType::NodeDeleted => {
                take(&mut maps.data);
                take(&mut maps.exist);
                take(&mut maps.child);
            }
            EventType::NodeChildrenChanged => {
                take(&mut maps.child);
            }
        }

        handlers
    }

    /// Drops every registration without firing handlers — used once the
    /// session transitions to `Expired`, after which all watches are lost.
    pub fn clear(&self) {
        let mut maps = self.0.write();
        maps.data.clear();
        maps.exist.clear();
        maps.child.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_handler(count: Arc<AtomicUsize>) -> HandlerRef {
        Arc::new(move |_: &WatchedEvent| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn data_watch_fires_once_on_matching_event() {
        let registry = WatchRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        registry.install(WatchRegistration::Data {
            path: "/a".into(),
            handler: counting_handler(count.clone()),
        });

        let handlers = registry.consume(EventType::NodeDataChanged, "/a");
        assert_eq!(handlers.len(), 1);
        for handler in &handlers {
            handler.process(&WatchedEvent::Node {
                event_type: EventType::NodeDataChanged,
                path: "/a".into(),
            });
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // one-shot: consuming again finds nothing left.
        assert!(registry.consume(EventType::NodeDataChanged, "/a").is_empty());
    }

    #[test]
    fn delete_consumes_data_exist_and_child_watches() {
        let registry = WatchRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        registry.install(WatchRegistration::Data {
            path: "/a".into(),
            handler: counting_handler(count.clone()),
        });
        registry.install(WatchRegistration::Exist {
            path: "/a".into(),
            handler: counting_handler(count.clone()),
        });
        registry.install(WatchRegistration::Child {
            path: "/a".into(),
            handler: counting_handler(count.clone()),
        });

        let handlers = registry.consume(EventType::NodeDeleted, "/a");
        assert_eq!(handlers.len(), 3);
    }

    #[test]
    fn children_changed_does_not_consume_data_watch() {
        let registry = WatchRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        registry.install(WatchRegistration::Data {
            path: "/a".into(),
            handler: counting_handler(count),
        });

        assert!(registry.consume(EventType::NodeChildrenChanged, "/a").is_empty());
        assert_eq!(registry.consume(EventType::NodeDataChanged, "/a").len(), 1);
    }

    #[test]
    fn clear_drops_registrations_without_firing() {
        let registry = WatchRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        registry.install(WatchRegistration::Data {
            path: "/a".into(),
            handler: counting_handler(count),
        });

        registry.clear();
        assert!(registry.consume(EventType::NodeDataChanged, "/a").is_empty());
    }
}
