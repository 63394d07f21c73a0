//! Pending-request registry: an ordered outbound queue combined with an
//! xid index, backed by an `ahash::HashMap` with preallocated capacity.

use std::collections::VecDeque;

use ahash::{HashMap, HashMapExt};
use bytes::BytesMut;
use tokio::sync::oneshot;

use crate::{error::Error, watch::WatchRegistration};

/// What the pending entry owes its caller once a reply (or a terminal
/// error) arrives.
pub type Completion = oneshot::Sender<Result<(i64, BytesMut), Error>>;

pub struct PendingEntry {
    pub xid: i32,
    pub request: BytesMut,
    pub watch: Option<WatchRegistration>,
    pub completion: Completion,
    /// Set once the writer has actually put the bytes on the wire —
    /// distinguishes "ambiguous, in flight" from "never sent" on reconnect.
    pub written: bool,
}

/// Keyed by xid, with capacity pre-sized for a modest number of
/// concurrently in-flight requests.
#[derive(Default)]
pub struct PendingTable {
    order: VecDeque<i32>,
    index: HashMap<i32, PendingEntry>,
}

impl PendingTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Appends to the outbound queue and registers in the xid index. The
    /// relative order of `insert` calls is the order of submission.
    pub fn insert(&mut self, entry: PendingEntry) {
        self.order.push_back(entry.xid);
        self.index.insert(entry.xid, entry);
    }

    pub fn mark_written(&mut self, xid: i32) {
        if let Some(entry) = self.index.get_mut(&xid) {
            entry.written = true;
        }
    }

    /// The xid at the front of the outbound queue, if any — the xid a
    /// reply is expected to carry next.
    pub fn front_xid(&self) -> Option<i32> {
        self.order.front().copied()
    }

    /// Removes and returns the entry for `xid`. Callers must have already
    /// checked `front_xid() == Some(xid)`; a mismatch is a protocol error
    /// and is the caller's responsibility to detect and act on.
    pub fn remove(&mut self, xid: i32) -> Option<PendingEntry> {
        if self.order.front().copied() == Some(xid) {
            self.order.pop_front();
        } else if let Some(pos) = self.order.iter().position(|&x| x == xid) {
            self.order.remove(pos);
        }

        self.index.remove(&xid)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Removes every entry and completes each with `reason`.
    pub fn drain_with(&mut self, reason: impl Fn() -> Error) {
        self.order.clear();
        for (_, entry) in self.index.drain() {
            let _ = entry.completion.send(Err(reason()));
        }
    }

    /// Splits pending entries into those already written (ambiguous after
    /// a connection loss — must be completed with `ConnectionLoss`) and
    /// those never sent (may be retried on the next connection).
    ///
    /// Per the connection-loss request policy, this implementation treats
    /// both groups uniformly: every entry surviving a dead socket is
    /// completed with `ConnectionLoss` rather than silently retried, so the
    /// caller always makes the retry decision.
    pub fn drain_on_connection_loss(&mut self) {
        self.drain_with(|| Error::ConnectionLoss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(xid: i32) -> (PendingEntry, oneshot::Receiver<Result<(i64, BytesMut), Error>>) {
        let (tx, rx) = oneshot::channel();
        (
            PendingEntry {
                xid,
                request: BytesMut::new(),
                watch: None,
                completion: tx,
                written: false,
            },
            rx,
        )
    }

    #[test]
    fn preserves_submission_order() {
        let mut table = PendingTable::default();
        let (e1, _r1) = entry(1);
        let (e2, _r2) = entry(2);
        let (e3, _r3) = entry(3);

        table.insert(e1);
        table.insert(e2);
        table.insert(e3);

        assert_eq!(table.front_xid(), Some(1));
        table.remove(1);
        assert_eq!(table.front_xid(), Some(2));
        table.remove(2);
        assert_eq!(table.front_xid(), Some(3));
    }

    #[test]
    fn drain_completes_every_entry_with_reason() {
        let mut table = PendingTable::default();
        let (e1, r1) = entry(1);
        let (e2, r2) = entry(2);

        table.insert(e1);
        table.insert(e2);

        table.drain_on_connection_loss();

        assert!(table.is_empty());
        assert!(matches!(
            r1.blocking_recv().unwrap(),
            Err(Error::ConnectionLoss)
        ));
        assert!(matches!(
            r2.blocking_recv().unwrap(),
            Err(Error::ConnectionLoss)
        ));
    }
}
