//! Bounded per-subscriber inbox.

use super::{ConnectionState, SyncEvent};
use crate::config::OverflowPolicy;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, TrySendError, sync_channel};

/// Something a transport hands to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(SyncEvent),
    /// The transport could not deliver or receive.
    Failure(String),
    Connection(ConnectionState),
}

/// Create an inbox holding at most `capacity` undrained items.
pub fn inbox(capacity: usize, policy: OverflowPolicy) -> (InboxSender, Inbox) {
    let (tx, rx) = sync_channel(capacity.max(1));
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        InboxSender {
            tx,
            policy,
            dropped: dropped.clone(),
        },
        Inbox { rx, dropped },
    )
}

/// Producer side, held by a transport.
#[derive(Debug, Clone)]
pub struct InboxSender {
    tx: SyncSender<Inbound>,
    policy: OverflowPolicy,
    dropped: Arc<AtomicUsize>,
}

impl InboxSender {
    /// Deliver an event. Returns false once the receiving side is gone.
    pub fn deliver(&self, event: SyncEvent) -> bool {
        self.push(Inbound::Event(event))
    }

    /// Deliver an event without ever blocking: a full inbox drops it and
    /// counts the drop, whatever the overflow policy.
    pub fn offer(&self, event: SyncEvent) -> bool {
        self.try_push(Inbound::Event(event))
    }

    pub fn report_failure(&self, reason: impl Into<String>) -> bool {
        self.push(Inbound::Failure(reason.into()))
    }

    pub fn report_connection(&self, state: ConnectionState) -> bool {
        self.push(Inbound::Connection(state))
    }

    fn push(&self, item: Inbound) -> bool {
        match self.policy {
            OverflowPolicy::DropNewest => self.try_push(item),
            OverflowPolicy::Block => self.tx.send(item).is_ok(),
        }
    }

    fn try_push(&self, item: Inbound) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(item)) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("Inbox full, dropping {} ({} dropped so far)", kind_of(&item), total);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

fn kind_of(item: &Inbound) -> &'static str {
    match item {
        Inbound::Event(_) => "event",
        Inbound::Failure(_) => "failure",
        Inbound::Connection(_) => "connection update",
    }
}

/// Consumer side, owned by a [`SyncChannel`](super::SyncChannel).
#[derive(Debug)]
pub struct Inbox {
    rx: Receiver<Inbound>,
    dropped: Arc<AtomicUsize>,
}

impl Inbox {
    /// Take everything currently queued, oldest first. Never blocks.
    pub fn drain(&self) -> Vec<Inbound> {
        let mut items = Vec::new();
        loop {
            match self.rx.try_recv() {
                Ok(item) => items.push(item),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        items
    }

    /// Number of items discarded because the inbox was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
