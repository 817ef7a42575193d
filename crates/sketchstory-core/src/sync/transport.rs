//! Transport abstraction and an in-process implementation.

use super::{InboxSender, SyncEvent};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Carries events between the participants of a session.
///
/// `publish` must not block on the network: it either hands the event off
/// for delivery or reports why it could not. Events published by one
/// participant are never delivered back to that participant.
pub trait Transport: Send + Sync {
    /// Route events for `session_id` into `inbox`. Replaces any previous
    /// subscription of this participant to the same session.
    fn subscribe(&self, session_id: &str, inbox: InboxSender) -> Result<()>;

    /// Stop routing events for `session_id`.
    fn unsubscribe(&self, session_id: &str);

    /// Send an event to every other subscriber of `session_id`.
    fn publish(&self, session_id: &str, event: &SyncEvent) -> Result<()>;
}

type Subscribers = HashMap<String, Vec<(u64, InboxSender)>>;

/// In-process message bus. Each participant talks to it through its own
/// [`LocalEndpoint`].
#[derive(Clone, Default)]
pub struct LocalBus {
    sessions: Arc<Mutex<Subscribers>>,
    next_endpoint: Arc<AtomicU64>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new participant handle.
    pub fn endpoint(&self) -> LocalEndpoint {
        LocalEndpoint {
            bus: self.clone(),
            id: self.next_endpoint.fetch_add(1, Ordering::Relaxed),
            online: AtomicBool::new(true),
        }
    }

    /// Number of subscribers currently attached to a session.
    pub fn subscriber_count(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .map(|sessions| sessions.get(session_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

/// One participant's connection to a [`LocalBus`].
pub struct LocalEndpoint {
    bus: LocalBus,
    id: u64,
    online: AtomicBool,
}

impl LocalEndpoint {
    /// Simulate losing or regaining the connection. While offline,
    /// `publish` fails.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}

impl Transport for LocalEndpoint {
    fn subscribe(&self, session_id: &str, inbox: InboxSender) -> Result<()> {
        let mut sessions = self
            .bus
            .sessions
            .lock()
            .map_err(|e| Error::SyncDelivery(format!("Lock error: {}", e)))?;
        let subscribers = sessions.entry(session_id.to_string()).or_default();
        subscribers.retain(|(id, _)| *id != self.id);
        subscribers.push((self.id, inbox));
        log::debug!("Endpoint {} subscribed to {}", self.id, session_id);
        Ok(())
    }

    fn unsubscribe(&self, session_id: &str) {
        if let Ok(mut sessions) = self.bus.sessions.lock() {
            if let Some(subscribers) = sessions.get_mut(session_id) {
                subscribers.retain(|(id, _)| *id != self.id);
                if subscribers.is_empty() {
                    sessions.remove(session_id);
                }
            }
        }
    }

    fn publish(&self, session_id: &str, event: &SyncEvent) -> Result<()> {
        if !self.is_online() {
            return Err(Error::SyncDelivery(format!(
                "endpoint {} is offline",
                self.id
            )));
        }

        // Deliver outside the lock so a blocking inbox cannot stall the bus.
        let targets: Vec<(u64, InboxSender)> = {
            let sessions = self
                .bus
                .sessions
                .lock()
                .map_err(|e| Error::SyncDelivery(format!("Lock error: {}", e)))?;
            sessions
                .get(session_id)
                .map(|subs| {
                    subs.iter()
                        .filter(|(id, _)| *id != self.id)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };

        // Delivery runs on the publisher's thread, which may also be the
        // one draining the target inbox, so it must not block.
        let mut gone = Vec::new();
        for (id, inbox) in targets {
            if !inbox.offer(event.clone()) {
                gone.push(id);
            }
        }

        if !gone.is_empty() {
            log::debug!("Dropping {} closed subscriber(s) of {}", gone.len(), session_id);
            if let Ok(mut sessions) = self.bus.sessions.lock() {
                if let Some(subscribers) = sessions.get_mut(session_id) {
                    subscribers.retain(|(id, _)| !gone.contains(id));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;
    use crate::sync::{Inbound, inbox};

    fn events(items: Vec<Inbound>) -> Vec<SyncEvent> {
        items
            .into_iter()
            .filter_map(|item| match item {
                Inbound::Event(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_publish_reaches_others_not_self() {
        let bus = LocalBus::new();
        let alice = bus.endpoint();
        let bob = bus.endpoint();
        let (alice_tx, alice_rx) = inbox(8, OverflowPolicy::DropNewest);
        let (bob_tx, bob_rx) = inbox(8, OverflowPolicy::DropNewest);
        alice.subscribe("room", alice_tx).unwrap();
        bob.subscribe("room", bob_tx).unwrap();

        alice.publish("room", &SyncEvent::left("x", 1)).unwrap();

        assert!(alice_rx.drain().is_empty());
        assert_eq!(events(bob_rx.drain()).len(), 1);
    }

    #[test]
    fn test_sessions_are_isolated() {
        let bus = LocalBus::new();
        let alice = bus.endpoint();
        let bob = bus.endpoint();
        let (bob_tx, bob_rx) = inbox(8, OverflowPolicy::DropNewest);
        bob.subscribe("other", bob_tx).unwrap();

        alice.publish("room", &SyncEvent::left("x", 1)).unwrap();
        assert!(bob_rx.drain().is_empty());
    }

    #[test]
    fn test_offline_publish_fails() {
        let bus = LocalBus::new();
        let alice = bus.endpoint();
        alice.set_online(false);

        let result = alice.publish("room", &SyncEvent::left("x", 1));
        assert!(matches!(result, Err(Error::SyncDelivery(_))));
    }

    #[test]
    fn test_closed_inbox_is_pruned() {
        let bus = LocalBus::new();
        let alice = bus.endpoint();
        let bob = bus.endpoint();
        let (bob_tx, bob_rx) = inbox(8, OverflowPolicy::DropNewest);
        bob.subscribe("room", bob_tx).unwrap();
        drop(bob_rx);

        alice.publish("room", &SyncEvent::left("x", 1)).unwrap();
        assert_eq!(bus.subscriber_count("room"), 0);
    }

    #[test]
    fn test_full_blocking_inbox_does_not_stall_publisher() {
        let bus = LocalBus::new();
        let alice = bus.endpoint();
        let bob = bus.endpoint();
        let (bob_tx, bob_rx) = inbox(1, OverflowPolicy::Block);
        bob.subscribe("room", bob_tx).unwrap();

        // Same thread publishes and drains: a blocking send would hang here.
        for n in 0..3 {
            alice.publish("room", &SyncEvent::left("x", n)).unwrap();
        }

        assert_eq!(events(bob_rx.drain()).len(), 1);
        assert_eq!(bob_rx.dropped(), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = LocalBus::new();
        let alice = bus.endpoint();
        let bob = bus.endpoint();
        let (bob_tx, bob_rx) = inbox(8, OverflowPolicy::DropNewest);
        bob.subscribe("room", bob_tx).unwrap();
        bob.unsubscribe("room");

        alice.publish("room", &SyncEvent::left("x", 1)).unwrap();
        assert!(bob_rx.drain().is_empty());
    }
}
