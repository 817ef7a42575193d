//! One participant's attachment to a shared session.

use super::{ConnectionState, Inbound, Inbox, SyncEvent, Transport, inbox};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use std::sync::Arc;

/// Callback invoked for each received event.
pub type EventHandler = Box<dyn FnMut(&SyncEvent) + Send>;

/// Publishes local events and receives remote ones for a single session.
///
/// Received events sit in a bounded inbox until [`poll`](Self::poll) drains
/// them; handlers run on the polling thread, one event at a time.
pub struct SyncChannel {
    session_id: String,
    transport: Arc<dyn Transport>,
    /// `None` once closed.
    inbox: Option<Inbox>,
    handlers: Vec<EventHandler>,
    state: ConnectionState,
    failures: Vec<Error>,
}

impl SyncChannel {
    /// Subscribe to `session_id` through `transport`.
    pub fn open(
        session_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: &SessionConfig,
    ) -> Result<Self> {
        let session_id = session_id.into();
        let (sender, receiver) = inbox(config.inbox_capacity, config.overflow);
        transport.subscribe(&session_id, sender)?;
        log::info!("Opened sync channel for session {}", session_id);

        Ok(Self {
            session_id,
            transport,
            inbox: Some(receiver),
            handlers: Vec::new(),
            state: ConnectionState::Connected,
            failures: Vec::new(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send an event to the other participants.
    ///
    /// Fails with [`Error::SessionEnded`] after [`close`](Self::close), or
    /// with [`Error::SyncDelivery`] when the transport rejects the event.
    pub fn publish(&self, event: &SyncEvent) -> Result<()> {
        if self.inbox.is_none() {
            return Err(Error::SessionEnded(self.session_id.clone()));
        }
        self.transport.publish(&self.session_id, event)
    }

    /// Register a handler for received events.
    pub fn on_event(&mut self, handler: impl FnMut(&SyncEvent) + Send + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Drain the inbox, run the handlers and return the events in receipt
    /// order. Transport failures are kept for [`take_failures`](Self::take_failures).
    pub fn poll(&mut self) -> Vec<SyncEvent> {
        let Some(inbox) = &self.inbox else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for item in inbox.drain() {
            match item {
                Inbound::Event(event) => {
                    for handler in &mut self.handlers {
                        handler(&event);
                    }
                    events.push(event);
                }
                Inbound::Failure(reason) => {
                    log::warn!("Sync failure on {}: {}", self.session_id, reason);
                    self.failures.push(Error::SyncDelivery(reason));
                }
                Inbound::Connection(state) => {
                    log::info!("Session {} connection: {:?}", self.session_id, state);
                    self.state = state;
                }
            }
        }
        events
    }

    /// Take the failures reported by the transport since the last call.
    pub fn take_failures(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.failures)
    }

    /// Unsubscribe and discard anything still queued. Idempotent.
    pub fn close(&mut self) {
        if self.inbox.take().is_some() {
            self.transport.unsubscribe(&self.session_id);
            self.state = ConnectionState::Disconnected;
            log::info!("Closed sync channel for session {}", self.session_id);
        }
    }

    pub fn is_open(&self) -> bool {
        self.inbox.is_some()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Events discarded because the inbox was full.
    pub fn dropped_events(&self) -> usize {
        self.inbox.as_ref().map_or(0, Inbox::dropped)
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverflowPolicy;
    use crate::sync::LocalBus;
    use std::sync::Mutex;

    fn channel(bus: &LocalBus, config: &SessionConfig) -> SyncChannel {
        SyncChannel::open("story", Arc::new(bus.endpoint()), config).unwrap()
    }

    #[test]
    fn test_events_arrive_in_publish_order() {
        let bus = LocalBus::new();
        let config = SessionConfig::default();
        let alice = channel(&bus, &config);
        let mut bob = channel(&bus, &config);

        for n in 0..5 {
            alice.publish(&SyncEvent::left("alice", n)).unwrap();
        }

        let seqs: Vec<u64> = bob.poll().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert!(bob.poll().is_empty());
    }

    #[test]
    fn test_handlers_see_every_event() {
        let bus = LocalBus::new();
        let config = SessionConfig::default();
        let alice = channel(&bus, &config);
        let mut bob = channel(&bus, &config);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        bob.on_event(move |event| sink.lock().unwrap().push(event.seq));

        alice.publish(&SyncEvent::left("alice", 7)).unwrap();
        alice.publish(&SyncEvent::left("alice", 8)).unwrap();
        bob.poll();

        assert_eq!(*seen.lock().unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_publish_after_close_fails() {
        let bus = LocalBus::new();
        let mut alice = channel(&bus, &SessionConfig::default());
        alice.close();
        alice.close();

        let result = alice.publish(&SyncEvent::left("alice", 1));
        assert_eq!(result, Err(Error::SessionEnded("story".to_string())));
        assert_eq!(bus.subscriber_count("story"), 0);
    }

    #[test]
    fn test_closed_channel_receives_nothing() {
        let bus = LocalBus::new();
        let config = SessionConfig::default();
        let alice = channel(&bus, &config);
        let mut bob = channel(&bus, &config);
        bob.close();

        alice.publish(&SyncEvent::left("alice", 1)).unwrap();
        assert!(bob.poll().is_empty());
    }

    #[test]
    fn test_overflow_is_counted() {
        let bus = LocalBus::new();
        let config = SessionConfig {
            inbox_capacity: 2,
            overflow: OverflowPolicy::DropNewest,
            ..SessionConfig::default()
        };
        let alice = channel(&bus, &config);
        let mut bob = channel(&bus, &config);

        for n in 0..4 {
            alice.publish(&SyncEvent::left("alice", n)).unwrap();
        }

        assert_eq!(bob.dropped_events(), 2);
        let seqs: Vec<u64> = bob.poll().iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let bus = LocalBus::new();
        let endpoint = Arc::new(bus.endpoint());
        let alice = SyncChannel::open("story", endpoint.clone(), &SessionConfig::default()).unwrap();
        endpoint.set_online(false);

        let result = alice.publish(&SyncEvent::left("alice", 1));
        assert!(matches!(result, Err(Error::SyncDelivery(_))));
    }
}
