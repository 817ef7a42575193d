//! Event synchronization between participants of a shared session.
//!
//! Events are published through a [`Transport`] and arrive at every other
//! subscriber's bounded inbox. A [`SyncChannel`] drains its inbox on
//! [`SyncChannel::poll`] and hands events to its handlers in receipt order.

mod channel;
mod inbox;
pub mod protocol;
mod transport;
mod websocket;

pub use channel::{EventHandler, SyncChannel};
pub use inbox::{Inbound, Inbox, InboxSender, inbox};
pub use transport::{LocalBus, LocalEndpoint, Transport};
pub use websocket::WebSocketTransport;

use crate::collaboration::Collaborator;
use crate::stroke::{Path, now_millis};
use serde::{Deserialize, Serialize};

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// What a sync event carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A finished stroke.
    Stroke { path: Path },
    /// A participant announced itself.
    Joined { collaborator: Collaborator },
    /// A participant left.
    Left { collaborator_id: String },
}

/// Discriminant of an [`EventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Stroke,
    CollaboratorJoined,
    CollaboratorLeft,
}

/// A change notification exchanged between participants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub payload: EventPayload,
    /// Milliseconds since the Unix epoch at the author.
    pub timestamp: u64,
    pub author_id: String,
    /// Author's logical clock when the event was created.
    #[serde(default)]
    pub seq: u64,
}

impl SyncEvent {
    pub fn new(payload: EventPayload, author_id: impl Into<String>, seq: u64) -> Self {
        Self {
            payload,
            timestamp: now_millis(),
            author_id: author_id.into(),
            seq,
        }
    }

    pub fn stroke(path: Path, author_id: impl Into<String>, seq: u64) -> Self {
        Self::new(EventPayload::Stroke { path }, author_id, seq)
    }

    pub fn joined(collaborator: Collaborator, seq: u64) -> Self {
        let author_id = collaborator.id.clone();
        Self::new(EventPayload::Joined { collaborator }, author_id, seq)
    }

    pub fn left(collaborator_id: impl Into<String>, seq: u64) -> Self {
        let collaborator_id = collaborator_id.into();
        Self::new(
            EventPayload::Left {
                collaborator_id: collaborator_id.clone(),
            },
            collaborator_id,
            seq,
        )
    }

    pub fn kind(&self) -> EventKind {
        match self.payload {
            EventPayload::Stroke { .. } => EventKind::Stroke,
            EventPayload::Joined { .. } => EventKind::CollaboratorJoined,
            EventPayload::Left { .. } => EventKind::CollaboratorLeft,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse an event. Stroke paths get their rendered form rebuilt from
    /// their points.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut event: Self = serde_json::from_str(json)?;
        if let EventPayload::Stroke { path } = &mut event.payload {
            path.refresh_rendered_form();
        }
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PathBuilder;
    use crate::stroke::{Point, Tool};

    fn sample_path() -> Path {
        let mut builder = PathBuilder::new();
        builder.start_path(Point::new(1.0, 1.0), Tool::Marker, "#FF0000", 4.0);
        builder.add_point(Point::new(2.0, 3.0));
        builder.end_path().unwrap()
    }

    #[test]
    fn test_stroke_event_json_shape() {
        let event = SyncEvent::stroke(sample_path(), "alice", 3);
        let json = event.to_json().unwrap();

        assert!(json.contains("\"type\":\"stroke\""));
        assert!(json.contains("\"author_id\":\"alice\""));
        assert!(json.contains("\"seq\":3"));

        let parsed = SyncEvent::from_json(&json).unwrap();
        assert_eq!(parsed, event);
        assert_eq!(parsed.kind(), EventKind::Stroke);
    }

    #[test]
    fn test_left_event_is_authored_by_leaver() {
        let event = SyncEvent::left("bob", 0);
        assert_eq!(event.author_id, "bob");
        assert_eq!(event.kind(), EventKind::CollaboratorLeft);
    }

    #[test]
    fn test_missing_seq_defaults_to_zero() {
        let json = r#"{"payload":{"type":"left","collaborator_id":"bob"},"timestamp":5,"author_id":"bob"}"#;
        let event = SyncEvent::from_json(json).unwrap();
        assert_eq!(event.seq, 0);
        assert_eq!(event.timestamp, 5);
    }
}
