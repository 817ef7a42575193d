//! Wire messages exchanged with the relay server.
//!
//! Messages are JSON with a `type` tag:
//! ```json
//! { "type": "join", "session": "session-id" }
//! { "type": "publish", "event": { "payload": { "type": "stroke", "path": { ... } }, ... } }
//! ```

use super::SyncEvent;
use serde::{Deserialize, Serialize};

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join a shared session
    Join { session: String },
    /// Leave the current session
    Leave,
    /// Broadcast an event to the other participants
    Publish { event: SyncEvent },
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm session join, with the stroke history to replay in order
    Joined {
        session: String,
        peer_count: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        history: Vec<SyncEvent>,
    },
    /// Event from another participant
    Event { session: String, event: SyncEvent },
    /// Error message
    Error { message: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
