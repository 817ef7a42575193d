//! Session configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default capacity of a session's inbound event queue.
pub const DEFAULT_INBOX_CAPACITY: usize = 256;

/// Default time an inactive collaborator stays in the roster.
pub const DEFAULT_INACTIVE_TIMEOUT_SECS: u64 = 60;

/// What to do when a session's inbound queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the incoming event and count it.
    #[default]
    DropNewest,
    /// Block the delivering transport thread until there is room.
    /// Transports that deliver on the publisher's own thread, like
    /// `LocalBus`, never block and drop instead.
    Block,
}

/// How received strokes are ordered in a collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderingMode {
    /// Append in local receipt order. Participants may end up with
    /// different orders when deliveries interleave.
    #[default]
    ReceiptOrder,
    /// Order by (sequence number, author id) so every participant converges
    /// on the same stroke order.
    Sequenced,
}

/// Tunables for a drawing/collaboration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the inbound event queue.
    pub inbox_capacity: usize,
    pub overflow: OverflowPolicy,
    pub ordering: OrderingMode,
    /// Seconds before an inactive collaborator is pruned.
    pub inactive_timeout_secs: u64,
    /// Apply each tool's smoothing to new paths.
    pub smoothing: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            overflow: OverflowPolicy::default(),
            ordering: OrderingMode::default(),
            inactive_timeout_secs: DEFAULT_INACTIVE_TIMEOUT_SECS,
            smoothing: false,
        }
    }
}

impl SessionConfig {
    pub fn inactive_timeout(&self) -> Duration {
        Duration::from_secs(self.inactive_timeout_secs)
    }

    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
