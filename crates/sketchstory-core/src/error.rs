//! Error types for drawing and collaboration operations.

use thiserror::Error;

/// Errors raised by the drawing engine and the collaboration layer.
///
/// A missing live path is deliberately not an error: `add_point` and
/// `end_path` are silent no-ops when nothing is being drawn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Unknown tool: {0}")]
    InvalidTool(String),
    #[error("Session {0} has ended")]
    SessionEnded(String),
    #[error("Session has not been started")]
    SessionNotStarted,
    #[error("Session is already active")]
    SessionAlreadyActive,
    #[error("Sync delivery failed: {0}")]
    SyncDelivery(String),
}

/// Result type for drawing and collaboration operations.
pub type Result<T> = std::result::Result<T, Error>;
