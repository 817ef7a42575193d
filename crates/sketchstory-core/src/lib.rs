//! SketchStory Core Library
//!
//! Freehand drawing engine with optional multi-user synchronization:
//! strokes are built from pointer gestures, kept in an undoable history and,
//! while a collaboration session is active, exchanged with other
//! participants over a [`sync::Transport`].

pub mod builder;
pub mod canvas;
pub mod collaboration;
pub mod config;
pub mod error;
pub mod history;
pub mod input;
pub mod render;
pub mod session;
pub mod storage;
pub mod stroke;
pub mod sync;

pub use builder::PathBuilder;
pub use canvas::DrawingSession;
pub use collaboration::{Applied, CollaborationSession, Collaborator, SessionStatus, StrokeEntry};
pub use config::{OrderingMode, OverflowPolicy, SessionConfig};
pub use error::{Error, Result};
pub use history::HistoryManager;
pub use input::GestureEvent;
pub use render::{RenderContext, RenderItem, Renderer, SvgRenderer};
pub use session::{CanvasCommand, CollaborativeCanvas};
pub use storage::{FileStorage, MemoryStorage, SavedDrawing, Storage, StorageError};
pub use stroke::{Path, PathId, Point, StyleProfile, Tool};
pub use sync::{
    ConnectionState, EventKind, EventPayload, LocalBus, SyncChannel, SyncEvent, Transport,
    WebSocketTransport,
};
