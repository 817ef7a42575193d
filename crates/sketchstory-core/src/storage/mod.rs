//! Persistence interface for saved drawings.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::stroke::{Path, Tool};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Drawing not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A drawing as handed to persistence: committed paths plus the style that
/// was active when it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedDrawing {
    pub paths: Vec<Path>,
    pub color: String,
    pub stroke_width: f64,
    pub tool: Tool,
    /// Save time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl SavedDrawing {
    /// Serialize the drawing to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a drawing from JSON. Cached rendered forms are rebuilt
    /// from the points.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut drawing: Self = serde_json::from_str(json)?;
        for path in &mut drawing.paths {
            path.refresh_rendered_form();
        }
        Ok(drawing)
    }
}

/// Opaque key-value store for drawings, keyed by id strings.
pub trait Storage: Send + Sync {
    /// Store a drawing under the given id, replacing any previous value.
    fn save_as(&self, id: &str, drawing: &SavedDrawing) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a drawing.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<SavedDrawing>>;

    /// Delete a drawing. Deleting a missing id is not an error.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all drawing ids.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a drawing exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;

    /// Store a drawing under a fresh id and return that id.
    fn save(&self, drawing: &SavedDrawing) -> BoxFuture<'_, StorageResult<String>> {
        let id = Uuid::new_v4().to_string();
        let pending = self.save_as(&id, drawing);
        Box::pin(async move {
            pending.await?;
            Ok(id)
        })
    }
}
