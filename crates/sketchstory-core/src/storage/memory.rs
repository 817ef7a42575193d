//! In-memory storage implementation.

use super::{BoxFuture, SavedDrawing, Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    drawings: RwLock<HashMap<String, SavedDrawing>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn save_as(&self, id: &str, drawing: &SavedDrawing) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        let drawing = drawing.clone();
        Box::pin(async move {
            let mut drawings = self
                .drawings
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            drawings.insert(id, drawing);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<SavedDrawing>> {
        let id = id.to_string();
        Box::pin(async move {
            let drawings = self
                .drawings
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            drawings.get(&id).cloned().ok_or(StorageError::NotFound(id))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut drawings = self
                .drawings
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            drawings.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let drawings = self
                .drawings
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            Ok(drawings.keys().cloned().collect())
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let drawings = self
                .drawings
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            Ok(drawings.contains_key(&id))
        })
    }
}
