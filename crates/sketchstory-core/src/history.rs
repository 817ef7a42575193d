//! Undo/redo history over committed paths.

use crate::stroke::Path;
use std::collections::VecDeque;

/// Undo and redo stacks over committed paths.
///
/// The undo stack holds the visible paths, most recent last. The redo stack
/// holds hidden paths, most recently undone first. A path lives in exactly
/// one of the two and moves between them by value.
#[derive(Debug, Clone, Default)]
pub struct HistoryManager {
    undo_stack: Vec<Path>,
    redo_stack: VecDeque<Path>,
}

impl HistoryManager {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit a finished path. Invalidates the redo branch.
    pub fn commit(&mut self, path: Path) {
        self.undo_stack.push(path);
        self.redo_stack.clear();
    }

    /// Append a path authored elsewhere without touching the redo branch.
    pub fn push_remote(&mut self, path: Path) {
        self.undo_stack.push(path);
    }

    /// Insert a path authored elsewhere at `index` of the visible paths,
    /// clamped to the end. The redo branch is untouched.
    pub fn insert_remote(&mut self, index: usize, path: Path) {
        let index = index.min(self.undo_stack.len());
        self.undo_stack.insert(index, path);
    }

    /// Move the most recent visible path to `index`.
    pub fn move_last_to(&mut self, index: usize) {
        if let Some(path) = self.undo_stack.pop() {
            let index = index.min(self.undo_stack.len());
            self.undo_stack.insert(index, path);
        }
    }

    /// Hide the most recent visible path.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self) -> bool {
        match self.undo_stack.pop() {
            Some(mut path) => {
                path.refresh_rendered_form();
                self.redo_stack.push_front(path);
                true
            }
            None => false,
        }
    }

    /// Restore the most recently hidden path.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self) -> bool {
        match self.redo_stack.pop_front() {
            Some(mut path) => {
                path.refresh_rendered_form();
                self.undo_stack.push(path);
                true
            }
            None => false,
        }
    }

    /// Hide every visible path. Undoable: successive redos restore the
    /// paths in their original order.
    pub fn clear(&mut self) {
        for path in self.undo_stack.drain(..).rev() {
            self.redo_stack.push_front(path);
        }
    }

    /// Drop the redo branch, e.g. when a new path starts.
    pub fn clear_redo(&mut self) {
        self.redo_stack.clear();
    }

    /// Replace the visible paths, dropping all history.
    pub fn reseed(&mut self, paths: impl IntoIterator<Item = Path>) {
        self.undo_stack = paths
            .into_iter()
            .map(|mut path| {
                path.refresh_rendered_form();
                path
            })
            .collect();
        self.redo_stack.clear();
    }

    /// Visible paths, oldest first.
    pub fn visible(&self) -> &[Path] {
        &self.undo_stack
    }

    /// Hidden paths, most recently undone first.
    pub fn hidden(&self) -> impl Iterator<Item = &Path> {
        self.redo_stack.iter()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }
}
