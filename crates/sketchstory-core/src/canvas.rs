//! Drawing session state for one canvas.

use crate::builder::PathBuilder;
use crate::config::SessionConfig;
use crate::history::HistoryManager;
use crate::input::GestureEvent;
use crate::storage::SavedDrawing;
use crate::stroke::{Path, Point, Tool, now_millis};
use kurbo::Rect;
use uuid::Uuid;

/// Default stroke colour for a fresh canvas.
pub const DEFAULT_COLOR: &str = "#000000";

/// Default requested stroke width for a fresh canvas.
pub const DEFAULT_STROKE_WIDTH: f64 = 3.0;

/// Committed paths plus the live path of one canvas.
///
/// The renderer observes the committed paths with the live path appended,
/// so a stroke is visible while it is still being drawn.
#[derive(Debug, Clone)]
pub struct DrawingSession {
    /// Unique canvas identifier.
    pub id: String,
    /// Tool applied to new strokes.
    tool: Tool,
    /// Colour applied to new strokes.
    color: String,
    /// Requested width for new strokes, before the tool's multiplier.
    stroke_width: f64,
    builder: PathBuilder,
    history: HistoryManager,
}

impl Default for DrawingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingSession {
    /// Create an empty canvas.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tool: Tool::default(),
            color: DEFAULT_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
            builder: PathBuilder::new(),
            history: HistoryManager::new(),
        }
    }

    /// Create an empty canvas using the given configuration.
    pub fn with_config(config: &SessionConfig) -> Self {
        let mut session = Self::new();
        session.builder.set_smoothing(config.smoothing);
        session
    }

    /// Restore a canvas from a saved drawing. Rendered forms are rebuilt
    /// from the stored points.
    pub fn from_saved(drawing: SavedDrawing) -> Self {
        let mut session = Self::new();
        session.tool = drawing.tool;
        session.color = drawing.color;
        session.stroke_width = drawing.stroke_width;
        session.history.reseed(drawing.paths);
        session
    }

    /// Capture the committed paths and current style for persistence.
    pub fn snapshot(&self) -> SavedDrawing {
        SavedDrawing {
            paths: self.history.visible().to_vec(),
            color: self.color.clone(),
            stroke_width: self.stroke_width,
            tool: self.tool,
            timestamp: now_millis(),
        }
    }

    // --- Style ---

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn stroke_width(&self) -> f64 {
        self.stroke_width
    }

    pub fn set_stroke_width(&mut self, width: f64) {
        self.stroke_width = width;
    }

    // --- Strokes ---

    /// Start a live stroke with the current style. Invalidates redo.
    pub fn begin_stroke(&mut self, origin: Point) -> &Path {
        self.history.clear_redo();
        self.builder.start_path(origin, self.tool, &self.color, self.stroke_width)
    }

    /// Append a point to the live stroke, if any.
    pub fn extend_stroke(&mut self, point: Point) {
        self.builder.add_point(point);
    }

    /// Finish the live stroke and commit it to history.
    /// Returns the committed path, or `None` if nothing was being drawn.
    pub fn end_stroke(&mut self) -> Option<&Path> {
        let path = self.builder.end_path()?;
        log::debug!("Committed path {} with {} points", path.id(), path.len());
        self.history.commit(path);
        self.history.visible().last()
    }

    /// Drop the live stroke without committing it.
    pub fn cancel_stroke(&mut self) {
        self.builder.cancel();
    }

    /// Feed one gesture event. Returns the committed path when a gesture ends.
    pub fn handle_gesture(&mut self, event: GestureEvent) -> Option<&Path> {
        match event {
            GestureEvent::Start { point } => {
                self.begin_stroke(point);
                None
            }
            GestureEvent::Move { point } => {
                self.extend_stroke(point);
                None
            }
            GestureEvent::End => self.end_stroke(),
            GestureEvent::Cancel => {
                self.cancel_stroke();
                None
            }
        }
    }

    /// Append a path drawn by another participant.
    pub fn apply_remote(&mut self, mut path: Path) {
        path.refresh_rendered_form();
        self.history.push_remote(path);
    }

    /// Insert a path drawn by another participant at `index` of the
    /// committed paths.
    pub fn insert_remote(&mut self, index: usize, mut path: Path) {
        path.refresh_rendered_form();
        self.history.insert_remote(index, path);
    }

    /// Move the most recently committed path to `index`.
    pub fn move_last_to(&mut self, index: usize) {
        self.history.move_last_to(index);
    }

    // --- History ---

    /// Undo the last committed stroke.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    /// Redo the last undone stroke.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    /// Clear the canvas. Undoable through redo.
    pub fn clear(&mut self) {
        self.builder.cancel();
        self.history.clear();
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    // --- Rendering ---

    /// Committed paths, oldest first.
    pub fn committed_paths(&self) -> &[Path] {
        self.history.visible()
    }

    /// The stroke currently being drawn.
    pub fn live_path(&self) -> Option<&Path> {
        self.builder.live_path()
    }

    /// Everything the renderer should draw, back to front.
    pub fn render_paths(&self) -> impl Iterator<Item = &Path> {
        self.history.visible().iter().chain(self.builder.live_path())
    }

    /// Get the bounding box of all visible strokes.
    pub fn bounds(&self) -> Option<Rect> {
        let mut result: Option<Rect> = None;
        for path in self.render_paths() {
            let bounds = path.bounds();
            result = Some(match result {
                Some(r) => r.union(bounds),
                None => bounds,
            });
        }
        result
    }

    /// Check if the canvas has no committed strokes.
    pub fn is_empty(&self) -> bool {
        self.history.visible().is_empty()
    }

    /// Get the number of committed strokes.
    pub fn len(&self) -> usize {
        self.history.visible().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(session: &mut DrawingSession, from: (f64, f64), to: (f64, f64)) {
        session.handle_gesture(GestureEvent::start(from.0, from.1));
        session.handle_gesture(GestureEvent::move_to(to.0, to.1));
        session.handle_gesture(GestureEvent::End);
    }

    #[test]
    fn test_new_session_defaults() {
        let session = DrawingSession::new();
        assert_eq!(session.tool(), Tool::Pencil);
        assert_eq!(session.color(), DEFAULT_COLOR);
        assert!(session.is_empty());
        assert!(session.bounds().is_none());
    }

    #[test]
    fn test_gesture_commits_path() {
        let mut session = DrawingSession::new();
        session.set_stroke_width(2.0);
        session.handle_gesture(GestureEvent::start(0.0, 0.0));
        session.handle_gesture(GestureEvent::move_to(5.0, 5.0));
        let path = session.handle_gesture(GestureEvent::End).unwrap();

        assert_eq!(path.len(), 2);
        assert_eq!(path.rendered_form(), "M0 0 L5 5");
        assert!((path.base_width() - 2.0).abs() < f64::EPSILON);
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_live_path_is_rendered() {
        let mut session = DrawingSession::new();
        draw(&mut session, (0.0, 0.0), (1.0, 1.0));
        session.begin_stroke(Point::new(10.0, 10.0));
        session.extend_stroke(Point::new(20.0, 20.0));

        let rendered: Vec<_> = session.render_paths().collect();
        assert_eq!(rendered.len(), 2);
        assert_eq!(rendered[1].rendered_form(), "M10 10 L20 20");
        assert_eq!(session.committed_paths().len(), 1);
    }

    #[test]
    fn test_end_without_start_is_noop() {
        let mut session = DrawingSession::new();
        session.extend_stroke(Point::new(1.0, 1.0));
        assert!(session.end_stroke().is_none());
        assert!(session.is_empty());
    }

    #[test]
    fn test_cancel_gesture() {
        let mut session = DrawingSession::new();
        session.handle_gesture(GestureEvent::start(0.0, 0.0));
        session.handle_gesture(GestureEvent::Cancel);
        assert!(session.handle_gesture(GestureEvent::End).is_none());
        assert!(session.is_empty());
    }

    #[test]
    fn test_starting_stroke_clears_redo() {
        let mut session = DrawingSession::new();
        draw(&mut session, (0.0, 0.0), (1.0, 1.0));
        draw(&mut session, (2.0, 2.0), (3.0, 3.0));
        session.undo();
        assert!(session.can_redo());

        session.begin_stroke(Point::new(4.0, 4.0));
        assert!(!session.can_redo());
    }

    #[test]
    fn test_clear_then_redo_restores() {
        let mut session = DrawingSession::new();
        draw(&mut session, (0.0, 0.0), (1.0, 1.0));
        draw(&mut session, (2.0, 2.0), (3.0, 3.0));
        session.begin_stroke(Point::new(9.0, 9.0));

        session.clear();
        assert!(session.is_empty());
        assert!(session.live_path().is_none());

        session.redo();
        session.redo();
        assert_eq!(session.len(), 2);
        assert_eq!(session.committed_paths()[0].rendered_form(), "M0 0 L1 1");
    }

    #[test]
    fn test_apply_remote_keeps_redo() {
        let mut session = DrawingSession::new();
        draw(&mut session, (0.0, 0.0), (1.0, 1.0));
        session.undo();

        let mut other = DrawingSession::new();
        draw(&mut other, (5.0, 5.0), (6.0, 6.0));
        session.apply_remote(other.committed_paths()[0].clone());

        assert_eq!(session.len(), 1);
        assert!(session.can_redo());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut session = DrawingSession::new();
        session.set_tool(Tool::Crayon);
        session.set_color("#FF0000");
        draw(&mut session, (0.0, 0.0), (4.0, 2.0));

        let restored = DrawingSession::from_saved(session.snapshot());
        assert_eq!(restored.tool(), Tool::Crayon);
        assert_eq!(restored.color(), "#FF0000");
        assert_eq!(restored.committed_paths(), session.committed_paths());
    }

    #[test]
    fn test_bounds_include_live_path() {
        let mut session = DrawingSession::new();
        draw(&mut session, (0.0, 0.0), (10.0, 10.0));
        session.begin_stroke(Point::new(50.0, 5.0));

        let bounds = session.bounds().unwrap();
        assert!((bounds.x1 - 50.0).abs() < f64::EPSILON);
    }
}
