//! Path builder: turns a live pointer gesture into a path.

use crate::error::Result;
use crate::stroke::{Path, Point, Tool};

/// Accumulates the live path for one canvas.
///
/// Gesture events can race with screen teardown, so adding to or ending a
/// path when nothing is being drawn is a silent no-op.
#[derive(Debug, Clone, Default)]
pub struct PathBuilder {
    /// The path currently being drawn.
    live: Option<Path>,
    /// Whether new paths apply their tool's smoothing.
    smoothing: bool,
}

impl PathBuilder {
    /// Create a new path builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder that smooths new paths with their tool's factor.
    pub fn with_smoothing(smoothing: bool) -> Self {
        Self {
            live: None,
            smoothing,
        }
    }

    /// Begin a live path at `origin`. Any path still live is discarded.
    pub fn start_path(&mut self, origin: Point, tool: Tool, color: &str, width: f64) -> &Path {
        if let Some(previous) = self.live.take() {
            log::debug!("Discarding unfinished path {} ({} points)", previous.id(), previous.len());
        }
        self.live.insert(Path::begin(origin, tool, color, width, self.smoothing))
    }

    /// Begin a live path for a tool given by its tag name.
    pub fn start_path_named(&mut self, origin: Point, tool: &str, color: &str, width: f64) -> Result<&Path> {
        let tool: Tool = tool.parse()?;
        Ok(self.start_path(origin, tool, color, width))
    }

    /// Append a point to the live path.
    pub fn add_point(&mut self, point: Point) {
        if let Some(path) = self.live.as_mut() {
            path.push_point(point);
        }
    }

    /// Freeze the live path and hand it over for commit.
    pub fn end_path(&mut self) -> Option<Path> {
        self.live.take()
    }

    /// Drop the live path without committing it.
    pub fn cancel(&mut self) {
        self.live = None;
    }

    /// The path currently being drawn.
    pub fn live_path(&self) -> Option<&Path> {
        self.live.as_ref()
    }

    /// Check if a path is being drawn.
    pub fn is_drawing(&self) -> bool {
        self.live.is_some()
    }

    pub fn smoothing(&self) -> bool {
        self.smoothing
    }

    pub fn set_smoothing(&mut self, smoothing: bool) {
        self.smoothing = smoothing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::stroke::render_points;

    #[test]
    fn test_start_add_end() {
        let mut builder = PathBuilder::new();
        builder.start_path(Point::new(0.0, 0.0), Tool::Pencil, "#000000", 2.0);
        builder.add_point(Point::new(5.0, 5.0));
        let path = builder.end_path().unwrap();

        assert_eq!(path.len(), 2);
        assert_eq!(path.rendered_form(), "M0 0 L5 5");
        assert!((path.base_width() - 2.0).abs() < f64::EPSILON);
        assert!(!builder.is_drawing());
    }

    #[test]
    fn test_start_renders_move_to() {
        let mut builder = PathBuilder::new();
        let path = builder.start_path(Point::new(3.0, 4.0), Tool::Crayon, "#FF0000", 2.0);
        assert_eq!(path.rendered_form(), "M3 4");
        assert_eq!(path.color(), "#FF0000");
    }

    #[test]
    fn test_start_named_unknown_tool() {
        let mut builder = PathBuilder::new();
        let result = builder.start_path_named(Point::new(0.0, 0.0), "brush", "#000000", 2.0);
        assert!(matches!(result, Err(Error::InvalidTool(tag)) if tag == "brush"));
        assert!(!builder.is_drawing());
    }

    #[test]
    fn test_start_named_known_tool() {
        let mut builder = PathBuilder::new();
        let path = builder
            .start_path_named(Point::new(0.0, 0.0), "highlight", "#FFFF00", 2.0)
            .unwrap();
        assert_eq!(path.tool(), Tool::Highlight);
    }

    #[test]
    fn test_add_point_without_live_path_is_noop() {
        let mut builder = PathBuilder::new();
        builder.add_point(Point::new(1.0, 1.0));
        assert!(builder.live_path().is_none());
        assert!(builder.end_path().is_none());
    }

    #[test]
    fn test_restart_discards_previous() {
        let mut builder = PathBuilder::new();
        builder.start_path(Point::new(0.0, 0.0), Tool::Pen, "#000000", 1.0);
        builder.add_point(Point::new(1.0, 1.0));
        builder.start_path(Point::new(9.0, 9.0), Tool::Pen, "#000000", 1.0);
        let path = builder.end_path().unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.rendered_form(), "M9 9");
    }

    #[test]
    fn test_cancel() {
        let mut builder = PathBuilder::new();
        builder.start_path(Point::new(0.0, 0.0), Tool::Pen, "#000000", 1.0);
        builder.cancel();
        assert!(builder.end_path().is_none());
    }

    #[test]
    fn test_construction_is_deterministic() {
        let points: Vec<Point> = (0..50)
            .map(|i| Point::new((i as f64 * 0.37).sin() * 40.0, i as f64 * 1.1))
            .collect();

        let draw = |smoothing: bool| {
            let mut builder = PathBuilder::with_smoothing(smoothing);
            builder.start_path(points[0], Tool::Marker, "#00FF00", 3.0);
            for p in &points[1..] {
                builder.add_point(*p);
            }
            builder.end_path().unwrap()
        };

        assert_eq!(draw(false).rendered_form(), draw(false).rendered_form());
        assert_eq!(draw(true).rendered_form(), draw(true).rendered_form());
        assert_eq!(draw(false).rendered_form(), render_points(&points, None));
    }
}
