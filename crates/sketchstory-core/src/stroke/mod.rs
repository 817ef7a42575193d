//! Stroke model: points, tools and paths.

mod tool;

pub use tool::{StyleProfile, Tool};

use kurbo::{BezPath, Rect};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Unique identifier for a path.
pub type PathId = Uuid;

/// Number of points at each end of a tapered stroke that narrow down.
const TAPER_POINTS: usize = 3;

/// Current time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A recorded pointer sample in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, pressure: None }
    }

    pub fn with_pressure(x: f64, y: f64, pressure: f64) -> Self {
        Self {
            x,
            y,
            pressure: Some(pressure),
        }
    }

    /// Position without pressure, for geometry.
    pub fn position(&self) -> kurbo::Point {
        kurbo::Point::new(self.x, self.y)
    }
}

impl From<kurbo::Point> for Point {
    fn from(p: kurbo::Point) -> Self {
        Self::new(p.x, p.y)
    }
}

/// Emits the coordinates a path is drawn through.
///
/// With no smoothing factor this is the raw point sequence. With a factor
/// `k` it is a causal exponential moving average, so the coordinate emitted
/// for a point only depends on the points before it.
#[derive(Debug, Clone, Copy, Default)]
struct Emitter {
    smoothing: Option<f64>,
    last: Option<kurbo::Point>,
}

impl Emitter {
    fn new(smoothing: Option<f64>) -> Self {
        Self {
            smoothing,
            last: None,
        }
    }

    fn next(&mut self, point: &Point) -> kurbo::Point {
        let raw = point.position();
        let emitted = match (self.smoothing, self.last) {
            (Some(k), Some(prev)) => {
                kurbo::Point::new(prev.x * k + raw.x * (1.0 - k), prev.y * k + raw.y * (1.0 - k))
            }
            _ => raw,
        };
        self.last = Some(emitted);
        emitted
    }

    /// Append the move/line command for the next point.
    fn write_segment(&mut self, out: &mut String, point: &Point) {
        let first = self.last.is_none();
        let p = self.next(point);
        if first {
            let _ = write!(out, "M{} {}", p.x, p.y);
        } else {
            let _ = write!(out, " L{} {}", p.x, p.y);
        }
    }
}

/// Derive the rendered form (move/line commands) for a point sequence.
///
/// `smoothing` is the tool's smoothing factor when smoothing is enabled.
pub fn render_points(points: &[Point], smoothing: Option<f64>) -> String {
    let mut emitter = Emitter::new(smoothing);
    let mut out = String::with_capacity(points.len() * 12);
    for point in points {
        emitter.write_segment(&mut out, point);
    }
    out
}

/// One continuous stroke: tool, style, points and derived rendered form.
///
/// Points are only appended while the path is live; once committed a path
/// is frozen and only ever moved between history stacks. The rendered form
/// is a cache that can always be regenerated from the points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    id: PathId,
    tool: Tool,
    color: String,
    base_width: f64,
    points: Vec<Point>,
    #[serde(default)]
    rendered_form: String,
    created_at: u64,
    #[serde(default)]
    smoothed: bool,
    #[serde(skip)]
    emitter: Emitter,
}

impl Path {
    /// Begin a live path at `origin`.
    ///
    /// The base width is the requested width scaled by the tool's pressure
    /// multiplier and clamped to the tool's width range.
    pub(crate) fn begin(origin: Point, tool: Tool, color: &str, width: f64, smoothed: bool) -> Self {
        let mut path = Self {
            id: Uuid::new_v4(),
            tool,
            color: color.to_string(),
            base_width: tool.profile().stroke_width(width),
            points: Vec::new(),
            rendered_form: String::new(),
            created_at: now_millis(),
            smoothed,
            emitter: Emitter::new(None),
        };
        path.emitter = Emitter::new(path.smoothing());
        path.push_point(origin);
        path
    }

    /// Append a point and its line segment.
    pub(crate) fn push_point(&mut self, point: Point) {
        self.emitter.write_segment(&mut self.rendered_form, &point);
        self.points.push(point);
    }

    /// Rebuild the rendered form from the points, discarding the cached one.
    pub fn refresh_rendered_form(&mut self) {
        let mut emitter = Emitter::new(self.smoothing());
        let mut out = String::with_capacity(self.points.len() * 12);
        for point in &self.points {
            emitter.write_segment(&mut out, point);
        }
        self.rendered_form = out;
        self.emitter = emitter;
    }

    /// Smoothing factor applied to emitted coordinates, if any.
    fn smoothing(&self) -> Option<f64> {
        self.smoothed.then(|| self.tool.profile().smoothing)
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    /// Stroke width after the tool's multiplier and clamping.
    pub fn base_width(&self) -> f64 {
        self.base_width
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Renderer-facing move/line description.
    pub fn rendered_form(&self) -> &str {
        &self.rendered_form
    }

    /// Creation time in milliseconds since the Unix epoch.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_smoothed(&self) -> bool {
        self.smoothed
    }

    pub fn profile(&self) -> &'static StyleProfile {
        self.tool.profile()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Bounding box of the raw points.
    pub fn bounds(&self) -> Rect {
        if self.points.is_empty() {
            return Rect::ZERO;
        }

        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;

        for point in &self.points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        Rect::new(min_x, min_y, max_x, max_y)
    }

    /// The same geometry as the rendered form, as a kurbo path.
    pub fn to_bez_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut emitter = Emitter::new(self.smoothing());

        for (i, point) in self.points.iter().enumerate() {
            let p = emitter.next(point);
            if i == 0 {
                path.move_to(p);
            } else {
                path.line_to(p);
            }
        }

        path
    }

    /// Width at each point: base width scaled by pressure and end tapering,
    /// clamped to the tool's range.
    pub fn point_widths(&self) -> Vec<f64> {
        let profile = self.profile();
        let n = self.points.len();

        self.points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                let mut width = self.base_width * point.pressure.unwrap_or(1.0);
                if profile.tapered_ends && n > 2 {
                    let from_end = i.min(n - 1 - i);
                    let factor = ((from_end + 1) as f64 / (TAPER_POINTS + 1) as f64).min(1.0);
                    width *= factor;
                }
                profile.clamp_width(width)
            })
            .collect()
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.tool == other.tool
            && self.color == other.color
            && self.base_width == other.base_width
            && self.points == other.points
            && self.rendered_form == other.rendered_form
            && self.created_at == other.created_at
            && self.smoothed == other.smoothed
    }
}
