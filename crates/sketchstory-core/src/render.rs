//! Render list handed to drawing backends.

use crate::canvas::DrawingSession;
use crate::stroke::{Path, Tool};
use kurbo::Rect;
use std::fmt::Write as _;

/// Canvas background. Eraser strokes are painted in this colour.
pub const BACKGROUND_COLOR: &str = "#FFFFFF";

/// One stroke as a backend sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    /// Vector path description (move/line commands).
    pub d: String,
    pub color: String,
    pub width: f64,
    pub opacity: f64,
    pub tool: Tool,
    /// Width at each point of `d`, after pressure and end tapering.
    pub widths: Vec<f64>,
}

impl RenderItem {
    pub fn from_path(path: &Path, background: &str) -> Self {
        let color = if path.tool().is_eraser() {
            background.to_string()
        } else {
            path.color().to_string()
        };
        Self {
            d: path.rendered_form().to_string(),
            color,
            width: path.base_width(),
            opacity: path.profile().opacity,
            tool: path.tool(),
            widths: path.point_widths(),
        }
    }

    /// True when the width changes along the stroke.
    pub fn is_variable_width(&self) -> bool {
        self.widths
            .windows(2)
            .any(|pair| (pair[0] - pair[1]).abs() > f64::EPSILON)
    }
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone)]
pub struct RenderContext {
    /// Strokes, back to front. The live stroke, if any, is last.
    pub items: Vec<RenderItem>,
    pub background_color: String,
    /// Area to draw. Defaults to the bounds of all strokes.
    pub viewport: Option<Rect>,
}

impl RenderContext {
    pub fn new(session: &DrawingSession) -> Self {
        Self::from_paths(session.render_paths()).with_viewport(session.bounds())
    }

    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Self {
        Self {
            items: paths
                .into_iter()
                .map(|p| RenderItem::from_path(p, BACKGROUND_COLOR))
                .collect(),
            background_color: BACKGROUND_COLOR.to_string(),
            viewport: None,
        }
    }

    /// Set the background colour. Eraser items are recoloured to match.
    pub fn with_background(mut self, color: impl Into<String>) -> Self {
        self.background_color = color.into();
        for item in &mut self.items {
            if item.tool.is_eraser() {
                item.color = self.background_color.clone();
            }
        }
        self
    }

    pub fn with_viewport(mut self, viewport: Option<Rect>) -> Self {
        self.viewport = viewport;
        self
    }
}

/// Trait for rendering backends.
pub trait Renderer {
    /// Build the drawing commands for a frame.
    fn build_scene(&mut self, ctx: &RenderContext);

    /// Get the background color (for clearing).
    fn background_color<'a>(&self, ctx: &'a RenderContext) -> &'a str {
        &ctx.background_color
    }
}

/// Renders to a standalone SVG document.
#[derive(Debug, Default)]
pub struct SvgRenderer {
    /// Extra space around the viewport.
    padding: f64,
    output: String,
}

impl SvgRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_padding(padding: f64) -> Self {
        Self {
            padding,
            output: String::new(),
        }
    }

    /// The document produced by the last `build_scene`.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }
}

impl Renderer for SvgRenderer {
    fn build_scene(&mut self, ctx: &RenderContext) {
        let view = ctx
            .viewport
            .unwrap_or(Rect::ZERO)
            .inflate(self.padding, self.padding);
        let mut out = String::new();

        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}" width="{}" height="{}">"#,
            view.x0,
            view.y0,
            view.width(),
            view.height(),
            view.width(),
            view.height()
        );
        let _ = write!(
            out,
            r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{}"/>"#,
            view.x0,
            view.y0,
            view.width(),
            view.height(),
            escape(self.background_color(ctx))
        );

        for item in &ctx.items {
            if item.d.is_empty() {
                continue;
            }
            let coords: Vec<&str> = item.d.trim_start_matches('M').split(" L").collect();
            if item.is_variable_width() && coords.len() == item.widths.len() {
                // One segment per pair of points, at their mean width.
                for (i, pair) in coords.windows(2).enumerate() {
                    let d = format!("M{} L{}", pair[0], pair[1]);
                    let width = (item.widths[i] + item.widths[i + 1]) / 2.0;
                    write_path(&mut out, &d, item, width);
                }
            } else {
                write_path(&mut out, &item.d, item, item.width);
            }
        }
        out.push_str("</svg>");

        self.output = out;
    }
}

fn write_path(out: &mut String, d: &str, item: &RenderItem, width: f64) {
    let _ = write!(
        out,
        r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-opacity="{}" stroke-linecap="round" stroke-linejoin="round"/>"#,
        escape(d),
        escape(&item.color),
        width,
        item.opacity
    );
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
