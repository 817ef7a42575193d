//! Drawing tools and their static style profiles.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Available drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pencil,
    Crayon,
    Marker,
    Pen,
    Highlight,
    Eraser,
}

/// Per-tool stroke parameters. Static configuration, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleProfile {
    /// Smoothing factor in `[0, 1]`; 0 follows the pointer exactly.
    pub smoothing: f64,
    /// Multiplier applied to the requested stroke width.
    pub pressure_multiplier: f64,
    /// Whether stroke ends narrow towards the first and last points.
    pub tapered_ends: bool,
    pub min_width: f64,
    pub max_width: f64,
    /// Stroke opacity handed to the renderer.
    pub opacity: f64,
}

impl StyleProfile {
    /// Clamp a width into this profile's `[min_width, max_width]` range.
    pub fn clamp_width(&self, width: f64) -> f64 {
        width.clamp(self.min_width, self.max_width)
    }

    /// Width of a committed stroke for the requested width.
    pub fn stroke_width(&self, requested: f64) -> f64 {
        self.clamp_width(requested * self.pressure_multiplier)
    }
}

const PENCIL: StyleProfile = StyleProfile {
    smoothing: 0.4,
    pressure_multiplier: 1.2,
    tapered_ends: true,
    min_width: 0.5,
    max_width: 2.0,
    opacity: 0.9,
};

const CRAYON: StyleProfile = StyleProfile {
    smoothing: 0.2,
    pressure_multiplier: 1.8,
    tapered_ends: false,
    min_width: 1.0,
    max_width: 3.0,
    opacity: 0.7,
};

const MARKER: StyleProfile = StyleProfile {
    smoothing: 0.5,
    pressure_multiplier: 2.2,
    tapered_ends: false,
    min_width: 2.0,
    max_width: 4.0,
    opacity: 0.6,
};

const PEN: StyleProfile = StyleProfile {
    smoothing: 0.45,
    pressure_multiplier: 1.5,
    tapered_ends: true,
    min_width: 0.8,
    max_width: 2.5,
    opacity: 1.0,
};

const HIGHLIGHT: StyleProfile = StyleProfile {
    smoothing: 0.6,
    pressure_multiplier: 2.5,
    tapered_ends: false,
    min_width: 3.0,
    max_width: 6.0,
    opacity: 0.3,
};

const ERASER: StyleProfile = StyleProfile {
    smoothing: 0.3,
    pressure_multiplier: 2.0,
    tapered_ends: false,
    min_width: 2.0,
    max_width: 4.0,
    opacity: 1.0,
};

impl Tool {
    /// Every tool, in toolbar order.
    pub const ALL: [Tool; 6] = [
        Tool::Pencil,
        Tool::Crayon,
        Tool::Marker,
        Tool::Pen,
        Tool::Highlight,
        Tool::Eraser,
    ];

    /// The wire/tag name of this tool.
    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Pencil => "pencil",
            Tool::Crayon => "crayon",
            Tool::Marker => "marker",
            Tool::Pen => "pen",
            Tool::Highlight => "highlight",
            Tool::Eraser => "eraser",
        }
    }

    /// The style profile for this tool.
    pub fn profile(self) -> &'static StyleProfile {
        match self {
            Tool::Pencil => &PENCIL,
            Tool::Crayon => &CRAYON,
            Tool::Marker => &MARKER,
            Tool::Pen => &PEN,
            Tool::Highlight => &HIGHLIGHT,
            Tool::Eraser => &ERASER,
        }
    }

    /// Whether strokes from this tool erase rather than paint.
    pub fn is_eraser(self) -> bool {
        self == Tool::Eraser
    }
}

impl FromStr for Tool {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tool::ALL
            .into_iter()
            .find(|tool| tool.as_str() == s)
            .ok_or_else(|| Error::InvalidTool(s.to_string()))
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tools() {
        for tool in Tool::ALL {
            assert_eq!(tool.as_str().parse::<Tool>().unwrap(), tool);
        }
    }

    #[test]
    fn test_parse_unknown_tool() {
        let err = "spraycan".parse::<Tool>().unwrap_err();
        assert_eq!(err, Error::InvalidTool("spraycan".to_string()));
    }

    #[test]
    fn test_deserialize_rejects_unknown_tag() {
        assert!(serde_json::from_str::<Tool>("\"marker\"").is_ok());
        assert!(serde_json::from_str::<Tool>("\"spraycan\"").is_err());
    }

    #[test]
    fn test_pencil_width_clamped() {
        // 2 * 1.2 = 2.4, above pencil's max of 2.0
        assert!((Tool::Pencil.profile().stroke_width(2.0) - 2.0).abs() < f64::EPSILON);
        // 0.1 * 1.2 = 0.12, below pencil's min of 0.5
        assert!((Tool::Pencil.profile().stroke_width(0.1) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_width_within_range_is_scaled() {
        let width = Tool::Marker.profile().stroke_width(1.5);
        assert!((width - 3.3).abs() < 1e-9);
    }

    #[test]
    fn test_profiles_are_well_formed() {
        for tool in Tool::ALL {
            let profile = tool.profile();
            assert!((0.0..=1.0).contains(&profile.smoothing), "{tool}");
            assert!(profile.min_width <= profile.max_width, "{tool}");
            assert!(profile.pressure_multiplier > 0.0, "{tool}");
        }
    }
}
