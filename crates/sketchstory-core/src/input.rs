//! Gesture input delivered by the host's pointer/touch layer.

use crate::stroke::Point;
use serde::{Deserialize, Serialize};

/// One pointer gesture event in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum GestureEvent {
    /// Pointer went down.
    Start { point: Point },
    /// Pointer moved while down.
    Move { point: Point },
    /// Pointer lifted.
    End,
    /// Gesture was interrupted by the system.
    Cancel,
}

impl GestureEvent {
    pub fn start(x: f64, y: f64) -> Self {
        Self::Start {
            point: Point::new(x, y),
        }
    }

    pub fn move_to(x: f64, y: f64) -> Self {
        Self::Move {
            point: Point::new(x, y),
        }
    }

    /// The sampled point, if this event carries one.
    pub fn point(&self) -> Option<Point> {
        match self {
            Self::Start { point } | Self::Move { point } => Some(*point),
            Self::End | Self::Cancel => None,
        }
    }
}
