/// Mouse wheel handling for the grid
///
/// Wheel input is turned into whole scroll units, one per wheel notch.
/// Shift turns the wheel into horizontal movement.

use iced::mouse::ScrollDelta;
use iced::widget::scrollable::AbsoluteOffset;

/// Pixels reported by touchpads that count as one wheel notch
const PIXELS_PER_LINE: f32 = 60.0;

/// Converts wheel deltas into viewport movement
///
/// Touchpads report fractions of a notch; the remainder is kept until it
/// adds up to a whole unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    /// Pixels moved per scroll unit
    step: f32,
    pending_x: f32,
    pending_y: f32,
}

impl ScrollState {
    pub fn new(step: f32) -> Self {
        ScrollState {
            step,
            pending_x: 0.0,
            pending_y: 0.0,
        }
    }

    /// Apply one wheel event, returning how far to move the viewport
    ///
    /// Wheel up (positive delta) moves toward the top, or toward the left
    /// when `horizontal` is set. Returns None until at least one whole unit
    /// has accumulated.
    pub fn apply(&mut self, delta: ScrollDelta, horizontal: bool) -> Option<AbsoluteOffset> {
        let lines = match delta {
            ScrollDelta::Lines { x, y } => dominant(x, y),
            ScrollDelta::Pixels { x, y } => dominant(x, y) / PIXELS_PER_LINE,
        };

        let pending = if horizontal {
            &mut self.pending_x
        } else {
            &mut self.pending_y
        };
        *pending -= lines;

        let units = pending.trunc();
        if units == 0.0 {
            return None;
        }
        *pending -= units;

        let distance = units * self.step;
        Some(if horizontal {
            AbsoluteOffset { x: distance, y: 0.0 }
        } else {
            AbsoluteOffset { x: 0.0, y: distance }
        })
    }
}

/// The vertical wheel drives scrolling; a sideways-only wheel still counts
fn dominant(x: f32, y: f32) -> f32 {
    if y != 0.0 {
        y
    } else {
        x
    }
}
