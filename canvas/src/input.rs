//! Input model: editing modes and the gesture state machine.
//!
//! `EditMode` captures which shapes the current gate may take. `InputState`
//! is the gesture being tracked between pointer-down and pointer-up, carrying
//! the context needed to compute incremental deltas.

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use crate::coords::Point;

/// Which shapes the editor allows for the current gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    /// Arbitrary polygons; edges can be split.
    #[default]
    FreeForm,
    /// Axis-aligned rectangles only, reshaped by dragging a corner.
    Rectangle,
}

impl EditMode {
    /// Whether double-clicking an edge may subdivide it.
    #[must_use]
    pub fn allows_split(self) -> bool {
        matches!(self, Self::FreeForm)
    }
}

/// Internal state for the input state machine.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InputState {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// The whole shape follows the pointer. Entered only from a pointer-down
    /// inside the polygon.
    DraggingAll {
        /// Canvas position of the previous pointer sample.
        last: Point,
    },
    /// A rectangle reshape is repositioning corners. Move notifications
    /// arriving in this state are the reshape's own and are ignored.
    Reshaping,
}

impl InputState {
    #[must_use]
    pub fn is_dragging_all(&self) -> bool {
        matches!(self, Self::DraggingAll { .. })
    }
}

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// The event was handled; suppress the canvas's default handling.
    Consumed,
    /// Primitives moved and the canvas should be redrawn.
    RenderNeeded,
    /// The gate polygon changed; carries the new plot-normalized points.
    PointsChanged(Vec<Point>),
}
