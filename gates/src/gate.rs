//! Gate entity, identifiers and errors.

#[cfg(test)]
#[path = "gate_test.rs"]
mod gate_test;

use std::fmt;

use canvas::coords::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transform::Transform;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by gate tree operations.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The id does not name a gate in this tree.
    #[error("unknown gate: {0}")]
    UnknownGate(GateId),

    /// Serialized gate JSON could not be read or written.
    #[error("gate JSON failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A transform edit violated its parameter ranges.
    #[error("invalid transform: {}", .0.join(" "))]
    InvalidTransform(Vec<String>),
}

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Arena index of a gate within one [`crate::tree::GateTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateId(pub(crate) u32);

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate#{}", self.0)
    }
}

/// A fresh opaque plot cache key.
#[must_use]
pub fn new_plot_key() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// GATE
// =============================================================================

/// How a gate's shape may be edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatingMethod {
    /// Free-form polygons.
    #[default]
    Manual,
    /// Axis-aligned rectangles only.
    Dafi,
}

impl GatingMethod {
    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual)
    }
}

/// One of a gate's two plot axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// The canonical default polygon: a square centered on the plot, as
/// fractions of a 600-unit plot.
#[must_use]
pub fn default_points() -> Vec<Point> {
    const LO: f64 = 250.0 / 600.0;
    const HI: f64 = 350.0 / 600.0;
    vec![Point::new(LO, LO), Point::new(HI, LO), Point::new(HI, HI), Point::new(LO, HI)]
}

/// Name derived from the axis parameters.
#[must_use]
pub fn auto_name(x: &str, y: &str) -> String {
    format!("{x} vs. {y}")
}

/// A polygonal region over two axis parameters.
///
/// Hierarchy lives in the tree that owns the gate, not in the gate itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    pub name: String,
    /// When false, the name follows the axis parameters.
    pub custom_name: bool,
    pub x: String,
    pub y: String,
    /// Plot-normalized polygon; the closing edge from last to first is implicit.
    pub points: Vec<Point>,
    pub plot_key: String,
    pub x_transform: Transform,
    pub y_transform: Transform,
    pub gating_method: GatingMethod,
}

impl Gate {
    /// A new gate over `x` vs. `y` with the default polygon and a fresh plot key.
    #[must_use]
    pub fn new(x: impl Into<String>, y: impl Into<String>, x_transform: Transform, y_transform: Transform) -> Self {
        let (x, y) = (x.into(), y.into());
        Self {
            name: auto_name(&x, &y),
            custom_name: false,
            x,
            y,
            points: default_points(),
            plot_key: new_plot_key(),
            x_transform,
            y_transform,
            gating_method: GatingMethod::Manual,
        }
    }

    #[must_use]
    pub fn transform(&self, axis: Axis) -> &Transform {
        match axis {
            Axis::X => &self.x_transform,
            Axis::Y => &self.y_transform,
        }
    }

    /// Replace an axis transform if it passes validation.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidTransform`] with every violation; the gate
    /// is left unchanged.
    pub fn set_transform(&mut self, axis: Axis, transform: Transform) -> Result<(), GateError> {
        let errors = transform.validate();
        if !errors.is_empty() {
            return Err(GateError::InvalidTransform(errors));
        }
        match axis {
            Axis::X => self.x_transform = transform,
            Axis::Y => self.y_transform = transform,
        }
        Ok(())
    }

    /// Change the axis parameters, re-deriving the name unless it is custom.
    pub fn set_parameters(&mut self, x: impl Into<String>, y: impl Into<String>) {
        self.x = x.into();
        self.y = y.into();
        if !self.custom_name {
            self.name = auto_name(&self.x, &self.y);
        }
    }

    /// Give the gate a user-chosen name. A blank name reverts to the
    /// derived one.
    pub fn rename(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            self.custom_name = false;
            self.name = auto_name(&self.x, &self.y);
        } else {
            self.custom_name = true;
            self.name = name.to_string();
        }
    }
}
