//! Coordinate mapping between plot-normalized space and canvas space.
//!
//! Plot-normalized coordinates live in the unit square with y increasing
//! upward. Canvas coordinates are in canvas units with y increasing downward.
//! The plot occupies the canvas rectangle left over after reserving the
//! [`PlotMargin`] fractions on each side.

#[cfg(test)]
#[path = "coords_test.rs"]
mod coords_test;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_CANVAS_SIZE;

/// A point in either plot-normalized or canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }
}

/// Fractions of the canvas reserved as non-plot margin on each side.
///
/// Supplied per experiment file by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotMargin {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

/// The plot area in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl PlotRect {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Whether `p` lies within the rectangle, boundary included.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x <= self.right && p.y >= self.top && p.y <= self.bottom
    }
}

/// Converts between plot-normalized and canvas coordinates for a fixed
/// canvas size and margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordMapper {
    pub width: f64,
    pub height: f64,
    pub margin: PlotMargin,
}

impl Default for CoordMapper {
    fn default() -> Self {
        Self { width: DEFAULT_CANVAS_SIZE, height: DEFAULT_CANVAS_SIZE, margin: PlotMargin::default() }
    }
}

impl CoordMapper {
    #[must_use]
    pub fn new(width: f64, height: f64, margin: PlotMargin) -> Self {
        Self { width, height, margin }
    }

    /// The plot rectangle in canvas coordinates.
    #[must_use]
    pub fn plot_rect(&self) -> PlotRect {
        PlotRect {
            left: self.width * self.margin.left,
            top: self.height * self.margin.top,
            right: self.width * (1.0 - self.margin.right),
            bottom: self.height * (1.0 - self.margin.bottom),
        }
    }

    /// Convert a canvas point to plot-normalized coordinates.
    #[must_use]
    pub fn point_to_plot_point(&self, canvas: Point) -> Point {
        let rect = self.plot_rect();
        let w = rect.width().max(f64::EPSILON);
        let h = rect.height().max(f64::EPSILON);
        Point { x: (canvas.x - rect.left) / w, y: (rect.bottom - canvas.y) / h }
    }

    /// Convert a plot-normalized point to canvas coordinates.
    #[must_use]
    pub fn plot_point_to_point(&self, plot: Point) -> Point {
        let rect = self.plot_rect();
        Point { x: rect.left + plot.x * rect.width(), y: rect.bottom - plot.y * rect.height() }
    }
}
