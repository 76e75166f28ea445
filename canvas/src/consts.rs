//! Shared numeric constants for the canvas crate.

// ── Geometry ────────────────────────────────────────────────────

/// X coordinate of the ray endpoint used by the point-in-polygon test.
///
/// Plot coordinates are bounded by the canvas, so a large finite value stands
/// in for +∞.
pub const RAY_EXTENT: f64 = 10_000.0;

// ── Shapes ──────────────────────────────────────────────────────

/// Side length, in canvas units, of the square vertex handle primitive.
pub const VERTEX_SIZE: f64 = 5.0;

/// Side length, in canvas units, of the default square synthesized for a
/// gate that has no points yet.
pub const GATE_INITIAL_SIZE: f64 = 58.0;

/// Default canvas width and height, in canvas units.
pub const DEFAULT_CANVAS_SIZE: f64 = 900.0;

// ── History ─────────────────────────────────────────────────────

/// Maximum number of committed edits retained for undo.
pub const UNDO_HISTORY_LIMIT: usize = 50;
