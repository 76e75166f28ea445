//! Polygon gate editing on a canvas document.
//!
//! This crate owns everything between raw canvas events and the list of
//! plot-normalized points a gate is stored as: the polygon graph kept on top
//! of the canvas primitives, the interaction layer that drags, splits and
//! reshapes it, and the coordinate mapping between canvas pixels and the
//! plot's unit square. The host is responsible only for delivering events to
//! [`editor::EditorGraph`] and acting on the returned [`input::Action`]s.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`editor`] | Editor graph: pointer handling, drag-all, rectangle reshape |
//! | [`graph`] | Polygon graph with transactional edits and undo |
//! | [`doc`] | Canvas capability trait and the in-memory [`doc::DocStore`] |
//! | [`coords`] | Plot margins and canvas/plot coordinate mapping |
//! | [`geometry`] | Orientation, segment intersection, point-in-polygon |
//! | [`input`] | Edit modes, the gesture state machine, host actions |
//! | [`consts`] | Shared numeric constants (vertex size, default gate size, etc.) |

pub mod consts;
pub mod coords;
pub mod doc;
pub mod editor;
pub mod geometry;
pub mod graph;
pub mod input;
