//! Editor graph: pointer interaction and gate-polygon sync on top of
//! [`PolygonGraph`].
//!
//! The host wires canvas events to the `on_*` handlers and processes the
//! returned [`Action`]s. Every change to the polygon ends with an
//! [`Action::PointsChanged`] carrying the plot-normalized points, emitted
//! after the triggering mutation has completed.

#[cfg(test)]
#[path = "editor_test.rs"]
mod editor_test;

use tracing::{debug, warn};

use crate::consts::GATE_INITIAL_SIZE;
use crate::coords::{CoordMapper, PlotMargin, Point};
use crate::doc::{Canvas, CellId};
use crate::geometry::bounds;
use crate::graph::{CellRef, GraphError, PolygonGraph, VertexId};
use crate::input::{Action, EditMode, InputState};

/// Interactive gate editor over a canvas.
pub struct EditorGraph<C: Canvas> {
    graph: PolygonGraph<C>,
    mapper: CoordMapper,
    mode: EditMode,
    input: InputState,
}

impl<C: Canvas> EditorGraph<C> {
    #[must_use]
    pub fn new(canvas: C, mapper: CoordMapper) -> Self {
        Self { graph: PolygonGraph::new(canvas), mapper, mode: EditMode::default(), input: InputState::default() }
    }

    // --- Accessors ---

    #[must_use]
    pub fn graph(&self) -> &PolygonGraph<C> {
        &self.graph
    }

    /// Mutable graph access for hosts that drive the canvas directly.
    pub fn graph_mut(&mut self) -> &mut PolygonGraph<C> {
        &mut self.graph
    }

    #[must_use]
    pub fn mapper(&self) -> &CoordMapper {
        &self.mapper
    }

    /// Replace the plot margin, e.g. after a new experiment file is loaded.
    pub fn set_margin(&mut self, margin: PlotMargin) {
        self.mapper.margin = margin;
    }

    #[must_use]
    pub fn mode(&self) -> EditMode {
        self.mode
    }

    #[must_use]
    pub fn input_state(&self) -> InputState {
        self.input
    }

    // --- Loading and sync ---

    /// Rebuild the graph from a gate's plot-normalized points.
    ///
    /// An empty point list produces the default square at the top-left of
    /// the plot area.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphError`] if the shape cannot be built; the graph is
    /// left empty in that case.
    pub fn load_gate(&mut self, points: &[Point], mode: EditMode) -> Result<Vec<Action>, GraphError> {
        self.mode = mode;
        self.input = InputState::Idle;
        self.graph.clear();

        let canvas_points: Vec<Point> = if points.is_empty() {
            self.default_square()
        } else {
            points.iter().map(|p| self.mapper.plot_point_to_point(*p)).collect()
        };

        self.graph.transactional_edit(|g| {
            let mut ring: Vec<VertexId> = Vec::with_capacity(canvas_points.len());
            for p in &canvas_points {
                ring.push(g.add_vertex(p.x, p.y)?);
            }
            for pair in ring.windows(2) {
                g.add_edge(pair[0], pair[1])?;
            }
            if let (Some(first), Some(last)) = (ring.first(), ring.last()) {
                g.add_edge(*last, *first)?;
            }
            Ok(())
        })?;
        // The loaded shape is the undo floor.
        self.graph.initialize();

        debug!(vertices = self.graph.vertex_count(), ?mode, "gate loaded into editor");
        Ok(vec![Action::RenderNeeded, Action::PointsChanged(self.plot_points()?)])
    }

    /// Default square corners in the order v1, v2, v3, v4 (edges v1-v2,
    /// v2-v3, v3-v4, v4-v1).
    fn default_square(&self) -> Vec<Point> {
        let rect = self.mapper.plot_rect();
        let (left, top) = (rect.left, rect.top);
        vec![
            Point::new(left, top),
            Point::new(left, top + GATE_INITIAL_SIZE),
            Point::new(left + GATE_INITIAL_SIZE, top + GATE_INITIAL_SIZE),
            Point::new(left + GATE_INITIAL_SIZE, top),
        ]
    }

    /// The current polygon in plot-normalized coordinates.
    ///
    /// # Errors
    ///
    /// Propagates polygon-walk errors for malformed topology.
    pub fn plot_points(&self) -> Result<Vec<Point>, GraphError> {
        Ok(self
            .graph
            .polygon_points()?
            .into_iter()
            .map(|p| self.mapper.point_to_plot_point(p))
            .collect())
    }

    fn points_changed(&self) -> Vec<Action> {
        match self.plot_points() {
            Ok(points) => vec![Action::RenderNeeded, Action::PointsChanged(points)],
            Err(err) => {
                warn!(error = %err, "gate polygon is malformed; points not synced");
                vec![Action::RenderNeeded]
            }
        }
    }

    // --- Hit-testing ---

    /// Whether canvas point `p` falls inside the gate polygon.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        self.graph.contains_point(p)
    }

    /// A press starts a drag-all only on empty canvas or an edge, and only
    /// inside the shape. Vertex handles belong to the canvas's own drag.
    fn pointer_down_in_shape(&self, p: Point, cell: Option<CellId>) -> bool {
        if let Some(cell) = cell {
            if !matches!(self.graph.lookup(cell), Some(CellRef::Edge(_))) {
                return false;
            }
        }
        self.contains(p)
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, p: Point, cell: Option<CellId>) -> Vec<Action> {
        if !self.pointer_down_in_shape(p, cell) {
            return Vec::new();
        }
        self.input = InputState::DraggingAll { last: p };
        vec![Action::Consumed]
    }

    pub fn on_pointer_move(&mut self, p: Point) -> Vec<Action> {
        let InputState::DraggingAll { last } = self.input else {
            return Vec::new();
        };
        let mut actions = self.move_all(p, last);
        self.input = InputState::DraggingAll { last: p };
        actions.push(Action::Consumed);
        actions
    }

    pub fn on_pointer_up(&mut self, p: Point) -> Vec<Action> {
        let InputState::DraggingAll { last } = self.input else {
            return Vec::new();
        };
        let mut actions = self.move_all(p, last);
        self.input = InputState::Idle;
        actions.push(Action::Consumed);
        actions
    }

    /// Double-click on an edge splits it at the pointer. Disabled in
    /// rectangle mode.
    pub fn on_double_click(&mut self, p: Point, cell: Option<CellId>) -> Vec<Action> {
        if !self.mode.allows_split() {
            return Vec::new();
        }

        let Some(CellRef::Edge(edge)) = cell.and_then(|c| self.graph.lookup(c)) else {
            return vec![Action::Consumed];
        };

        let mut actions = vec![Action::Consumed];
        match self.graph.split_edge(p.x, p.y, edge) {
            Ok(_) => actions.extend(self.points_changed()),
            Err(err) => warn!(error = %err, %edge, "edge split failed"),
        }
        actions
    }

    /// The canvas moved `cells` by `(dx, dy)` on its own (a vertex handle
    /// drag). In rectangle mode a single moved corner reshapes the rectangle.
    pub fn on_cells_moved(&mut self, cells: &[CellId], dx: f64, dy: f64) -> Vec<Action> {
        if self.input != InputState::Idle {
            return Vec::new();
        }

        let moved: Vec<VertexId> = cells
            .iter()
            .filter_map(|c| match self.graph.lookup(*c) {
                Some(CellRef::Vertex(v)) => Some(v),
                _ => None,
            })
            .collect();

        match (self.mode, moved.as_slice()) {
            (EditMode::Rectangle, [vertex]) => {
                if let Err(err) = self.rebuild_rectangle(*vertex, dx, dy) {
                    warn!(error = %err, "rectangle reshape failed");
                }
            }
            _ => {
                if let Err(err) = self.graph.record_external_move(&moved, dx, dy, |_| Ok(())) {
                    warn!(error = %err, "vertex move not recorded");
                }
            }
        }

        self.points_changed()
    }

    /// Reverse the last committed edit.
    pub fn undo(&mut self) -> Vec<Action> {
        if self.graph.undo() { self.points_changed() } else { Vec::new() }
    }

    // --- Drag-all ---

    fn move_all(&mut self, p: Point, last: Point) -> Vec<Action> {
        let (dx, dy) = (p.x - last.x, p.y - last.y);
        if dx == 0.0 && dy == 0.0 {
            return Vec::new();
        }
        if !self.fits_plot_after(dx, dy) {
            return Vec::new();
        }

        match self.graph.move_all(dx, dy) {
            Ok(()) => self.points_changed(),
            Err(err) => {
                warn!(error = %err, "move all failed");
                Vec::new()
            }
        }
    }

    /// Whether the shape's bounding box, translated by `(dx, dy)`, stays
    /// inside the plot rectangle.
    fn fits_plot_after(&self, dx: f64, dy: f64) -> bool {
        let positions: Vec<Point> = self.graph.vertices().filter_map(|v| self.graph.position(v.id)).collect();
        let Some((min, max)) = bounds(&positions) else {
            return false;
        };
        let rect = self.mapper.plot_rect();
        rect.contains(min.offset(dx, dy)) && rect.contains(max.offset(dx, dy))
    }

    // --- Rectangle reshape ---

    /// Slide the two corners adjacent to `moved` so the four vertices remain
    /// an axis-aligned rectangle. `moved` is already at its new position;
    /// `(dx, dy)` is how far it travelled. The corner's own move and the
    /// reshape form one undo step.
    ///
    /// Does nothing while a reshape is already in progress.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotRectangle`] when the topology around `moved`
    /// is not a four-vertex loop. The corner's move is still recorded.
    pub fn rebuild_rectangle(&mut self, moved: VertexId, dx: f64, dy: f64) -> Result<(), GraphError> {
        if self.input == InputState::Reshaping {
            return Ok(());
        }

        let resume = self.input;
        self.input = InputState::Reshaping;
        let result = self.graph.record_external_move(&[moved], dx, dy, |g| {
            for (v, target) in Self::rectangle_targets(g, moved, dx, dy)? {
                let current = g.position(v).ok_or(GraphError::UnknownVertex(v))?;
                g.move_vertices(&[v], target.x - current.x, target.y - current.y)?;
            }
            Ok(())
        });
        self.input = resume;
        result
    }

    /// Where the two corners adjacent to `moved` must go.
    fn rectangle_targets(
        graph: &PolygonGraph<C>,
        moved: VertexId,
        dx: f64,
        dy: f64,
    ) -> Result<[(VertexId, Point); 2], GraphError> {
        let (next, next2, opposite) = Self::rectangle_corners(graph, moved)?;
        let position = |v: VertexId| graph.position(v).ok_or(GraphError::UnknownVertex(v));
        let before = position(moved)?.offset(-dx, -dy);
        let far = position(opposite)?;
        let next_pos = position(next)?;

        // `next` keeps whichever side it shared with the moved corner.
        let next_is_horizontal = (next_pos.y - before.y).abs() <= (next_pos.x - before.x).abs();
        let horizontal = Point::new(far.x, before.y + dy);
        let vertical = Point::new(before.x + dx, far.y);
        Ok(if next_is_horizontal {
            [(next, horizontal), (next2, vertical)]
        } else {
            [(next, vertical), (next2, horizontal)]
        })
    }

    /// The corners adjacent to `moved` (via its first and second edge) and
    /// the corner diagonally opposite it.
    fn rectangle_corners(graph: &PolygonGraph<C>, moved: VertexId) -> Result<(VertexId, VertexId, VertexId), GraphError> {
        if graph.vertex_count() != 4 {
            return Err(GraphError::NotRectangle("rectangle gates have exactly four vertices"));
        }
        let vertex = graph.vertex(moved).ok_or(GraphError::UnknownVertex(moved))?;
        let (Some(e1), Some(e2)) = (vertex.e1, vertex.e2) else {
            return Err(GraphError::NotRectangle("moved corner is not fully connected"));
        };
        let far_end = |e| graph.edge(e).map(|edge| edge.other(moved)).ok_or(GraphError::UnknownEdge(e));
        let next = far_end(e1)?;
        let next2 = far_end(e2)?;

        let next_vertex = graph.vertex(next).ok_or(GraphError::UnknownVertex(next))?;
        let opposite = [next_vertex.e1, next_vertex.e2]
            .into_iter()
            .flatten()
            .filter_map(|e| graph.edge(e).map(|edge| edge.other(next)))
            .find(|v| *v != moved && *v != next2)
            .ok_or(GraphError::NotRectangle("no corner opposite the moved vertex"))?;

        Ok((next, next2, opposite))
    }
}
