//! Polygon graph: vertex/edge topology over canvas primitives.
//!
//! DESIGN
//! ======
//! Each [`Vertex`] and [`Edge`] wraps one canvas cell and is keyed by that
//! cell's id, so the id doubles as the identity map from primitive back to
//! wrapper. A vertex carries at most two incident edges; a well-formed gate
//! is a single simple cycle where every vertex has exactly two.
//!
//! ERROR HANDLING
//! ==============
//! Every structural mutation runs through [`PolygonGraph::transactional_edit`].
//! The canvas batch opened for the call is reversed and the local topology is
//! restored when the unit of work fails, then the error is returned to the
//! caller. The graph is never left half-mutated.

#[cfg(test)]
#[path = "graph_test.rs"]
mod graph_test;

use std::collections::HashMap;
use std::fmt;

use tracing::{debug, warn};

use crate::consts::{UNDO_HISTORY_LIMIT, VERTEX_SIZE};
use crate::coords::Point;
use crate::doc::{Canvas, CellId, Change, UndoableEdit};
use crate::geometry::point_in_polygon;

// =============================================================================
// TYPES
// =============================================================================

/// Identifier of a vertex; the id of its canvas cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexId(pub CellId);

/// Identifier of an edge; the id of its canvas cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub CellId);

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a canvas cell maps back to in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellRef {
    Vertex(VertexId),
    Edge(EdgeId),
}

impl CellRef {
    #[must_use]
    pub fn cell_id(self) -> CellId {
        match self {
            Self::Vertex(v) => v.0,
            Self::Edge(e) => e.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("unable to connect, vertex {0} already has 2 edges")]
    Connection(VertexId),
    #[error("vertex not found: {0}")]
    UnknownVertex(VertexId),
    #[error("edge not found: {0}")]
    UnknownEdge(EdgeId),
    #[error("polygon is not closed: walk stopped at vertex {0}")]
    OpenPolygon(VertexId),
    #[error("polygon walk visited {visited} of {total} vertices")]
    DisjointCycles { visited: usize, total: usize },
    #[error("graph is not a rectangle: {0}")]
    NotRectangle(&'static str),
}

/// A polygon corner. Holds back-references to up to two incident edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub id: VertexId,
    pub e1: Option<EdgeId>,
    pub e2: Option<EdgeId>,
}

impl Vertex {
    fn new(id: VertexId) -> Self {
        Self { id, e1: None, e2: None }
    }

    fn connect(&mut self, e: EdgeId) -> Result<(), GraphError> {
        if self.e1.is_none() {
            self.e1 = Some(e);
        } else if self.e2.is_none() {
            self.e2 = Some(e);
        } else {
            return Err(GraphError::Connection(self.id));
        }
        Ok(())
    }

    fn disconnect(&mut self, e: EdgeId) {
        if self.e1 == Some(e) {
            self.e1 = None;
        } else if self.e2 == Some(e) {
            self.e2 = None;
        }
    }

    /// A vertex with two edges cannot accept a third.
    #[must_use]
    pub fn is_fully_connected(&self) -> bool {
        self.e1.is_some() && self.e2.is_some()
    }

    #[must_use]
    pub fn degree(&self) -> usize {
        usize::from(self.e1.is_some()) + usize::from(self.e2.is_some())
    }

    /// The first incident edge that is not `from`.
    #[must_use]
    pub fn other_edge(&self, from: Option<EdgeId>) -> Option<EdgeId> {
        match (self.e1, self.e2) {
            (Some(e), _) if Some(e) != from => Some(e),
            (_, Some(e)) if Some(e) != from => Some(e),
            _ => None,
        }
    }
}

/// A polygon side between two vertices of the same graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub id: EdgeId,
    pub v1: VertexId,
    pub v2: VertexId,
}

impl Edge {
    /// The endpoint opposite `v`.
    #[must_use]
    pub fn other(&self, v: VertexId) -> VertexId {
        if self.v1 == v { self.v2 } else { self.v1 }
    }
}

#[derive(Debug, Clone, Default)]
struct Topology {
    vertex_order: Vec<VertexId>,
    vertices: HashMap<VertexId, Vertex>,
    edge_order: Vec<EdgeId>,
    edges: HashMap<EdgeId, Edge>,
}

// =============================================================================
// UNDO HISTORY
// =============================================================================

struct HistoryEntry {
    edit: UndoableEdit,
    before: Topology,
}

/// Bounded stack of committed edits, each paired with the topology it replaced.
pub struct UndoHistory {
    entries: Vec<HistoryEntry>,
    limit: usize,
}

impl UndoHistory {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self { entries: Vec::new(), limit }
    }

    fn record(&mut self, edit: UndoableEdit, before: Topology) {
        self.entries.push(HistoryEntry { edit, before });
        if self.entries.len() > self.limit {
            self.entries.remove(0);
        }
    }

    fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// Vertex/edge graph over a canvas, mutated only through transactional edits.
pub struct PolygonGraph<C: Canvas> {
    canvas: C,
    topology: Topology,
    history: UndoHistory,
}

impl<C: Canvas> PolygonGraph<C> {
    #[must_use]
    pub fn new(canvas: C) -> Self {
        let mut graph = Self { canvas, topology: Topology::default(), history: UndoHistory::new(UNDO_HISTORY_LIMIT) };
        graph.initialize();
        graph
    }

    /// Start a fresh undo scope bound to the canvas. Everything already on
    /// the canvas becomes the undo floor.
    pub fn initialize(&mut self) {
        self.history = UndoHistory::new(UNDO_HISTORY_LIMIT);
    }

    #[must_use]
    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    /// Mutable canvas access for hosts that move primitives natively.
    ///
    /// Changes made here bypass the topology; report them back through the
    /// editor's move notification.
    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    #[must_use]
    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    // --- Transactions ---

    /// Run `f` inside one canvas batch.
    ///
    /// On success the batch is committed to the undo history. On error every
    /// primitive change made by the batch is reversed, the topology is
    /// restored, and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns.
    pub fn transactional_edit<T, F>(&mut self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut Self) -> Result<T, GraphError>,
    {
        let (value, edit, before) = self.run_batch(f)?;
        if let Some(edit) = edit {
            self.history.record(edit, before);
        }
        Ok(value)
    }

    /// Record vertices the canvas already moved on its own, then run `f` as
    /// part of the same undo step.
    ///
    /// The native move is recorded even when `f` fails; only `f`'s own
    /// changes are rolled back.
    ///
    /// # Errors
    ///
    /// Returns whatever error `f` returns.
    pub fn record_external_move<T, F>(&mut self, vertices: &[VertexId], dx: f64, dy: f64, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut Self) -> Result<T, GraphError>,
    {
        let mut changes: Vec<Change> = vertices
            .iter()
            .filter(|v| self.vertex(**v).is_some())
            .map(|v| Change::Moved { id: v.0, dx, dy })
            .collect();
        let before = self.topology.clone();

        let result = self.run_batch(f);
        if let Ok((_, Some(edit), _)) = &result {
            changes.extend(edit.changes.iter().cloned());
        }
        if !changes.is_empty() {
            self.history.record(UndoableEdit { changes }, before);
        }
        result.map(|(value, _, _)| value)
    }

    /// Run `f` inside one canvas batch without recording it. On error the
    /// batch is reversed and the topology restored.
    fn run_batch<T, F>(&mut self, f: F) -> Result<(T, Option<UndoableEdit>, Topology), GraphError>
    where
        F: FnOnce(&mut Self) -> Result<T, GraphError>,
    {
        let before = self.topology.clone();
        self.canvas.begin_update();
        let result = f(self);
        let edit = self.canvas.end_update();

        match result {
            Ok(value) => Ok((value, edit, before)),
            Err(err) => {
                if let Some(edit) = edit {
                    self.canvas.undo(&edit);
                }
                self.topology = before;
                warn!(error = %err, "graph edit rolled back");
                Err(err)
            }
        }
    }

    /// Reverse the most recent committed edit. Returns false when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(entry) = self.history.pop() else {
            return false;
        };
        self.canvas.undo(&entry.edit);
        self.topology = entry.before;
        true
    }

    // --- Mutations ---

    /// Add an unconnected vertex at canvas coordinates `(x, y)`.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature follows the transactional wrapper.
    pub fn add_vertex(&mut self, x: f64, y: f64) -> Result<VertexId, GraphError> {
        self.transactional_edit(|g| Ok(g.do_add_vertex(x, y)))
    }

    /// Connect two vertices with a new edge.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Connection`] if either endpoint already has two
    /// edges, or [`GraphError::UnknownVertex`] for a foreign vertex.
    pub fn add_edge(&mut self, v1: VertexId, v2: VertexId) -> Result<EdgeId, GraphError> {
        self.transactional_edit(|g| g.do_add_edge(v1, v2))
    }

    /// Insert a new vertex at `(x, y)` between the endpoints of `edge`.
    ///
    /// When either endpoint was already fully connected the original edge is
    /// removed first, so both endpoints end with exactly two edges.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEdge`] or a connection error; the graph is
    /// rolled back in either case.
    pub fn split_edge(&mut self, x: f64, y: f64, edge: EdgeId) -> Result<VertexId, GraphError> {
        self.transactional_edit(|g| {
            let e = g.edge(edge).copied().ok_or(GraphError::UnknownEdge(edge))?;
            let full = |v: VertexId| g.vertex(v).is_some_and(Vertex::is_fully_connected);
            if full(e.v1) || full(e.v2) {
                g.do_remove_edge_from_graph(edge);
            }

            let v = g.do_add_vertex(x, y);
            g.do_add_edge(v, e.v1)?;
            g.do_add_edge(v, e.v2)?;
            Ok(v)
        })
    }

    /// Remove cells from the canvas and the local sets.
    ///
    /// Remaining structure is not reconnected; use
    /// [`PolygonGraph::remove_edge_from_graph`] to also detach an edge from
    /// its endpoints.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature follows the transactional wrapper.
    pub fn remove(&mut self, cells: &[CellRef]) -> Result<(), GraphError> {
        self.transactional_edit(|g| {
            g.do_remove(cells);
            Ok(())
        })
    }

    /// Remove an edge and clear the back-references on both endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEdge`] when the edge is not in the graph.
    pub fn remove_edge_from_graph(&mut self, edge: EdgeId) -> Result<(), GraphError> {
        self.transactional_edit(|g| {
            if g.edge(edge).is_none() {
                return Err(GraphError::UnknownEdge(edge));
            }
            g.do_remove_edge_from_graph(edge);
            Ok(())
        })
    }

    /// Translate the given vertices by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownVertex`] for a vertex outside the graph.
    pub fn move_vertices(&mut self, vertices: &[VertexId], dx: f64, dy: f64) -> Result<(), GraphError> {
        self.transactional_edit(|g| {
            if let Some(missing) = vertices.iter().find(|v| g.vertex(**v).is_none()) {
                return Err(GraphError::UnknownVertex(*missing));
            }
            let ids: Vec<CellId> = vertices.iter().map(|v| v.0).collect();
            g.canvas.move_cells(&ids, dx, dy);
            Ok(())
        })
    }

    /// Translate every primitive in the graph by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature follows the transactional wrapper.
    pub fn move_all(&mut self, dx: f64, dy: f64) -> Result<(), GraphError> {
        self.transactional_edit(|g| {
            let ids = g.canvas.cell_ids();
            g.canvas.move_cells(&ids, dx, dy);
            Ok(())
        })
    }

    /// Drop every primitive and all local state, and reset the undo scope.
    pub fn clear(&mut self) {
        self.canvas.clear();
        self.topology = Topology::default();
        self.history.clear();
    }

    fn do_add_vertex(&mut self, x: f64, y: f64) -> VertexId {
        let id = VertexId(self.canvas.insert_vertex(x, y, VERTEX_SIZE));
        self.topology.vertices.insert(id, Vertex::new(id));
        self.topology.vertex_order.push(id);
        id
    }

    fn do_add_edge(&mut self, v1: VertexId, v2: VertexId) -> Result<EdgeId, GraphError> {
        for v in [v1, v2] {
            if self.vertex(v).is_none() {
                return Err(GraphError::UnknownVertex(v));
            }
        }

        let id = EdgeId(self.canvas.insert_edge(v1.0, v2.0));
        for v in [v1, v2] {
            self.topology
                .vertices
                .get_mut(&v)
                .ok_or(GraphError::UnknownVertex(v))?
                .connect(id)?;
        }

        self.topology.edges.insert(id, Edge { id, v1, v2 });
        self.topology.edge_order.push(id);
        Ok(id)
    }

    fn do_remove(&mut self, cells: &[CellRef]) {
        let ids: Vec<CellId> = cells.iter().map(|c| c.cell_id()).collect();
        self.canvas.remove_cells(&ids);

        for cell in cells {
            match *cell {
                CellRef::Vertex(v) => {
                    self.topology.vertices.remove(&v);
                    self.topology.vertex_order.retain(|x| *x != v);
                }
                CellRef::Edge(e) => {
                    self.topology.edges.remove(&e);
                    self.topology.edge_order.retain(|x| *x != e);
                }
            }
        }
    }

    fn do_remove_edge_from_graph(&mut self, edge: EdgeId) {
        let Some(e) = self.edge(edge).copied() else {
            return;
        };
        self.do_remove(&[CellRef::Edge(edge)]);
        for v in [e.v1, e.v2] {
            if let Some(vertex) = self.topology.vertices.get_mut(&v) {
                vertex.disconnect(edge);
            }
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.topology.vertices.get(&id)
    }

    #[must_use]
    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.topology.edges.get(&id)
    }

    /// Vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.topology.vertex_order.iter().filter_map(|id| self.topology.vertices.get(id))
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.topology.edge_order.iter().filter_map(|id| self.topology.edges.get(id))
    }

    #[must_use]
    pub fn first_vertex(&self) -> Option<VertexId> {
        self.topology.vertex_order.first().copied()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.topology.vertices.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.topology.edges.len()
    }

    /// Map a canvas cell back to its graph wrapper.
    #[must_use]
    pub fn lookup(&self, cell: CellId) -> Option<CellRef> {
        if self.topology.vertices.contains_key(&VertexId(cell)) {
            Some(CellRef::Vertex(VertexId(cell)))
        } else if self.topology.edges.contains_key(&EdgeId(cell)) {
            Some(CellRef::Edge(EdgeId(cell)))
        } else {
            None
        }
    }

    /// Canvas position of a vertex.
    #[must_use]
    pub fn position(&self, v: VertexId) -> Option<Point> {
        self.canvas.position(v.0)
    }

    /// Follow `v`'s edge other than `from` and return it with the vertex at its far end.
    #[must_use]
    pub fn next_vertex(&self, from: Option<EdgeId>, v: VertexId) -> Option<(EdgeId, VertexId)> {
        let edge = self.vertex(v)?.other_edge(from)?;
        let e = self.edge(edge)?;
        Some((edge, e.other(v)))
    }

    /// The vertex cycle, starting from the first vertex.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::OpenPolygon`] when the walk runs out of edges
    /// before returning to the start, and [`GraphError::DisjointCycles`] when
    /// the cycle does not cover every vertex.
    pub fn polygon(&self) -> Result<Vec<VertexId>, GraphError> {
        let Some(start) = self.first_vertex() else {
            return Ok(Vec::new());
        };
        let total = self.vertex_count();

        let mut ring = vec![start];
        let mut from = None;
        let mut current = start;
        loop {
            let (edge, next) = self.next_vertex(from, current).ok_or(GraphError::OpenPolygon(current))?;
            if next == start {
                break;
            }
            if ring.len() >= total {
                return Err(GraphError::DisjointCycles { visited: ring.len(), total });
            }
            ring.push(next);
            from = Some(edge);
            current = next;
        }

        if ring.len() != total {
            return Err(GraphError::DisjointCycles { visited: ring.len(), total });
        }
        Ok(ring)
    }

    /// Canvas positions of the vertex cycle.
    ///
    /// # Errors
    ///
    /// Propagates [`PolygonGraph::polygon`] errors.
    pub fn polygon_points(&self) -> Result<Vec<Point>, GraphError> {
        self.polygon()?
            .into_iter()
            .map(|v| self.position(v).ok_or(GraphError::UnknownVertex(v)))
            .collect()
    }

    /// Whether canvas point `p` falls inside the current polygon, boundary
    /// included. A malformed polygon contains nothing.
    #[must_use]
    pub fn contains_point(&self, p: Point) -> bool {
        match self.polygon_points() {
            Ok(points) => point_in_polygon(&points, p),
            Err(err) => {
                debug!(error = %err, "hit test on malformed polygon");
                false
            }
        }
    }
}
