//! Canvas document: primitive cells, change records, and the in-memory store.
//!
//! This module defines the capability the polygon graph needs from an
//! interactive canvas ([`Canvas`]): inserting, moving, and removing primitive
//! cells, nested update batches that produce one [`UndoableEdit`] each, and
//! reversal of a recorded edit. [`DocStore`] is the headless implementation
//! used by non-rendering hosts and tests.
//!
//! Primitive handles are opaque [`CellId`]s. Nothing is ever attached to a
//! cell; callers that need to map a cell back to their own wrapper keep an
//! identity map keyed by the id.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coords::Point;

/// Unique identifier for a canvas primitive.
pub type CellId = Uuid;

/// The kind of a canvas primitive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CellKind {
    /// Square handle positioned by its top-left corner.
    Vertex { x: f64, y: f64, size: f64 },
    /// Straight connector between two vertex cells.
    Edge { source: CellId, target: CellId },
}

/// A primitive as stored in the document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub kind: CellKind,
}

impl Cell {
    #[must_use]
    pub fn is_edge(&self) -> bool {
        matches!(self.kind, CellKind::Edge { .. })
    }
}

/// One primitive-level change recorded inside an update batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Inserted(Cell),
    Removed(Cell),
    Moved { id: CellId, dx: f64, dy: f64 },
    /// The whole document was emptied; carries the previous contents.
    Cleared(Vec<Cell>),
}

/// The changes produced by one outermost update batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UndoableEdit {
    pub changes: Vec<Change>,
}

impl UndoableEdit {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// The interactive canvas capability the graph layer is written against.
pub trait Canvas {
    /// Open an update batch. Batches nest; only the outermost one completes an edit.
    /// Mutations made outside any batch are applied but not recorded.
    fn begin_update(&mut self);

    /// Close an update batch. Returns the completed edit when the outermost
    /// batch closes with at least one recorded change.
    fn end_update(&mut self) -> Option<UndoableEdit>;

    /// Insert a vertex primitive with its top-left corner at `(x, y)`.
    fn insert_vertex(&mut self, x: f64, y: f64, size: f64) -> CellId;

    /// Insert an edge primitive connecting two existing cells.
    fn insert_edge(&mut self, source: CellId, target: CellId) -> CellId;

    /// Translate the given cells. Edges follow their endpoints and are not
    /// positioned themselves.
    fn move_cells(&mut self, ids: &[CellId], dx: f64, dy: f64);

    /// Remove the given cells. Unknown ids are ignored.
    fn remove_cells(&mut self, ids: &[CellId]);

    /// Remove every cell.
    fn clear(&mut self);

    /// Reverse a previously completed edit.
    fn undo(&mut self, edit: &UndoableEdit);

    /// Look up a cell.
    fn cell(&self, id: CellId) -> Option<Cell>;

    /// Position of a vertex cell, or `None` for edges and unknown ids.
    fn position(&self, id: CellId) -> Option<Point> {
        match self.cell(id)?.kind {
            CellKind::Vertex { x, y, .. } => Some(Point::new(x, y)),
            CellKind::Edge { .. } => None,
        }
    }

    /// Ids of every cell, in insertion order.
    fn cell_ids(&self) -> Vec<CellId>;
}

/// In-memory canvas document.
pub struct DocStore {
    cells: HashMap<CellId, Cell>,
    order: Vec<CellId>,
    depth: usize,
    pending: Vec<Change>,
}

impl DocStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { cells: HashMap::new(), order: Vec::new(), depth: 0, pending: Vec::new() }
    }

    /// Number of cells currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if the store contains no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of edge cells.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.cells.values().filter(|c| c.is_edge()).count()
    }

    /// Number of vertex cells.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.len() - self.edge_count()
    }

    /// Whether an update batch is open.
    #[must_use]
    pub fn in_update(&self) -> bool {
        self.depth > 0
    }

    fn record(&mut self, change: Change) {
        if self.depth > 0 {
            self.pending.push(change);
        }
    }

    fn put(&mut self, cell: Cell) {
        if self.cells.insert(cell.id, cell).is_none() {
            self.order.push(cell.id);
        }
    }

    fn take(&mut self, id: CellId) -> Option<Cell> {
        let cell = self.cells.remove(&id)?;
        self.order.retain(|c| *c != id);
        Some(cell)
    }

    fn translate(&mut self, id: CellId, dx: f64, dy: f64) -> bool {
        match self.cells.get_mut(&id) {
            Some(Cell { kind: CellKind::Vertex { x, y, .. }, .. }) => {
                *x += dx;
                *y += dy;
                true
            }
            _ => false,
        }
    }
}

impl Default for DocStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas for DocStore {
    fn begin_update(&mut self) {
        self.depth += 1;
    }

    fn end_update(&mut self) -> Option<UndoableEdit> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 || self.pending.is_empty() {
            return None;
        }
        Some(UndoableEdit { changes: std::mem::take(&mut self.pending) })
    }

    fn insert_vertex(&mut self, x: f64, y: f64, size: f64) -> CellId {
        let cell = Cell { id: Uuid::new_v4(), kind: CellKind::Vertex { x, y, size } };
        self.put(cell);
        self.record(Change::Inserted(cell));
        cell.id
    }

    fn insert_edge(&mut self, source: CellId, target: CellId) -> CellId {
        let cell = Cell { id: Uuid::new_v4(), kind: CellKind::Edge { source, target } };
        self.put(cell);
        self.record(Change::Inserted(cell));
        cell.id
    }

    fn move_cells(&mut self, ids: &[CellId], dx: f64, dy: f64) {
        for id in ids {
            if self.translate(*id, dx, dy) {
                self.record(Change::Moved { id: *id, dx, dy });
            }
        }
    }

    fn remove_cells(&mut self, ids: &[CellId]) {
        for id in ids {
            if let Some(cell) = self.take(*id) {
                self.record(Change::Removed(cell));
            }
        }
    }

    fn clear(&mut self) {
        let previous: Vec<Cell> = self.order.iter().filter_map(|id| self.cells.get(id).copied()).collect();
        self.cells.clear();
        self.order.clear();
        if !previous.is_empty() {
            self.record(Change::Cleared(previous));
        }
    }

    fn undo(&mut self, edit: &UndoableEdit) {
        for change in edit.changes.iter().rev() {
            match change {
                Change::Inserted(cell) => {
                    self.take(cell.id);
                }
                Change::Removed(cell) => self.put(*cell),
                Change::Moved { id, dx, dy } => {
                    self.translate(*id, -dx, -dy);
                }
                Change::Cleared(cells) => {
                    for cell in cells {
                        self.put(*cell);
                    }
                }
            }
        }
    }

    fn cell(&self, id: CellId) -> Option<Cell> {
        self.cells.get(&id).copied()
    }

    fn cell_ids(&self) -> Vec<CellId> {
        self.order.clone()
    }
}
