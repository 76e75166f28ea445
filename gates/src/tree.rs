//! Gate tree arena.
//!
//! DESIGN
//! ======
//! Gates live in a flat map keyed by [`GateId`]. Parent and child links are
//! ids, so the tree has no reference cycles and serializes by a plain
//! recursive descent. Ids are handed out in pre-order when a tree is parsed
//! and sequentially afterwards; they are never reused within one tree.
//!
//! Removing a gate drops its whole subtree but leaves a tombstone recording
//! the former parent, so a repeated removal is a no-op that reports the same
//! parent. Tombstones are never pruned: a tree lives for one edit session,
//! and only the removed gate itself gets one, not its dropped descendants.
//!
//! ERROR HANDLING
//! ==============
//! Lookups return `Option`; mutations on unknown ids return
//! [`GateError::UnknownGate`]. Malformed JSON is tolerated field by field
//! (see [`crate::wire`]); only JSON that is not an object at all fails.

#[cfg(test)]
#[path = "tree_test.rs"]
mod tree_test;

use std::collections::HashMap;

use tracing::debug;

use crate::gate::{Gate, GateError, GateId};
use crate::wire::GateJson;

#[derive(Debug, Clone)]
struct GateNode {
    gate: Gate,
    parent: Option<GateId>,
    children: Vec<GateId>,
}

/// A hierarchy of gates with exactly one root.
#[derive(Debug, Clone)]
pub struct GateTree {
    nodes: HashMap<GateId, GateNode>,
    root: GateId,
    next_id: u32,
    /// Removed gate -> former parent. One entry per effective removal.
    removed: HashMap<GateId, GateId>,
}

impl GateTree {
    /// A tree holding only `root`.
    #[must_use]
    pub fn new(root: Gate) -> Self {
        let mut tree = Self { nodes: HashMap::new(), root: GateId(0), next_id: 0, removed: HashMap::new() };
        tree.root = tree.insert(root, None);
        tree
    }

    fn insert(&mut self, gate: Gate, parent: Option<GateId>) -> GateId {
        let id = GateId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, GateNode { gate, parent, children: Vec::new() });
        if let Some(node) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            node.children.push(id);
        }
        id
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    #[must_use]
    pub fn root(&self) -> GateId {
        self.root
    }

    #[must_use]
    pub fn gate(&self, id: GateId) -> Option<&Gate> {
        self.nodes.get(&id).map(|n| &n.gate)
    }

    pub fn gate_mut(&mut self, id: GateId) -> Option<&mut Gate> {
        self.nodes.get_mut(&id).map(|n| &mut n.gate)
    }

    /// Parent of a live gate; `None` for the root and unknown ids.
    #[must_use]
    pub fn parent(&self, id: GateId) -> Option<GateId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Ordered children; empty for leaves and unknown ids.
    #[must_use]
    pub fn children(&self, id: GateId) -> &[GateId] {
        self.nodes.get(&id).map(|n| n.children.as_slice()).unwrap_or_default()
    }

    #[must_use]
    pub fn contains(&self, id: GateId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every live gate id, parents before children, siblings in order.
    #[must_use]
    pub fn ids(&self) -> Vec<GateId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        out
    }

    /// Number of ancestors above `id`; the root is at depth 0.
    #[must_use]
    pub fn depth(&self, id: GateId) -> usize {
        std::iter::successors(self.parent(id), |p| self.parent(*p)).count()
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Append `gate` as the last child of `parent` (the root when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::UnknownGate`] when `parent` is not in the tree.
    pub fn add_gate(&mut self, parent: Option<GateId>, gate: Gate) -> Result<GateId, GateError> {
        let parent = parent.unwrap_or(self.root);
        if !self.contains(parent) {
            return Err(GateError::UnknownGate(parent));
        }
        let id = self.insert(gate, Some(parent));
        debug!(%id, %parent, "gate added");
        Ok(id)
    }

    /// Detach `id` from its parent and drop its subtree. Returns the parent
    /// for re-selection.
    ///
    /// Removing the root or an id this tree never held returns `None`.
    /// Removing an already-removed gate changes nothing and returns the same
    /// parent as the first call.
    pub fn remove_gate(&mut self, id: GateId) -> Option<GateId> {
        if let Some(parent) = self.removed.get(&id) {
            return Some(*parent);
        }
        let parent = self.parent(id)?;

        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        let mut dropped = 0usize;
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
                dropped += 1;
            }
        }
        self.removed.insert(id, parent);

        debug!(%id, %parent, dropped, "gate removed");
        Some(parent)
    }

    /// Every child's parent link points back at the gate listing it, and
    /// the root has no parent.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.nodes
            .iter()
            .all(|(id, node)| node.children.iter().all(|c| self.parent(*c) == Some(*id)))
            && self.parent(self.root).is_none()
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    /// Build a tree from its wire form. Parent links are derived from the
    /// nesting.
    #[must_use]
    pub fn from_wire(root: GateJson) -> Self {
        let (gate, children) = root.into_gate();
        let mut tree = Self::new(gate);
        let mut pending: Vec<(GateId, GateJson)> = children.into_iter().rev().map(|c| (tree.root, c)).collect();
        while let Some((parent, json)) = pending.pop() {
            let (gate, children) = json.into_gate();
            let id = tree.insert(gate, Some(parent));
            pending.extend(children.into_iter().rev().map(|c| (id, c)));
        }
        tree
    }

    /// Wire form of the subtree rooted at `id`; `None` for unknown ids.
    #[must_use]
    pub fn to_wire(&self, id: GateId) -> Option<GateJson> {
        let node = self.nodes.get(&id)?;
        let mut json = GateJson::from_gate(&node.gate);
        json.children = node.children.iter().filter_map(|c| self.to_wire(*c)).collect();
        Some(json)
    }

    /// # Errors
    ///
    /// Returns [`GateError::Json`] if the value is not a gate object.
    pub fn from_value(value: serde_json::Value) -> Result<Self, GateError> {
        Ok(Self::from_wire(serde_json::from_value(value)?))
    }

    /// # Errors
    ///
    /// Returns [`GateError::Json`] if `raw` is not JSON or not a gate object.
    pub fn from_json(raw: &str) -> Result<Self, GateError> {
        Ok(Self::from_wire(serde_json::from_str(raw)?))
    }

    /// # Errors
    ///
    /// Returns [`GateError::Json`] if serialization fails.
    pub fn to_value(&self) -> Result<serde_json::Value, GateError> {
        Ok(serde_json::to_value(self.root_wire())?)
    }

    /// # Errors
    ///
    /// Returns [`GateError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, GateError> {
        Ok(serde_json::to_string(&self.root_wire())?)
    }

    fn root_wire(&self) -> GateJson {
        self.to_wire(self.root).unwrap_or_default()
    }
}
