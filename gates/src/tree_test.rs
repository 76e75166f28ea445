use serde_json::json;

use super::*;
use crate::gate::GatingMethod;
use crate::transform::{Transform, TransformType};

// =============================================================================
// Helpers
// =============================================================================

fn gate(x: &str, y: &str) -> Gate {
    Gate::new(x, y, Transform::none(), Transform::none())
}

/// root -> [a -> [a1], b]
fn sample() -> (GateTree, GateId, GateId, GateId) {
    let mut tree = GateTree::new(gate("FSC-A", "SSC-A"));
    let a = tree.add_gate(None, gate("CD3", "CD4")).unwrap();
    let a1 = tree.add_gate(Some(a), gate("CD8", "CD4")).unwrap();
    let b = tree.add_gate(None, gate("CD19", "CD20")).unwrap();
    (tree, a, a1, b)
}

const SAVED: &str = r#"{
    "name": "Cells", "customName": 1, "x": "FSC-A", "y": "SSC-A",
    "points": [{"x": 0.1, "y": 0.1}, {"x": 0.9, "y": 0.1}, {"x": 0.5, "y": 0.9}],
    "ployKey": "root-key",
    "xTransform": {"transformType": "linear", "a": 0, "t": 262144, "m": 0, "w": 0, "predefinedName": ""},
    "children": [
        {"name": "CD3 vs. CD4", "customName": 0, "x": "CD3", "y": "CD4", "points": [], "plotKey": "k-a",
         "children": [{"name": "Tc", "customName": true, "x": "CD8", "y": "CD4", "plotKey": "k-a1"}]},
        {"name": "B", "customName": 1, "x": "CD19", "y": "CD20", "plotKey": "k-b", "gatingMethod": "dafi"}
    ]
}"#;

// =============================================================================
// Structure
// =============================================================================

#[test]
fn add_defaults_to_root_and_links_parent() {
    let (tree, a, a1, b) = sample();
    assert_eq!(tree.len(), 4);
    assert_eq!(tree.children(tree.root()), &[a, b]);
    assert_eq!(tree.parent(a1), Some(a));
    assert_eq!(tree.parent(tree.root()), None);
    assert_eq!(tree.depth(a1), 2);
    assert!(tree.is_consistent());
}

#[test]
fn add_under_unknown_parent_fails() {
    let (mut tree, a, _, _) = sample();
    tree.remove_gate(a);
    let err = tree.add_gate(Some(a), gate("x", "y")).unwrap_err();
    assert!(matches!(err, GateError::UnknownGate(id) if id == a));
}

#[test]
fn ids_are_pre_order() {
    let (tree, a, a1, b) = sample();
    assert_eq!(tree.ids(), vec![tree.root(), a, a1, b]);
}

// =============================================================================
// remove_gate
// =============================================================================

#[test]
fn remove_leaf_returns_parent_without_it() {
    let (mut tree, a, a1, _) = sample();
    let before = tree.gate(a).cloned();

    assert_eq!(tree.remove_gate(a1), Some(a));
    assert!(tree.children(a).is_empty());
    assert_eq!(tree.gate(a).cloned(), before);
    assert!(!tree.contains(a1));
}

#[test]
fn remove_twice_is_a_no_op_with_same_parent() {
    let (mut tree, a, a1, _) = sample();
    assert_eq!(tree.remove_gate(a1), Some(a));
    let len = tree.len();

    assert_eq!(tree.remove_gate(a1), Some(a));
    assert_eq!(tree.len(), len);
}

#[test]
fn remove_drops_subtree() {
    let (mut tree, a, a1, b) = sample();
    assert_eq!(tree.remove_gate(a), Some(tree.root()));
    assert!(!tree.contains(a1));
    assert_eq!(tree.children(tree.root()), &[b]);
    assert_eq!(tree.len(), 2);
    assert!(tree.is_consistent());
}

#[test]
fn remove_root_is_refused() {
    let (mut tree, ..) = sample();
    assert_eq!(tree.remove_gate(tree.root()), None);
    assert_eq!(tree.len(), 4);
}

#[test]
fn new_ids_are_not_reused_after_removal() {
    let (mut tree, _, _, b) = sample();
    tree.remove_gate(b);
    let c = tree.add_gate(None, gate("x", "y")).unwrap();
    assert_ne!(c, b);
}

// =============================================================================
// JSON
// =============================================================================

#[test]
fn parses_saved_tree_with_parent_links() {
    let tree = GateTree::from_json(SAVED).unwrap();
    let root = tree.root();
    let top = tree.gate(root).unwrap();
    assert_eq!(top.name, "Cells");
    assert!(top.custom_name);
    assert_eq!(top.plot_key, "root-key");
    assert_eq!(top.x_transform.transform_type, TransformType::Linear);
    assert_eq!(top.y_transform, Transform::none());

    let ids = tree.ids();
    assert_eq!(ids.len(), 4);
    let (a, a1, b) = (ids[1], ids[2], ids[3]);
    assert_eq!(tree.parent(a1), Some(a));
    assert_eq!(tree.parent(b), Some(root));
    assert!(tree.gate(a1).unwrap().custom_name);
    assert!(tree.gate(a1).unwrap().points.is_empty());
    assert_eq!(tree.gate(b).unwrap().gating_method, GatingMethod::Dafi);
    assert!(tree.is_consistent());
}

#[test]
fn round_trip_preserves_every_field() {
    let tree = GateTree::from_json(SAVED).unwrap();
    let again = GateTree::from_json(&tree.to_json().unwrap()).unwrap();

    assert_eq!(tree.ids(), again.ids());
    for id in tree.ids() {
        assert_eq!(tree.gate(id), again.gate(id));
        assert_eq!(tree.parent(id), again.parent(id));
        assert_eq!(tree.children(id), again.children(id));
    }
}

#[test]
fn round_trip_of_built_tree() {
    let (tree, ..) = sample();
    let value = tree.to_value().unwrap();
    let back = GateTree::from_value(value.clone()).unwrap();
    assert_eq!(back.to_value().unwrap(), value);
}

#[test]
fn output_writes_plot_key_and_never_parent() {
    let tree = GateTree::from_json(SAVED).unwrap();
    let value = tree.to_value().unwrap();
    assert_eq!(value["plotKey"], "root-key");
    assert!(value.get("ployKey").is_none());
    assert!(value.get("parent").is_none());
    assert_eq!(value["customName"], 1);
    assert_eq!(value["children"][0]["children"][0]["customName"], 1);
}

#[test]
fn non_object_json_fails() {
    assert!(matches!(GateTree::from_json("[1, 2]"), Err(GateError::Json(_))));
    assert!(matches!(GateTree::from_value(json!("gate")), Err(GateError::Json(_))));
}

#[test]
fn gate_with_both_plot_key_spellings_loads() {
    let tree = GateTree::from_json(r#"{"name":"a","plotKey":"k1","ployKey":"k0"}"#).unwrap();
    assert_eq!(tree.gate(tree.root()).unwrap().plot_key, "k1");
}

#[test]
fn tombstones_cover_only_removed_gates() {
    let (mut tree, a, a1, b) = sample();
    tree.remove_gate(a);
    tree.remove_gate(a);
    assert_eq!(tree.removed.len(), 1);
    assert_eq!(tree.remove_gate(a1), None);
    assert_eq!(tree.removed.len(), 1);

    tree.remove_gate(b);
    assert_eq!(tree.removed.len(), 2);
}
