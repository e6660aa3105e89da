//! Derivation behavior tests: seeding, branching, cycle safety, and draft
//! promotion, driven through small hand-built stores.

use super::*;
use crate::store::{DraftModule, ModuleStore};
use crate::types::{DraftKey, DraftSlot, ModuleId, ModuleKind, NodeRef};

fn linear_store() -> ModuleStore {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_module("a", ModuleKind::Action);
    store.insert_module("b", ModuleKind::Action);
    store.set_next("t", "a");
    store.set_next("a", "b");
    store
}

/// Deriving twice from an unchanged store must produce identical maps.
#[test]
fn derivation_is_idempotent() {
    let store = linear_store();
    let first = derive_graph(&store);
    let second = derive_graph(&store);
    assert_eq!(first, second);
}

#[test]
fn linear_chain_produces_expected_nodes_and_edges() {
    let graph = derive_graph(&linear_store());
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    assert!(graph.edges.contains_key(&EdgeId::new(
        &NodeRef::existing("t"),
        None,
        &NodeRef::existing("a"),
    )));
    assert!(graph.edges.contains_key(&EdgeId::new(
        &NodeRef::existing("a"),
        None,
        &NodeRef::existing("b"),
    )));
}

/// A two-module `next` cycle terminates and yields a bounded graph.
#[test]
fn mutual_next_cycle_terminates() {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_module("a", ModuleKind::Action);
    store.insert_module("b", ModuleKind::Action);
    store.set_next("t", "a");
    store.set_next("a", "b");
    store.set_next("b", "a");

    let graph = derive_graph(&store);
    assert_eq!(graph.node_count(), 3);
    // t->a, a->b, b->a and no more.
    assert_eq!(graph.edge_count(), 3);
    let a = graph.node(&NodeRef::existing("a")).unwrap();
    assert!(matches!(a.previous, Previous::Many(_)));
}

/// A store with no trigger modules still renders: the synthetic draft
/// trigger seeds the walk.
#[test]
fn empty_store_yields_synthetic_trigger() {
    let graph = derive_graph(&ModuleStore::new());
    assert_eq!(graph.node_count(), 1);
    let node = graph.node(&NodeRef::Draft(DraftKey::Trigger)).unwrap();
    assert_eq!(node.status, NodeStatus::New);
    assert!(node.kind.is_none());
}

/// Router branches: one conditional edge per route condition and no
/// spurious default edge when the router has no linear successor.
#[test]
fn router_conditions_branch_without_spurious_default() {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_module("a", ModuleKind::Router);
    store.insert_module("b", ModuleKind::Action);
    store.insert_module("c", ModuleKind::Action);
    store.set_next("t", "a");
    store.set_router_conditions("a", vec!["c1".into(), "c2".into()]);
    store.set_condition_next("c1", "b");
    store.set_condition_next("c2", "c");

    let graph = derive_graph(&store);
    assert_eq!(graph.node_count(), 4);
    assert_eq!(graph.edge_count(), 3);

    let via_c1 = &graph.edges[&EdgeId::new(
        &NodeRef::existing("a"),
        Some(&"c1".into()),
        &NodeRef::existing("b"),
    )];
    assert!(via_c1.data.is_route_condition);
    assert!(!via_c1.data.is_default);
    assert_eq!(via_c1.source_handle, "a-s:c1");

    assert!(!graph.edges.values().any(|e| e.data.is_default));
}

/// A router with zero conditions but a linear successor emits exactly one
/// default-flagged edge.
#[test]
fn router_without_conditions_emits_default_edge() {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_module("r", ModuleKind::Router);
    store.insert_module("x", ModuleKind::Action);
    store.set_next("t", "r");
    store.set_next("r", "x");

    let graph = derive_graph(&store);
    let defaults: Vec<_> = graph
        .edges
        .values()
        .filter(|e| e.data.is_default)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].source, NodeRef::existing("r"));
    assert_eq!(defaults[0].target, NodeRef::existing("x"));
}

/// Exception branches walk like normal chains but carry the except flag and
/// leave through the except port.
#[test]
fn except_branch_edges_are_flagged_and_colored() {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_module("a", ModuleKind::Action);
    store.insert_module("h", ModuleKind::Action);
    store.set_next("t", "a");
    store.set_except("a", "h");

    let graph = derive_graph(&store);
    let edge = &graph.edges[&EdgeId::new(
        &NodeRef::existing("a"),
        None,
        &NodeRef::existing("h"),
    )];
    assert!(edge.data.is_except);
    assert!(edge.data.is_condition_disabled);
    assert_eq!(edge.source_handle, "a-e");
    assert_eq!(edge.data.source_color, node::EXCEPT_COLOR);
}

/// A dangling except target is no branch at all, not an error.
#[test]
fn missing_except_target_is_skipped() {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_module("a", ModuleKind::Action);
    store.set_next("t", "a");
    store.set_except("a", "ghost");

    let graph = derive_graph(&store);
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.edge_count(), 1);
}

/// Modules unreachable from any trigger are still swept into the graph as
/// their own roots.
#[test]
fn orphan_modules_are_swept_in() {
    let mut store = linear_store();
    store.insert_module("island", ModuleKind::Search);

    let graph = derive_graph(&store);
    let island = graph.node(&NodeRef::existing("island")).unwrap();
    assert!(island.previous.is_none());
    assert_eq!(graph.node_count(), 4);
}

/// An untyped draft renders; typing it changes only its type-derived
/// attributes, never the graph shape.
#[test]
fn draft_promotion_changes_color_not_shape() {
    let key = DraftKey::child(NodeRef::existing("t"), DraftSlot::Next);

    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_draft(key.clone(), DraftModule::default());
    let untyped = derive_graph(&store);

    store.insert_draft(key.clone(), DraftModule::typed(ModuleKind::Action));
    let typed = derive_graph(&store);

    assert_eq!(untyped.node_count(), typed.node_count());
    assert_eq!(untyped.edge_count(), typed.edge_count());

    let draft_ref = NodeRef::Draft(key);
    let before = untyped.node(&draft_ref).unwrap();
    let after = typed.node(&draft_ref).unwrap();
    assert!(before.kind.is_none());
    assert_eq!(after.kind, Some(ModuleKind::Action));
    assert_ne!(before.color, after.color);
    assert_eq!(before.status, after.status);
}

/// A draft inserted before an existing module keeps the chain connected
/// through its recorded forward pointer.
#[test]
fn draft_with_forward_pointer_bridges_the_chain() {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    store.insert_module("b", ModuleKind::Action);
    store.set_next("t", "b");

    // Simulate "insert before b": t's next draft points on to b.
    let key = DraftKey::child(NodeRef::existing("t"), DraftSlot::Next);
    store.clear_next(&ModuleId::from("t"));
    store.insert_draft(
        key.clone(),
        DraftModule::typed(ModuleKind::Action).with_next("b"),
    );

    let graph = derive_graph(&store);
    let draft_ref = NodeRef::Draft(key);
    assert!(graph.edges.contains_key(&EdgeId::new(
        &NodeRef::existing("t"),
        None,
        &draft_ref,
    )));
    assert!(graph.edges.contains_key(&EdgeId::new(
        &draft_ref,
        None,
        &NodeRef::existing("b"),
    )));
}

/// Nested draft chains (a draft hanging off another draft) are walked to
/// their full depth.
#[test]
fn nested_draft_chain_is_walked() {
    let mut store = ModuleStore::new();
    store.insert_module("t", ModuleKind::Trigger);
    let first = DraftKey::child(NodeRef::existing("t"), DraftSlot::Next);
    let second = DraftKey::child(NodeRef::Draft(first.clone()), DraftSlot::Next);
    store.insert_draft(first.clone(), DraftModule::typed(ModuleKind::Action));
    store.insert_draft(second.clone(), DraftModule::default());

    let graph = derive_graph(&store);
    assert_eq!(graph.node_count(), 3);
    assert!(graph.edges.contains_key(&EdgeId::new(
        &NodeRef::Draft(first),
        None,
        &NodeRef::Draft(second),
    )));
}

/// Convergent paths promote the shared target's predecessor tracking
/// instead of duplicating the node.
#[test]
fn convergent_paths_record_multiple_predecessors() {
    let mut store = ModuleStore::new();
    store.insert_module("t1", ModuleKind::Trigger);
    store.insert_module("t2", ModuleKind::Trigger);
    store.insert_module("join", ModuleKind::Action);
    store.set_next("t1", "join");
    store.set_next("t2", "join");

    let graph = derive_graph(&store);
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    let join = graph.node(&NodeRef::existing("join")).unwrap();
    assert_eq!(
        join.previous,
        Previous::Many(vec![NodeRef::existing("t1"), NodeRef::existing("t2")])
    );
}

/// The rendering payload keys descriptors by their encoded identities,
/// drafts in their `new-…` form.
#[test]
fn render_payload_uses_encoded_identities() {
    let mut store = linear_store();
    store.insert_draft(
        DraftKey::child(NodeRef::existing("b"), DraftSlot::Next),
        DraftModule::default(),
    );

    let payload = derive_graph(&store).render_payload().unwrap();
    let nodes = payload["nodes"].as_object().unwrap();
    assert!(nodes.contains_key("t"));
    assert!(nodes.contains_key("new-b"));
    let edges = payload["edges"].as_object().unwrap();
    assert!(edges.contains_key("edge:b:new-b"));
}

#[test]
fn graph_cache_reuses_until_store_changes() {
    let mut store = linear_store();
    let mut cache = GraphCache::new();
    let first = cache.graph(&store);
    let second = cache.graph(&store);
    assert!(Arc::ptr_eq(&first, &second));

    store.insert_module("extra", ModuleKind::Action);
    let third = cache.graph(&store);
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.node_count(), 4);
}
