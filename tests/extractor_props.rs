//! Property tests for graph derivation over randomized stores: the walk
//! must terminate, dedupe, and stay internally consistent no matter how
//! tangled the adjacency gets.

use proptest::prelude::*;
use rustc_hash::FxHashSet;

use flowscape::graphs::derive_graph;
use flowscape::store::ModuleStore;
use flowscape::types::{InternalKind, ModuleKind};

fn kind_from_index(index: usize) -> ModuleKind {
    match index % 7 {
        0 => ModuleKind::Trigger,
        1 => ModuleKind::Router,
        2 => ModuleKind::Action,
        3 => ModuleKind::Search,
        4 => ModuleKind::Iterator,
        5 => ModuleKind::Aggregator,
        _ => ModuleKind::Internal(InternalKind::Code),
    }
}

/// Random stores: up to eight modules with arbitrary kinds and arbitrary
/// (possibly cyclic, possibly self-referential) next/except wiring; routers
/// get two conditions each, wired to arbitrary targets.
fn arb_store() -> impl Strategy<Value = ModuleStore> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(0usize..7, n),
            prop::collection::vec(prop::option::of(0..n), n),
            prop::collection::vec(prop::option::of(0..n), n),
        )
            .prop_map(move |(kinds, nexts, excepts)| {
                let id = |i: usize| format!("m{i}");
                let mut store = ModuleStore::new();
                for i in 0..n {
                    store.insert_module(id(i), kind_from_index(kinds[i]));
                }
                for (i, next) in nexts.iter().enumerate() {
                    if let Some(j) = next {
                        store.set_next(id(i), id(*j));
                    }
                }
                for (i, except) in excepts.iter().enumerate() {
                    if let Some(j) = except {
                        store.set_except(id(i), id(*j));
                    }
                }
                for i in 0..n {
                    if kind_from_index(kinds[i]) == ModuleKind::Router {
                        let c0 = format!("m{i}c0");
                        let c1 = format!("m{i}c1");
                        store.set_router_conditions(id(i), vec![c0.as_str().into(), c1.as_str().into()]);
                        store.set_condition_next(c0.as_str(), id((i + 1) % n));
                        if let Some(j) = excepts[i] {
                            store.set_condition_next(c1.as_str(), id(j));
                        }
                    }
                }
                store
            })
    })
}

proptest! {
    /// Two derivations of the same store are identical.
    #[test]
    fn derivation_is_idempotent(store in arb_store()) {
        let first = derive_graph(&store);
        let second = derive_graph(&store);
        prop_assert_eq!(first, second);
    }

    /// No two edges share a `(source, condition, target)` triple.
    #[test]
    fn no_duplicate_edge_triples(store in arb_store()) {
        let graph = derive_graph(&store);
        let mut triples = FxHashSet::default();
        for edge in graph.edges.values() {
            let triple = (
                edge.source.encode(),
                edge.data.condition.clone(),
                edge.target.encode(),
            );
            prop_assert!(triples.insert(triple), "duplicate edge triple");
        }
    }

    /// Every edge endpoint resolves to a derived node.
    #[test]
    fn edges_connect_known_nodes(store in arb_store()) {
        let graph = derive_graph(&store);
        for edge in graph.edges.values() {
            prop_assert!(graph.node(&edge.source).is_some());
            prop_assert!(graph.node(&edge.target).is_some());
        }
    }

    /// The walk covers every persisted module, bounded by the store size.
    #[test]
    fn node_set_is_bounded_and_covering(store in arb_store()) {
        let module_count = store.module_ids_sorted().len();
        let graph = derive_graph(&store);
        for id in store.module_ids_sorted() {
            prop_assert!(graph.node(&flowscape::types::NodeRef::Existing(id)).is_some());
        }
        // No drafts exist, so at most one synthetic entry beyond the modules.
        prop_assert!(graph.node_count() <= module_count + 1);
    }
}
