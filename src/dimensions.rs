//! Render-size and reachability resolution for derived nodes.
//!
//! Runs between extraction and layout: attaches each node's derived source
//! handles, marks nodes unreachable from any trigger ("no-source") via a
//! fixed-point pass over predecessor links, and computes the final render
//! box from the module kind.

use rustc_hash::FxHashMap;

use crate::graphs::{FlowGraph, FlowNode, SourceHandle};
use crate::types::{ModuleId, ModuleKind, NodeRef};

/// Square render size of an ordinary node, before kind adjustments.
pub const BASE_NODE_SIZE: f64 = 100.0;

const TRIGGER_GROWTH: f64 = 25.0;
const NO_SOURCE_SHRINK: f64 = 25.0;
const ROUTER_BRANCH_GROWTH: f64 = 15.0;
const ROUTER_FREE_HANDLES: usize = 3;

/// Resolve dimensions, reachability, and source handles for every node.
///
/// Output is sorted by node identity so downstream layout input is
/// deterministic. Input nodes are consumed from the graph by value via
/// cloning; the graph itself stays untouched for reuse.
#[must_use]
pub fn resolve_dimensions(
    graph: &FlowGraph,
    source_handles: &FxHashMap<ModuleId, Vec<SourceHandle>>,
) -> Vec<FlowNode> {
    let mut nodes: Vec<FlowNode> = graph.nodes.values().cloned().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let no_source = resolve_no_source(&nodes);

    for node in &mut nodes {
        node.no_source = no_source.get(&node.id).copied().unwrap_or(false);
        if let NodeRef::Existing(id) = &node.id {
            if let Some(handles) = source_handles.get(id) {
                node.source_handles = handles.clone();
            }
        }

        let size = node_size(node);
        node.width = size;
        node.height = size;
    }
    nodes
}

/// Fixed-point reachability: a node is no-source when it has no predecessor
/// and is not a trigger, or when every predecessor it has is itself
/// no-source. Iterating until stable makes the result independent of
/// traversal order and correct for multi-predecessor convergence.
fn resolve_no_source(nodes: &[FlowNode]) -> FxHashMap<NodeRef, bool> {
    let mut flags: FxHashMap<NodeRef, bool> = nodes
        .iter()
        .map(|node| {
            let rootless = node.previous.is_none() && !is_trigger(node);
            (node.id.clone(), rootless)
        })
        .collect();

    loop {
        let mut changed = false;
        for node in nodes {
            if is_trigger(node) || flags.get(&node.id).copied().unwrap_or(false) {
                continue;
            }
            // A predecessor missing from the flag map counts as no-source:
            // it points at something derivation never produced.
            let orphaned = node
                .previous
                .all(|prev| flags.get(prev).copied().unwrap_or(true));
            if orphaned {
                flags.insert(node.id.clone(), true);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    flags
}

fn is_trigger(node: &FlowNode) -> bool {
    node.kind.is_some_and(|kind| kind.is_trigger())
        || node.id == NodeRef::Draft(crate::types::DraftKey::Trigger)
}

/// Size rules, in precedence order: trigger grows, wide routers grow per
/// extra branch, no-source shrinks, everything else keeps the base size.
fn node_size(node: &FlowNode) -> f64 {
    if is_trigger(node) {
        return BASE_NODE_SIZE + TRIGGER_GROWTH;
    }
    if node.kind == Some(ModuleKind::Router) && node.source_handles.len() > ROUTER_FREE_HANDLES {
        let extra = (node.source_handles.len() - ROUTER_FREE_HANDLES) as f64;
        return BASE_NODE_SIZE + extra * ROUTER_BRANCH_GROWTH;
    }
    if node.no_source {
        return BASE_NODE_SIZE - NO_SOURCE_SHRINK;
    }
    BASE_NODE_SIZE
}
