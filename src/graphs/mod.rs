//! Graph derivation: from normalized workflow state to renderable nodes and
//! edges.
//!
//! The submodules split along the derivation pipeline:
//!
//! - [`node`] / [`edge`]: the derived descriptor types and the handle / edge
//!   identity schemes.
//! - [`extractor`]: the store walk that produces a [`FlowGraph`].
//! - [`handles`]: store-derived outgoing handle lists, consumed by the
//!   dimension resolver.
//!
//! Derivation is pure; [`GraphCache`] adds generation-keyed memoization on
//! top so unchanged stores never re-walk.

pub mod edge;
pub mod extractor;
pub mod handles;
pub mod node;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::store::ModuleStore;
use crate::types::NodeRef;

pub use edge::{EdgeData, EdgeId, FlowEdge};
pub use extractor::derive_graph;
pub use handles::{source_handle_for_edge, source_handles};
pub use node::{FlowNode, Handle, NodeStatus, Previous, SourceHandle};

/// The derived flow graph: deduplicated nodes and edges keyed by identity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowGraph {
    pub nodes: FxHashMap<NodeRef, FlowNode>,
    pub edges: FxHashMap<EdgeId, FlowEdge>,
}

impl FlowGraph {
    pub fn node(&self, reference: &NodeRef) -> Option<&FlowNode> {
        self.nodes.get(reference)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Node references in stable sorted order, for deterministic iteration.
    pub fn sorted_node_refs(&self) -> Vec<NodeRef> {
        let mut refs: Vec<NodeRef> = self.nodes.keys().cloned().collect();
        refs.sort();
        refs
    }

    /// Edge ids in stable sorted order.
    pub fn sorted_edge_ids(&self) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self.edges.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// The rendering-layer view: node and edge descriptors keyed by their
    /// encoded identities, in stable order.
    pub fn render_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut nodes = serde_json::Map::new();
        for reference in self.sorted_node_refs() {
            nodes.insert(
                reference.encode(),
                serde_json::to_value(&self.nodes[&reference])?,
            );
        }
        let mut edges = serde_json::Map::new();
        for id in self.sorted_edge_ids() {
            edges.insert(id.as_str().to_owned(), serde_json::to_value(&self.edges[&id])?);
        }
        Ok(serde_json::json!({ "nodes": nodes, "edges": edges }))
    }
}

/// Generation-keyed memoization of [`derive_graph`].
///
/// Holds the graph for exactly one store generation. Any store mutation bumps
/// the generation and the next call re-derives; calls against an unchanged
/// store return the cached [`Arc`] without walking anything.
#[derive(Debug, Default)]
pub struct GraphCache {
    cached: Option<(u64, Arc<FlowGraph>)>,
}

impl GraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&mut self, store: &ModuleStore) -> Arc<FlowGraph> {
        let generation = store.generation();
        if let Some((cached_gen, graph)) = &self.cached {
            if *cached_gen == generation {
                return Arc::clone(graph);
            }
        }
        let graph = Arc::new(derive_graph(store));
        self.cached = Some((generation, Arc::clone(&graph)));
        graph
    }
}
