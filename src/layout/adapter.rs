//! Translation from derived nodes/edges to engine input, and the full
//! layout pass.

use rustc_hash::FxHashMap;
use tracing::{debug, instrument, warn};

use super::engine::{LayoutBox, LayoutEngine, LayoutGraph, LayoutLink, Port, PortSide};
use super::options::LayoutOptions;
use super::refine::refine_positions;
use super::LayoutError;
use crate::graphs::{EdgeId, FlowEdge, FlowNode};
use crate::positions::PositionMap;

/// Extra width given to every layout box over its render size.
const BOX_WIDTH_PADDING: f64 = 5.0;
/// Extra height for ordinary boxes.
const BOX_HEIGHT_PADDING: f64 = 10.0;
/// Extra height for no-source boxes, leaving room for their dimmed badge.
const NO_SOURCE_HEIGHT_PADDING: f64 = 50.0;

/// Graphs below this size skip force refinement; layered placement alone is
/// already readable.
const REFINE_MIN_NODES: usize = 3;

/// Build the engine-neutral layout graph from sized nodes and derived edges.
///
/// Ports are emitted in a fixed order per box (targets, sources, excepts) so
/// port indices are stable across derivations. Edge port references resolve
/// through the handle id when it names a known port, falling back to an
/// unpinned endpoint otherwise.
#[must_use]
pub fn to_layout_graph(
    nodes: &[FlowNode],
    edges: &FxHashMap<EdgeId, FlowEdge>,
    options: LayoutOptions,
) -> LayoutGraph {
    let boxes: Vec<LayoutBox> = nodes
        .iter()
        .map(|node| {
            let mut ports = Vec::with_capacity(
                node.target_handles.len() + node.source_handles.len() + node.except_handles.len(),
            );
            for handle in &node.target_handles {
                ports.push(Port {
                    id: handle.id.clone(),
                    side: PortSide::West,
                });
            }
            for handle in &node.source_handles {
                ports.push(Port {
                    id: handle.id.clone(),
                    side: PortSide::East,
                });
            }
            for handle in &node.except_handles {
                ports.push(Port {
                    id: handle.id.clone(),
                    side: PortSide::North,
                });
            }
            let height_padding = if node.no_source {
                NO_SOURCE_HEIGHT_PADDING
            } else {
                BOX_HEIGHT_PADDING
            };
            LayoutBox {
                id: node.id.clone(),
                width: node.width + BOX_WIDTH_PADDING,
                height: node.height + height_padding,
                ports,
            }
        })
        .collect();

    let by_id: FxHashMap<_, usize> = boxes
        .iter()
        .enumerate()
        .map(|(i, b)| (b.id.clone(), i))
        .collect();

    let mut edge_ids: Vec<&EdgeId> = edges.keys().collect();
    edge_ids.sort();
    let links = edge_ids
        .into_iter()
        .map(|id| {
            let edge = &edges[id];
            let source_port = by_id
                .get(&edge.source)
                .and_then(|&i| boxes[i].port_index(&edge.source_handle));
            let target_port = by_id
                .get(&edge.target)
                .and_then(|&i| boxes[i].port_index(&edge.target_handle));
            LayoutLink {
                source: edge.source.clone(),
                target: edge.target.clone(),
                source_port,
                target_port,
            }
        })
        .collect();

    LayoutGraph {
        boxes,
        links,
        options,
    }
}

/// Run the full layout pass: layered placement, then force refinement for
/// graphs large enough to benefit.
///
/// Engine failure propagates; refinement failure logs a warning and falls
/// back to the layered result, which is always complete.
#[instrument(skip_all, fields(nodes = nodes.len(), edges = edges.len()))]
pub async fn compute_layout(
    engine: &dyn LayoutEngine,
    nodes: &[FlowNode],
    edges: &FxHashMap<EdgeId, FlowEdge>,
    options: &LayoutOptions,
) -> Result<PositionMap, LayoutError> {
    let graph = to_layout_graph(nodes, edges, options.clone());
    let layered = engine.layout(&graph).await?;

    if options.skip_refinement || graph.boxes.len() < REFINE_MIN_NODES {
        debug!(positions = layered.len(), "layered placement only");
        return Ok(layered);
    }

    match refine_positions(&graph, layered.clone()).await {
        Ok(refined) => {
            debug!(positions = refined.len(), "refined placement");
            Ok(refined)
        }
        Err(error) => {
            warn!(%error, "refinement failed, keeping layered placement");
            Ok(layered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimensions::resolve_dimensions;
    use crate::graphs::{derive_graph, source_handles};
    use crate::store::ModuleStore;
    use crate::types::{ModuleKind, NodeRef};

    fn sized(store: &ModuleStore) -> (Vec<FlowNode>, FxHashMap<EdgeId, FlowEdge>) {
        let graph = derive_graph(store);
        let handles = source_handles(store);
        let nodes = resolve_dimensions(&graph, &handles);
        (nodes, graph.edges)
    }

    #[test]
    fn boxes_carry_padding_and_ordered_ports() {
        let mut store = ModuleStore::new();
        store.insert_module("t", ModuleKind::Trigger);
        store.insert_module("a", ModuleKind::Action);
        store.set_next("t", "a");

        let (nodes, edges) = sized(&store);
        let graph = to_layout_graph(&nodes, &edges, LayoutOptions::default());

        let action = graph
            .boxes
            .iter()
            .find(|b| b.id == NodeRef::existing("a"))
            .unwrap();
        assert_eq!(action.width, 105.0);
        assert_eq!(action.height, 110.0);
        // Target port first, then source, then except.
        assert_eq!(action.ports[0].side, PortSide::West);
        assert_eq!(action.ports[0].id, "t-a");
        assert_eq!(action.ports[1].side, PortSide::East);
        assert_eq!(action.ports[2].side, PortSide::North);
    }

    #[test]
    fn no_source_boxes_get_taller_padding() {
        let mut store = ModuleStore::new();
        store.insert_module("t", ModuleKind::Trigger);
        store.insert_module("island", ModuleKind::Action);

        let (nodes, edges) = sized(&store);
        let graph = to_layout_graph(&nodes, &edges, LayoutOptions::default());
        let island = graph
            .boxes
            .iter()
            .find(|b| b.id == NodeRef::existing("island"))
            .unwrap();
        // Shrunk render size 75, width +5, height +50.
        assert_eq!(island.width, 80.0);
        assert_eq!(island.height, 125.0);
    }

    #[test]
    fn links_resolve_ports_through_handle_ids() {
        let mut store = ModuleStore::new();
        store.insert_module("t", ModuleKind::Trigger);
        store.insert_module("r", ModuleKind::Router);
        store.insert_module("b", ModuleKind::Action);
        store.set_next("t", "r");
        store.set_router_conditions("r", vec!["c1".into()]);
        store.set_condition_next("c1", "b");

        let (nodes, edges) = sized(&store);
        let graph = to_layout_graph(&nodes, &edges, LayoutOptions::default());

        let router_box = graph
            .boxes
            .iter()
            .find(|b| b.id == NodeRef::existing("r"))
            .unwrap();
        let conditional = graph
            .links
            .iter()
            .find(|l| l.target == NodeRef::existing("b"))
            .unwrap();
        let port = conditional.source_port.unwrap();
        assert_eq!(router_box.ports[port].id, "r-s:c1");
        assert_eq!(router_box.ports[port].side, PortSide::East);
        assert!(conditional.target_port.is_some());
    }

    #[tokio::test]
    async fn small_graphs_skip_refinement() {
        let mut store = ModuleStore::new();
        store.insert_module("t", ModuleKind::Trigger);
        store.insert_module("a", ModuleKind::Action);
        store.set_next("t", "a");

        let (nodes, edges) = sized(&store);
        let engine = super::super::engine::LayeredEngine;
        let positions = compute_layout(&engine, &nodes, &edges, &LayoutOptions::default())
            .await
            .unwrap();
        assert_eq!(positions.len(), 2);
        let t = positions[&NodeRef::existing("t")];
        let a = positions[&NodeRef::existing("a")];
        assert!(t.x < a.x);
    }
}
