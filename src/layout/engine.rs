//! The layout engine seam and the built-in layered implementation.
//!
//! [`LayoutGraph`] is engine-neutral: sized boxes with directional ports and
//! port-addressed links. [`LayeredEngine`] places boxes in discrete layers
//! along the flow direction (cycle removal, longest-path layering,
//! barycenter ordering with port-order bias, then coordinate assignment with
//! neighbor-centering sweeps).

use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, DfsEvent};
use rustc_hash::{FxHashMap, FxHashSet};

use super::options::{LayoutDirection, LayoutOptions};
use super::LayoutError;
use crate::positions::{Position, PositionMap};
use crate::types::NodeRef;

/// Which side of a box a port sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortSide {
    /// Incoming, facing the previous layer.
    West,
    /// Outgoing, facing the next layer.
    East,
    /// Exception outputs.
    North,
}

/// A named connection point on a layout box.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub id: String,
    pub side: PortSide,
}

/// One sized box to place.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutBox {
    pub id: NodeRef,
    pub width: f64,
    pub height: f64,
    /// Fixed order; link port references index into this list.
    pub ports: Vec<Port>,
}

impl LayoutBox {
    pub fn port_index(&self, handle: &str) -> Option<usize> {
        self.ports.iter().position(|port| port.id == handle)
    }
}

/// A directed connection between two boxes, optionally pinned to ports.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutLink {
    pub source: NodeRef,
    pub target: NodeRef,
    pub source_port: Option<usize>,
    pub target_port: Option<usize>,
}

/// Complete engine input: boxes, links, and tuning options.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutGraph {
    pub boxes: Vec<LayoutBox>,
    pub links: Vec<LayoutLink>,
    pub options: LayoutOptions,
}

impl LayoutGraph {
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Strategy seam for position computation.
///
/// Implementations must be pure with respect to the graph: same input, same
/// positions. The built-in implementation is [`LayeredEngine`].
#[async_trait]
pub trait LayoutEngine: Send + Sync {
    async fn layout(&self, graph: &LayoutGraph) -> Result<PositionMap, LayoutError>;
}

/// Deterministic layered placement.
#[derive(Clone, Copy, Debug, Default)]
pub struct LayeredEngine;

#[async_trait]
impl LayoutEngine for LayeredEngine {
    async fn layout(&self, graph: &LayoutGraph) -> Result<PositionMap, LayoutError> {
        solve(graph)
    }
}

const ORDERING_SWEEPS: usize = 4;
const CENTERING_SWEEPS: usize = 3;
/// Bias added per source-port index so router branches keep their handle
/// order within a layer.
const PORT_ORDER_BIAS: f64 = 1e-3;

struct Arc {
    from: usize,
    to: usize,
    port_bias: f64,
}

fn solve(graph: &LayoutGraph) -> Result<PositionMap, LayoutError> {
    if graph.boxes.is_empty() {
        return Ok(PositionMap::default());
    }

    let index: FxHashMap<&NodeRef, usize> = graph
        .boxes
        .iter()
        .enumerate()
        .map(|(i, b)| (&b.id, i))
        .collect();

    let mut arcs = Vec::with_capacity(graph.links.len());
    for link in &graph.links {
        let from = *index
            .get(&link.source)
            .ok_or_else(|| LayoutError::UnknownEndpoint {
                reference: link.source.encode(),
            })?;
        let to = *index
            .get(&link.target)
            .ok_or_else(|| LayoutError::UnknownEndpoint {
                reference: link.target.encode(),
            })?;
        // Self-links carry no layering information.
        if from == to {
            continue;
        }
        arcs.push(Arc {
            from,
            to,
            port_bias: link.source_port.unwrap_or(0) as f64 * PORT_ORDER_BIAS,
        });
    }

    let forward = remove_back_arcs(graph.boxes.len(), arcs);
    let layers = assign_layers(graph.boxes.len(), &forward);
    let ordered = order_layers(layers, &forward);
    Ok(place(graph, &ordered))
}

/// Drop arcs that close a cycle, found by a depth-first walk over the
/// directed graph. Tree, forward, and cross arcs survive.
fn remove_back_arcs(node_count: usize, arcs: Vec<Arc>) -> Vec<Arc> {
    let mut g: DiGraph<(), ()> = DiGraph::with_capacity(node_count, arcs.len());
    for _ in 0..node_count {
        g.add_node(());
    }
    for arc in &arcs {
        g.add_edge(NodeIndex::new(arc.from), NodeIndex::new(arc.to), ());
    }

    let mut back: FxHashSet<(usize, usize)> = FxHashSet::default();
    depth_first_search(&g, g.node_indices(), |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back.insert((u.index(), v.index()));
        }
        Control::<()>::Continue
    });

    arcs.into_iter()
        .filter(|arc| !back.contains(&(arc.from, arc.to)))
        .collect()
}

/// Longest-path layering over the acyclic arc set: every node sits one
/// layer past its furthest predecessor; sources sit in layer zero.
fn assign_layers(node_count: usize, arcs: &[Arc]) -> Vec<Vec<usize>> {
    let mut indegree = vec![0usize; node_count];
    let mut out: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for arc in arcs {
        indegree[arc.to] += 1;
        out[arc.from].push(arc.to);
    }

    let mut layer = vec![0usize; node_count];
    let mut queue: Vec<usize> = (0..node_count).filter(|&n| indegree[n] == 0).collect();
    let mut head = 0;
    while head < queue.len() {
        let u = queue[head];
        head += 1;
        for &v in &out[u] {
            layer[v] = layer[v].max(layer[u] + 1);
            indegree[v] -= 1;
            if indegree[v] == 0 {
                queue.push(v);
            }
        }
    }

    let depth = layer.iter().copied().max().unwrap_or(0) + 1;
    let mut layers: Vec<Vec<usize>> = vec![Vec::new(); depth];
    for (node, &l) in layer.iter().enumerate() {
        layers[l].push(node);
    }
    layers
}

/// Barycenter crossing reduction: alternate downward and upward sweeps,
/// ordering each layer by the mean in-layer position of its neighbors in
/// the fixed layer. Port indices add a small bias so branch order follows
/// handle order. Nodes without neighbors keep their current slot.
fn order_layers(mut layers: Vec<Vec<usize>>, arcs: &[Arc]) -> Vec<Vec<usize>> {
    let node_count = layers.iter().map(Vec::len).sum();
    let mut slot = vec![0usize; node_count];
    let reindex = |layers: &[Vec<usize>], slot: &mut [usize]| {
        for layer in layers {
            for (i, &node) in layer.iter().enumerate() {
                slot[node] = i;
            }
        }
    };
    reindex(&layers, &mut slot);

    for _ in 0..ORDERING_SWEEPS {
        for downward in [true, false] {
            let range: Vec<usize> = if downward {
                (1..layers.len()).collect()
            } else {
                (0..layers.len().saturating_sub(1)).rev().collect()
            };
            for l in range {
                let mut keyed: Vec<(f64, usize)> = layers[l]
                    .iter()
                    .map(|&node| {
                        let mut total = 0.0;
                        let mut count = 0usize;
                        for arc in arcs {
                            let neighbor = if downward && arc.to == node {
                                Some((arc.from, arc.port_bias))
                            } else if !downward && arc.from == node {
                                Some((arc.to, arc.port_bias))
                            } else {
                                None
                            };
                            if let Some((other, bias)) = neighbor {
                                total += slot[other] as f64 + bias;
                                count += 1;
                            }
                        }
                        let key = if count == 0 {
                            slot[node] as f64
                        } else {
                            total / count as f64
                        };
                        (key, node)
                    })
                    .collect();
                keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
                layers[l] = keyed.into_iter().map(|(_, node)| node).collect();
                reindex(&layers, &mut slot);
            }
        }
    }
    layers
}

/// Coordinate assignment: layers advance along the flow direction by the
/// widest box plus layer spacing; within a layer boxes stack with node
/// spacing, then centering sweeps pull each box toward the mean of its
/// neighbors without breaking the layer order.
fn place(graph: &LayoutGraph, layers: &[Vec<usize>]) -> PositionMap {
    let options = &graph.options;
    let extent = |node: usize| -> (f64, f64) {
        let b = &graph.boxes[node];
        match options.direction {
            LayoutDirection::Right => (b.width, b.height),
            LayoutDirection::Down => (b.height, b.width),
        }
    };

    let node_count = graph.boxes.len();
    let mut major = vec![0.0f64; node_count];
    let mut minor = vec![0.0f64; node_count];

    let mut offset = 0.0;
    for layer in layers {
        let mut span = 0.0f64;
        let mut cursor = 0.0;
        for &node in layer {
            let (along, across) = extent(node);
            major[node] = offset;
            minor[node] = cursor;
            cursor += across + options.node_spacing;
            span = span.max(along);
        }
        offset += span + options.layer_spacing;
    }

    let neighbors: Vec<Vec<usize>> = {
        let mut n: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        for link in &graph.links {
            // Endpoints were validated in solve().
            let a = graph.boxes.iter().position(|b| b.id == link.source);
            let b = graph.boxes.iter().position(|b| b.id == link.target);
            if let (Some(a), Some(b)) = (a, b) {
                if a != b {
                    n[a].push(b);
                    n[b].push(a);
                }
            }
        }
        n
    };

    for _ in 0..CENTERING_SWEEPS {
        for layer in layers {
            for &node in layer {
                if neighbors[node].is_empty() {
                    continue;
                }
                let (_, across) = extent(node);
                let mean: f64 = neighbors[node]
                    .iter()
                    .map(|&other| minor[other] + extent(other).1 / 2.0)
                    .sum::<f64>()
                    / neighbors[node].len() as f64;
                minor[node] = mean - across / 2.0;
            }
            // Restore layer order and spacing after the pull.
            let mut floor = f64::NEG_INFINITY;
            for &node in layer {
                let (_, across) = extent(node);
                if minor[node] < floor {
                    minor[node] = floor;
                }
                floor = minor[node] + across + options.node_spacing;
            }
        }
    }

    // Normalize so the smallest coordinate on each axis is zero.
    let min_minor = minor.iter().copied().fold(f64::INFINITY, f64::min);
    let shift = if min_minor.is_finite() { min_minor } else { 0.0 };

    graph
        .boxes
        .iter()
        .enumerate()
        .map(|(node, b)| {
            let position = match options.direction {
                LayoutDirection::Right => Position::new(major[node], minor[node] - shift),
                LayoutDirection::Down => Position::new(minor[node] - shift, major[node]),
            };
            (b.id.clone(), position)
        })
        .collect()
}
