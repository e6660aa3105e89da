//! Flow-graph derivation from the module store.
//!
//! [`derive_graph`] walks the store starting from its trigger modules and
//! produces a deduplicated node/edge set with deterministic identities.
//! The walk resolves four kinds of continuation:
//!
//! - linear `next` pointers,
//! - router branches (one edge per route condition, plus a synthesized
//!   default continuation that fills the gap when no condition resolves),
//! - exception ("except") branches,
//! - draft placeholders addressed by insertion path, including nested
//!   draft-off-draft chains.
//!
//! Derivation is infallible: malformed or cyclic adjacency degrades to an
//! incomplete-but-safe graph instead of erroring (see the cycle guard on
//! [`GraphExtractor::process_chain`]).

use rustc_hash::FxHashMap;

use super::edge::{EdgeData, EdgeId, FlowEdge};
use super::node::{
    except_handle_id, kind_color, target_handle_id, EXCEPT_COLOR, FlowNode, Handle, NodeStatus,
    Previous,
};
use super::{source_handle_for_edge, FlowGraph};
use crate::dimensions::BASE_NODE_SIZE;
use crate::store::ModuleStore;
use crate::types::{DraftKey, DraftSlot, ModuleKind, NodeRef};

/// Derive the renderable graph for the current store contents.
///
/// Pure and deterministic: identical stores yield identical node and edge
/// maps. Callers wanting memoization should go through
/// [`GraphCache`](super::GraphCache).
#[must_use]
pub fn derive_graph(store: &ModuleStore) -> FlowGraph {
    GraphExtractor::new(store).run()
}

pub(crate) struct GraphExtractor<'a> {
    store: &'a ModuleStore,
    nodes: FxHashMap<NodeRef, FlowNode>,
    edges: FxHashMap<EdgeId, FlowEdge>,
}

impl<'a> GraphExtractor<'a> {
    pub(crate) fn new(store: &'a ModuleStore) -> Self {
        Self {
            store,
            nodes: FxHashMap::default(),
            edges: FxHashMap::default(),
        }
    }

    pub(crate) fn run(mut self) -> FlowGraph {
        let mut seeds: Vec<NodeRef> = self
            .store
            .module_ids_sorted()
            .into_iter()
            .filter(|id| self.store.kind_of(id) == Some(ModuleKind::Trigger))
            .map(NodeRef::Existing)
            .collect();
        if seeds.is_empty() {
            // No trigger yet: seed with the synthetic draft trigger so the
            // canvas always has an entry node to build from.
            seeds.push(NodeRef::Draft(DraftKey::Trigger));
        }
        for seed in seeds {
            self.process_chain(seed, None, None, false);
        }

        // Defensive sweep: disconnected fragments (e.g. a module whose
        // predecessor was deleted) still become nodes, seeded on their own.
        for id in self.store.module_ids_sorted() {
            let node = NodeRef::Existing(id);
            if !self.nodes.contains_key(&node) {
                self.process_chain(node, None, None, false);
            }
        }

        tracing::debug!(
            nodes = self.nodes.len(),
            edges = self.edges.len(),
            generation = self.store.generation(),
            "derived flow graph"
        );
        FlowGraph {
            nodes: self.nodes,
            edges: self.edges,
        }
    }

    fn kind_of(&self, node: &NodeRef) -> Option<ModuleKind> {
        match node {
            NodeRef::Existing(id) => self.store.kind_of(id),
            NodeRef::Draft(key) => self.store.draft(key).and_then(|d| d.kind),
        }
    }

    /// Walk one chain forward from `start`.
    ///
    /// Cycle-guard precedence (kept from the observed behavior, see
    /// DESIGN.md): when the linear successor is already a known node,
    /// advancement stops if this hop carried a route condition or if the
    /// edge to that successor already exists. Otherwise one more iteration
    /// runs, which records the convergent edge, promotes the target's
    /// predecessor tracking to its multi-predecessor form, and stops.
    fn process_chain(
        &mut self,
        start: NodeRef,
        predecessor: Option<NodeRef>,
        condition: Option<crate::types::ConditionId>,
        is_except: bool,
    ) {
        let mut current = Some(start);
        let mut last = predecessor;
        let mut pending_condition = condition;
        let mut pending_except = is_except;

        while let Some(cur) = current {
            let kind = self.kind_of(&cur);
            let cond = pending_condition.take();

            if let Some(prev) = &last {
                let edge_id = EdgeId::new(prev, cond.as_ref(), &cur);
                if !self.edges.contains_key(&edge_id) {
                    let edge = self.craft_edge(prev, &cur, kind, cond.clone(), pending_except);
                    self.edges.insert(edge_id, edge);
                }
            }

            if !self.nodes.contains_key(&cur) {
                let node = self.craft_node(&cur, kind, last.as_ref());
                self.nodes.insert(cur.clone(), node);
                // Side branches recurse only after the node is registered,
                // so a branch looping straight back cannot re-enter it.
                self.spawn_side_branches(&cur, kind);
            } else if let Some(prev) = &last {
                if let Some(existing) = self.nodes.get_mut(&cur) {
                    existing.previous.record(prev.clone());
                }
            }

            let next = self.successor_of(&cur, kind);
            last = Some(cur);
            current = match next {
                Some(succ) if self.nodes.contains_key(&succ) => {
                    let prev = last.as_ref().map(NodeRef::clone);
                    let stop = cond.is_some()
                        || prev
                            .map(|p| {
                                self.edges
                                    .contains_key(&EdgeId::new(&p, cond.as_ref(), &succ))
                            })
                            .unwrap_or(false);
                    if stop { None } else { Some(succ) }
                }
                other => other,
            };
            pending_except = false;
        }
    }

    /// Resolve the linear successor of a node.
    ///
    /// Persisted modules follow the `next` mapping, then fall back to a
    /// draft continuation: routers probe the `Default` slot (ahead of any
    /// data presence on conditions), everything else the `Next` slot.
    /// Drafts honor their own recorded forward pointer first (insertion
    /// before an existing module), then a nested child draft.
    fn successor_of(&self, node: &NodeRef, kind: Option<ModuleKind>) -> Option<NodeRef> {
        if let NodeRef::Existing(id) = node {
            if let Some(next) = self.store.next_of(id) {
                return Some(NodeRef::Existing(next.clone()));
            }
        }
        if let NodeRef::Draft(key) = node {
            if let Some(next) = self.store.draft(key).and_then(|d| d.next.clone()) {
                return Some(NodeRef::Existing(next));
            }
        }
        let slot = if kind == Some(ModuleKind::Router) {
            DraftSlot::Default
        } else {
            DraftSlot::Next
        };
        let child = DraftKey::child(node.clone(), slot);
        self.store.has_draft(&child).then(|| NodeRef::Draft(child))
    }

    fn craft_node(
        &self,
        node: &NodeRef,
        kind: Option<ModuleKind>,
        predecessor: Option<&NodeRef>,
    ) -> FlowNode {
        let mut target_handles = Vec::new();
        if kind != Some(ModuleKind::Trigger) {
            target_handles.push(Handle::new(target_handle_id(node)));
        }
        let mut except_handles = Vec::new();
        if kind.is_some_and(|k| k.supports_except()) && !node.is_draft() {
            except_handles.push(Handle::new(except_handle_id(node)));
        }
        let next = match node {
            NodeRef::Existing(id) => self.store.next_of(id).cloned().map(NodeRef::Existing),
            NodeRef::Draft(key) => self
                .store
                .draft(key)
                .and_then(|d| d.next.clone())
                .map(NodeRef::Existing),
        };
        FlowNode {
            id: node.clone(),
            status: if node.is_draft() {
                NodeStatus::New
            } else {
                NodeStatus::Existing
            },
            kind,
            color: kind_color(kind),
            target_handles,
            except_handles,
            source_handles: Vec::new(),
            previous: match predecessor {
                Some(prev) => Previous::One(prev.clone()),
                None => Previous::None,
            },
            next,
            width: BASE_NODE_SIZE,
            height: BASE_NODE_SIZE,
            no_source: false,
        }
    }

    /// Recurse into exception and router-condition branches of a freshly
    /// registered node. Branches are side walks: they never advance the
    /// caller's cursor.
    fn spawn_side_branches(&mut self, node: &NodeRef, kind: Option<ModuleKind>) {
        // Exception continuation, persisted modules only.
        if kind.is_some_and(|k| k.supports_except()) && !node.is_draft() {
            let except_target = self.except_target_of(node);
            if let Some(target) = except_target {
                if self.target_resolves(&target) {
                    self.process_chain(target, Some(node.clone()), None, true);
                }
            }
        }

        // Router branches: one side walk per ordered route condition.
        if kind == Some(ModuleKind::Router) {
            if let NodeRef::Existing(id) = node {
                for rc in self.store.conditions_of(id).to_vec() {
                    let target = match self.store.condition_next_of(&rc) {
                        Some(next) => Some(NodeRef::Existing(next.clone())),
                        None => {
                            let child =
                                DraftKey::child(node.clone(), DraftSlot::Condition(rc.clone()));
                            self.store.has_draft(&child).then(|| NodeRef::Draft(child))
                        }
                    };
                    if let Some(target) = target {
                        if self.target_resolves(&target) {
                            self.process_chain(target, Some(node.clone()), Some(rc), false);
                        }
                    }
                }
            }
        }
    }

    fn except_target_of(&self, node: &NodeRef) -> Option<NodeRef> {
        if let NodeRef::Existing(id) = node {
            if let Some(next) = self.store.except_of(id) {
                return Some(NodeRef::Existing(next.clone()));
            }
        }
        let child = DraftKey::child(node.clone(), DraftSlot::Except);
        self.store.has_draft(&child).then(|| NodeRef::Draft(child))
    }

    /// A branch target that does not resolve (a dangling id) is skipped
    /// silently; it is "no branch", not an error.
    fn target_resolves(&self, target: &NodeRef) -> bool {
        match target {
            NodeRef::Existing(id) => self.store.contains_module(id),
            NodeRef::Draft(_) => true,
        }
    }

    fn craft_edge(
        &self,
        source: &NodeRef,
        target: &NodeRef,
        target_kind: Option<ModuleKind>,
        condition: Option<crate::types::ConditionId>,
        is_except: bool,
    ) -> FlowEdge {
        let source_kind = self.kind_of(source);
        // An edge into a draft parked in the Except slot is an exception
        // edge even when reached through a plain continuation walk.
        let target_after_except = matches!(
            target.draft_key().and_then(DraftKey::after),
            Some((_, DraftSlot::Except))
        );
        let except_source = is_except || target_after_except;

        let source_color = if except_source {
            EXCEPT_COLOR
        } else {
            kind_color(source_kind)
        };

        FlowEdge {
            id: EdgeId::new(source, condition.as_ref(), target),
            source: source.clone(),
            target: target.clone(),
            source_handle: source_handle_for_edge(source, condition.as_ref(), except_source),
            target_handle: target_handle_id(target),
            data: EdgeData {
                source_color,
                target_color: kind_color(target_kind),
                is_route_condition: source_kind == Some(ModuleKind::Router) && condition.is_some(),
                is_default: source_kind == Some(ModuleKind::Router) && condition.is_none(),
                is_condition_disabled: is_except || source_kind == Some(ModuleKind::Iterator),
                is_except,
                after: target.draft_key().cloned(),
                condition,
            },
        }
    }
}
