//! Derived node descriptors and handle identifiers.

use serde::{Deserialize, Serialize};

use crate::types::{ConditionId, DraftSlot, ModuleKind, NodeRef};

/// Neutral fallback when an endpoint's module type is unresolvable
/// (e.g. an untyped draft).
pub const NEUTRAL_COLOR: &str = "#aaa";
/// Fixed alert color for exception edges, overriding type-derived color.
pub const EXCEPT_COLOR: &str = "#ff3333";

/// Presentation color derived from a module kind. All internal subtypes
/// share one color.
#[must_use]
pub fn kind_color(kind: Option<ModuleKind>) -> &'static str {
    match kind {
        Some(ModuleKind::Trigger) => "#f5a623",
        Some(ModuleKind::Router) => "#7b61ff",
        Some(ModuleKind::Action) => "#2f80ed",
        Some(ModuleKind::Search) => "#27ae60",
        Some(ModuleKind::Iterator) => "#eb5757",
        Some(ModuleKind::Aggregator) => "#f2994a",
        Some(ModuleKind::Internal(_)) => "#56ccf2",
        None => NEUTRAL_COLOR,
    }
}

/// Incoming port on a node's west side: `t-{id}`.
#[must_use]
pub fn target_handle_id(node: &NodeRef) -> String {
    format!("t-{}", node.encode())
}

/// Plain outgoing port on a node's east side: `{id}-s`.
#[must_use]
pub fn source_handle_id(node: &NodeRef) -> String {
    format!("{}-s", node.encode())
}

/// Conditional outgoing port for one router branch: `{id}-s:{condition}`.
#[must_use]
pub fn condition_handle_id(node: &NodeRef, condition: &ConditionId) -> String {
    format!("{}-s:{}", node.encode(), condition)
}

/// Exception port on a node's north side: `{id}-e`.
#[must_use]
pub fn except_handle_id(node: &NodeRef) -> String {
    format!("{}-e", node.encode())
}

/// Whether a node is persisted or still a draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Existing,
    New,
}

/// A named connection point on a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handle {
    pub id: String,
}

impl Handle {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// An outgoing connection point, carrying its branch metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHandle {
    pub id: String,
    /// Set for router branch handles.
    pub condition: Option<ConditionId>,
    /// Marks a router's implicit default handle.
    pub is_default: bool,
}

/// Predecessor tracking for a derived node.
///
/// A node normally has one producing predecessor; convergent paths promote
/// the field to the `Many` form on the first duplicate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Previous {
    #[default]
    None,
    One(NodeRef),
    Many(Vec<NodeRef>),
}

impl Previous {
    /// Record an additional predecessor, promoting to `Many` on the first
    /// distinct duplicate. Re-recording a known predecessor is a no-op.
    pub fn record(&mut self, predecessor: NodeRef) {
        match self {
            Previous::None => *self = Previous::One(predecessor),
            Previous::One(existing) => {
                if *existing != predecessor {
                    *self = Previous::Many(vec![existing.clone(), predecessor]);
                }
            }
            Previous::Many(list) => {
                if !list.contains(&predecessor) {
                    list.push(predecessor);
                }
            }
        }
    }

    /// True when every recorded predecessor satisfies `pred`; false when
    /// there is no predecessor at all.
    pub fn all(&self, mut pred: impl FnMut(&NodeRef) -> bool) -> bool {
        match self {
            Previous::None => false,
            Previous::One(one) => pred(one),
            Previous::Many(list) => list.iter().all(pred),
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Previous::None)
    }
}

/// One renderable node of the derived flow graph.
///
/// Produced fresh on every derivation. Consumers never mutate it except for
/// the size/visibility augmentation performed by
/// [`resolve_dimensions`](crate::dimensions::resolve_dimensions).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowNode {
    pub id: NodeRef,
    pub status: NodeStatus,
    /// Unset for drafts whose type the user has not chosen yet.
    pub kind: Option<ModuleKind>,
    pub color: &'static str,
    pub target_handles: Vec<Handle>,
    pub except_handles: Vec<Handle>,
    /// Attached by the dimension resolver; empty straight out of extraction.
    pub source_handles: Vec<SourceHandle>,
    pub previous: Previous,
    /// Informational forward pointer (the module's recorded successor).
    pub next: Option<NodeRef>,
    /// Render size; base size until the dimension resolver runs.
    pub width: f64,
    pub height: f64,
    /// Unreachable from any trigger; dimmed and shrunk by the resolver.
    pub no_source: bool,
}

impl FlowNode {
    /// The `(predecessor, slot)` insertion selector for draft nodes.
    pub fn after(&self) -> Option<(&NodeRef, &DraftSlot)> {
        self.id.draft_key().and_then(|key| key.after())
    }
}
