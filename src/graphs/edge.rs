//! Derived edge descriptors with deterministic identities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ConditionId, DraftKey, NodeRef};

/// Deterministic edge identity composed from source, optional condition, and
/// target.
///
/// Identical inputs always produce the identical id, which is what makes
/// re-derivation idempotent: the extractor skips creation when the id is
/// already present, so no input can yield duplicate edges for the same
/// `(source, condition, target)` triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(String);

impl EdgeId {
    #[must_use]
    pub fn new(source: &NodeRef, condition: Option<&ConditionId>, target: &NodeRef) -> Self {
        match condition {
            Some(rc) => EdgeId(format!("edge:{}:{}:{}", source.encode(), rc, target.encode())),
            None => EdgeId(format!("edge:{}:{}", source.encode(), target.encode())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presentational and semantic flags carried by a derived edge.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EdgeData {
    pub source_color: &'static str,
    pub target_color: &'static str,
    /// The router condition this edge belongs to, if any.
    pub condition: Option<ConditionId>,
    /// Source is a router and this edge follows one of its conditions.
    pub is_route_condition: bool,
    /// Source is a router and this edge is its implicit default branch.
    pub is_default: bool,
    /// Condition editing is unavailable on this edge (exception edges and
    /// iterator outputs).
    pub is_condition_disabled: bool,
    /// This edge is an error-handling continuation.
    pub is_except: bool,
    /// Insertion selector when the target is a draft.
    pub after: Option<DraftKey>,
}

/// One renderable edge of the derived flow graph.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowEdge {
    pub id: EdgeId,
    pub source: NodeRef,
    pub target: NodeRef,
    pub source_handle: String,
    pub target_handle: String,
    pub data: EdgeData,
}
