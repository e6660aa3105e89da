//! Core identity types for the flowscape derivation engine.
//!
//! This module defines how workflow steps are identified across the two
//! worlds a canvas has to reconcile:
//!
//! - **Persisted modules** carry a backend-assigned [`ModuleId`].
//! - **Draft modules** exist only in the editor and are identified by a
//!   [`DraftKey`]: a structural path describing *where* the draft hangs off
//!   the graph (after which module, through which branch slot). Draft keys
//!   nest, so a draft hanging off another draft is representable without any
//!   string parsing.
//!
//! [`NodeRef`] unifies both into the single identity used for derived graph
//! nodes, edge endpoints, and position maps. `encode()` produces the stable
//! `new-…` string forms used for handle and edge identifiers; the encoding is
//! write-only: structure is never recovered from strings.
//!
//! # Examples
//!
//! ```rust
//! use flowscape::types::{DraftKey, DraftSlot, NodeRef};
//!
//! let router = NodeRef::existing("m42");
//! let draft = NodeRef::Draft(DraftKey::child(router.clone(), DraftSlot::Default));
//! assert_eq!(draft.encode(), "new-m42-default");
//!
//! // Drafts can hang off drafts.
//! let nested = NodeRef::Draft(DraftKey::child(draft, DraftSlot::Next));
//! assert_eq!(nested.encode(), "new-new-m42-default");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-assigned identifier of a persisted workflow module.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(pub String);

impl ModuleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        ModuleId(s.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        ModuleId(s)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one labeled branch of a router module.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConditionId(pub String);

impl ConditionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConditionId {
    fn from(s: &str) -> Self {
        ConditionId(s.to_string())
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminator for the internal utility module family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InternalKind {
    Code,
    Vars,
    Invoke,
    Response,
    Octopus,
    Aigent,
    Altaner,
}

impl InternalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InternalKind::Code => "code",
            InternalKind::Vars => "vars",
            InternalKind::Invoke => "invoke",
            InternalKind::Response => "response",
            InternalKind::Octopus => "octopus",
            InternalKind::Aigent => "aigent",
            InternalKind::Altaner => "altaner",
        }
    }
}

/// The closed set of workflow module types.
///
/// Reimplemented as a tagged union instead of the original's `type` +
/// `internal_type` string pair, so branch logic is exhaustive at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "internal_type", rename_all = "lowercase")]
pub enum ModuleKind {
    Trigger,
    Router,
    Action,
    Search,
    Iterator,
    Aggregator,
    Internal(InternalKind),
}

impl ModuleKind {
    /// Whether a module of this kind may own an error-handling ("except")
    /// continuation.
    #[must_use]
    pub fn supports_except(&self) -> bool {
        matches!(
            self,
            ModuleKind::Action
                | ModuleKind::Search
                | ModuleKind::Internal(
                    InternalKind::Code | InternalKind::Aigent | InternalKind::Invoke
                )
        )
    }

    #[must_use]
    pub fn is_trigger(&self) -> bool {
        matches!(self, ModuleKind::Trigger)
    }

    #[must_use]
    pub fn is_router(&self) -> bool {
        matches!(self, ModuleKind::Router)
    }

    /// A response module terminates its branch: it never exposes a plain
    /// source handle.
    #[must_use]
    pub fn terminates_branch(&self) -> bool {
        matches!(self, ModuleKind::Internal(InternalKind::Response))
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Trigger => write!(f, "trigger"),
            ModuleKind::Router => write!(f, "router"),
            ModuleKind::Action => write!(f, "action"),
            ModuleKind::Search => write!(f, "search"),
            ModuleKind::Iterator => write!(f, "iterator"),
            ModuleKind::Aggregator => write!(f, "aggregator"),
            ModuleKind::Internal(inner) => write!(f, "internal:{}", inner.as_str()),
        }
    }
}

/// The branch slot a draft module occupies relative to its parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DraftSlot {
    /// Plain linear continuation.
    Next,
    /// Error-handling continuation.
    Except,
    /// A specific router branch.
    Condition(ConditionId),
    /// The router's implicit default branch.
    Default,
}

/// Structural identity of a not-yet-persisted module.
///
/// A draft has no backend id; it is addressed by the place it will be
/// inserted. `Trigger` is the synthetic root used when a workflow has no
/// trigger yet. `Child` chains off any existing or draft node, so arbitrarily
/// deep unsaved tails are representable with structural equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DraftKey {
    Trigger,
    Child {
        parent: Box<NodeRef>,
        slot: DraftSlot,
    },
}

impl DraftKey {
    pub fn child(parent: NodeRef, slot: DraftSlot) -> Self {
        DraftKey::Child {
            parent: Box::new(parent),
            slot,
        }
    }

    /// The `(predecessor, slot)` pair this draft hangs off, if any.
    pub fn after(&self) -> Option<(&NodeRef, &DraftSlot)> {
        match self {
            DraftKey::Trigger => None,
            DraftKey::Child { parent, slot } => Some((parent, slot)),
        }
    }

    /// Stable string form, matching the editor's `new-…` key scheme.
    ///
    /// Write-only: nothing in this crate parses these strings back.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            DraftKey::Trigger => "new-trigger".to_string(),
            DraftKey::Child { parent, slot } => match slot {
                DraftSlot::Next => format!("new-{}", parent.encode()),
                DraftSlot::Except => format!("new-e-{}", parent.encode()),
                DraftSlot::Condition(rc) => format!("new-{}-{}", parent.encode(), rc),
                DraftSlot::Default => format!("new-{}-default", parent.encode()),
            },
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Unified identity of a derived graph node: either a persisted module or a
/// draft addressed by insertion path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeRef {
    Existing(ModuleId),
    Draft(DraftKey),
}

impl NodeRef {
    pub fn existing(id: impl Into<ModuleId>) -> Self {
        NodeRef::Existing(id.into())
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        matches!(self, NodeRef::Draft(_))
    }

    /// The draft key, when this reference points at an unsaved module.
    pub fn draft_key(&self) -> Option<&DraftKey> {
        match self {
            NodeRef::Existing(_) => None,
            NodeRef::Draft(key) => Some(key),
        }
    }

    /// Stable string form used for handle and edge identifiers.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            NodeRef::Existing(id) => id.0.clone(),
            NodeRef::Draft(key) => key.encode(),
        }
    }
}

impl From<ModuleId> for NodeRef {
    fn from(id: ModuleId) -> Self {
        NodeRef::Existing(id)
    }
}

impl From<DraftKey> for NodeRef {
    fn from(key: DraftKey) -> Self {
        NodeRef::Draft(key)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
