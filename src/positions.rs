//! Canvas positions: diffing and persistence splitting.
//!
//! Computed layouts are applied back to the [`ModuleStore`](crate::store::ModuleStore)
//! through an update batch. Two rules govern that path:
//!
//! 1. **Minimal diffing**: only coordinates that actually changed are
//!    emitted, so unchanged nodes trigger no re-render and no backend sync.
//! 2. **Persistence split**: existing modules sync their position to the
//!    backend; drafts have no backend identity and keep a local-only
//!    position. The split is part of the crate's contract, not an
//!    implementation detail.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::store::ModuleStore;
use crate::types::NodeRef;

/// A 2D canvas coordinate (top-left corner of a node's box).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Node positions keyed by graph identity.
pub type PositionMap = FxHashMap<NodeRef, Position>;

/// Keep only the entries of `new` whose value differs from `old`.
///
/// Comparison is per coordinate pair, not by reference: an entry re-emitted
/// with identical `x` and `y` is dropped from the diff. Keys absent from
/// `old` always count as changed.
#[must_use]
pub fn diff_positions(old: &PositionMap, new: &PositionMap) -> PositionMap {
    new.iter()
        .filter(|(id, pos)| old.get(*id) != Some(*pos))
        .map(|(id, pos)| (id.clone(), *pos))
        .collect()
}

/// A single position write-back request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub reference: NodeRef,
    pub position: Position,
}

/// Position updates partitioned by persistence target.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateBatch {
    /// Updates for persisted modules, to be synced to the backend.
    pub persist: Vec<PositionUpdate>,
    /// Updates for draft modules, kept local until the draft is saved.
    pub local: Vec<PositionUpdate>,
}

impl UpdateBatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.persist.is_empty() && self.local.is_empty()
    }

    pub fn len(&self) -> usize {
        self.persist.len() + self.local.len()
    }
}

/// Split a position diff into backend-persisted and local-only updates.
///
/// A reference counts as persisted only when the store actually knows the
/// module; a stale existing id that no longer resolves is routed to the local
/// bucket rather than producing a backend write for a deleted module.
/// Output order is sorted by reference for deterministic batches.
#[must_use]
pub fn split_updates(store: &ModuleStore, diff: &PositionMap) -> UpdateBatch {
    let mut batch = UpdateBatch::default();
    let mut entries: Vec<_> = diff.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (reference, position) in entries {
        let update = PositionUpdate {
            reference: reference.clone(),
            position: *position,
        };
        match reference {
            NodeRef::Existing(id) if store.contains_module(id) => batch.persist.push(update),
            _ => batch.local.push(update),
        }
    }
    batch
}
