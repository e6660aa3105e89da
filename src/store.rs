//! The normalized workflow data model.
//!
//! [`ModuleStore`] is the single source of truth the derivation pipeline
//! reads from: persisted module kinds, draft modules keyed by insertion path,
//! the next/except adjacency mappings, router branch conditions, and canvas
//! positions. It is an explicitly owned value passed by reference into pure
//! derivation functions, never ambient global state.
//!
//! Every mutation bumps a generation counter. Derived artifacts (the flow
//! graph, layouts) are memoized against that counter, so identical stores
//! never pay for recomputation and any change invalidates exactly once.
//!
//! Derivation and layout never write to the store themselves; the only write
//! path back is [`ModuleStore::apply_positions`], which commits a computed
//! position batch all-or-nothing.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::positions::{Position, PositionMap, UpdateBatch};
use crate::types::{ConditionId, DraftKey, ModuleId, ModuleKind, NodeRef};

/// A module the user is composing that has no backend identity yet.
///
/// The draft's placement is carried by its [`DraftKey`]; the record itself
/// holds only what the editor has filled in so far.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftModule {
    /// Chosen module type, if the user has picked one.
    pub kind: Option<ModuleKind>,
    /// Forward pointer for drafts inserted ahead of an existing module.
    pub next: Option<ModuleId>,
}

impl DraftModule {
    pub fn typed(kind: ModuleKind) -> Self {
        Self {
            kind: Some(kind),
            next: None,
        }
    }

    #[must_use]
    pub fn with_next(mut self, next: impl Into<ModuleId>) -> Self {
        self.next = Some(next.into());
        self
    }
}

/// Errors surfaced by store write paths.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// A position update referenced a node the store has never seen.
    #[error("position update references unknown node: {reference}")]
    #[diagnostic(
        code(flowscape::store::unknown_reference),
        help("The update batch is stale; re-derive the graph against the current store.")
    )]
    UnknownReference { reference: String },
}

/// Normalized, generation-counted workflow state.
#[derive(Clone, Debug, Default)]
pub struct ModuleStore {
    kinds: FxHashMap<ModuleId, ModuleKind>,
    next: FxHashMap<ModuleId, ModuleId>,
    excepts: FxHashMap<ModuleId, ModuleId>,
    condition_next: FxHashMap<ConditionId, ModuleId>,
    router_conditions: FxHashMap<ModuleId, Vec<ConditionId>>,
    drafts: FxHashMap<DraftKey, DraftModule>,
    positions: FxHashMap<ModuleId, Position>,
    draft_positions: FxHashMap<DraftKey, Position>,
    generation: u64,
}

impl ModuleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Monotonic counter bumped on every mutation. Cache keys derive from it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    // --- persisted modules -------------------------------------------------

    pub fn insert_module(&mut self, id: impl Into<ModuleId>, kind: ModuleKind) {
        self.kinds.insert(id.into(), kind);
        self.touch();
    }

    /// Remove a module and every mapping that mentions it.
    pub fn remove_module(&mut self, id: &ModuleId) {
        self.kinds.remove(id);
        self.next.remove(id);
        self.excepts.remove(id);
        self.router_conditions.remove(id);
        self.positions.remove(id);
        self.next.retain(|_, target| target != id);
        self.excepts.retain(|_, target| target != id);
        self.condition_next.retain(|_, target| target != id);
        self.touch();
    }

    pub fn contains_module(&self, id: &ModuleId) -> bool {
        self.kinds.contains_key(id)
    }

    pub fn kind_of(&self, id: &ModuleId) -> Option<ModuleKind> {
        self.kinds.get(id).copied()
    }

    /// All persisted module ids, sorted for deterministic traversal seeding.
    pub fn module_ids_sorted(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.kinds.keys().cloned().collect();
        ids.sort();
        ids
    }

    // --- adjacency ---------------------------------------------------------

    pub fn set_next(&mut self, from: impl Into<ModuleId>, to: impl Into<ModuleId>) {
        self.next.insert(from.into(), to.into());
        self.touch();
    }

    pub fn clear_next(&mut self, from: &ModuleId) {
        self.next.remove(from);
        self.touch();
    }

    pub fn next_of(&self, id: &ModuleId) -> Option<&ModuleId> {
        self.next.get(id)
    }

    pub fn set_except(&mut self, from: impl Into<ModuleId>, to: impl Into<ModuleId>) {
        self.excepts.insert(from.into(), to.into());
        self.touch();
    }

    pub fn except_of(&self, id: &ModuleId) -> Option<&ModuleId> {
        self.excepts.get(id)
    }

    pub fn set_router_conditions(
        &mut self,
        router: impl Into<ModuleId>,
        conditions: Vec<ConditionId>,
    ) {
        self.router_conditions.insert(router.into(), conditions);
        self.touch();
    }

    /// Ordered route conditions of a router; empty for anything else.
    pub fn conditions_of(&self, id: &ModuleId) -> &[ConditionId] {
        self.router_conditions
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set_condition_next(&mut self, condition: impl Into<ConditionId>, to: impl Into<ModuleId>) {
        self.condition_next.insert(condition.into(), to.into());
        self.touch();
    }

    pub fn condition_next_of(&self, condition: &ConditionId) -> Option<&ModuleId> {
        self.condition_next.get(condition)
    }

    // --- drafts ------------------------------------------------------------

    pub fn insert_draft(&mut self, key: DraftKey, draft: DraftModule) {
        self.drafts.insert(key, draft);
        self.touch();
    }

    pub fn remove_draft(&mut self, key: &DraftKey) {
        self.drafts.remove(key);
        self.draft_positions.remove(key);
        self.touch();
    }

    pub fn has_draft(&self, key: &DraftKey) -> bool {
        self.drafts.contains_key(key)
    }

    pub fn draft(&self, key: &DraftKey) -> Option<&DraftModule> {
        self.drafts.get(key)
    }

    // --- positions ---------------------------------------------------------

    pub fn position_of(&self, reference: &NodeRef) -> Option<Position> {
        match reference {
            NodeRef::Existing(id) => self.positions.get(id).copied(),
            NodeRef::Draft(key) => self.draft_positions.get(key).copied(),
        }
    }

    /// Combined view over persisted and draft-local positions.
    pub fn position_map(&self) -> PositionMap {
        let mut map = PositionMap::default();
        for (id, pos) in &self.positions {
            map.insert(NodeRef::Existing(id.clone()), *pos);
        }
        for (key, pos) in &self.draft_positions {
            map.insert(NodeRef::Draft(key.clone()), *pos);
        }
        map
    }

    /// Commit a computed position batch, all-or-nothing.
    ///
    /// Validates every reference before writing anything: a single stale
    /// reference rejects the whole batch and leaves the store untouched, so
    /// consumers never observe a half-applied layout.
    pub fn apply_positions(&mut self, batch: &UpdateBatch) -> Result<(), StoreError> {
        for update in batch.persist.iter().chain(batch.local.iter()) {
            let known = match &update.reference {
                NodeRef::Existing(id) => self.kinds.contains_key(id),
                // Draft positions may arrive before the draft record itself
                // (synthetic trigger seeds); any draft key is addressable.
                NodeRef::Draft(_) => true,
            };
            if !known {
                return Err(StoreError::UnknownReference {
                    reference: update.reference.encode(),
                });
            }
        }
        for update in batch.persist.iter().chain(batch.local.iter()) {
            match &update.reference {
                NodeRef::Existing(id) => {
                    self.positions.insert(id.clone(), update.position);
                }
                NodeRef::Draft(key) => {
                    self.draft_positions.insert(key.clone(), update.position);
                }
            }
        }
        if !batch.is_empty() {
            self.touch();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::PositionUpdate;

    #[test]
    fn generation_bumps_on_mutation() {
        let mut store = ModuleStore::new();
        let g0 = store.generation();
        store.insert_module("a", ModuleKind::Trigger);
        assert!(store.generation() > g0);
        let g1 = store.generation();
        store.set_next("a", "b");
        assert!(store.generation() > g1);
    }

    #[test]
    fn apply_positions_is_all_or_nothing() {
        let mut store = ModuleStore::new();
        store.insert_module("a", ModuleKind::Trigger);

        let batch = UpdateBatch {
            persist: vec![
                PositionUpdate {
                    reference: NodeRef::existing("a"),
                    position: Position::new(1.0, 1.0),
                },
                PositionUpdate {
                    reference: NodeRef::existing("missing"),
                    position: Position::new(2.0, 2.0),
                },
            ],
            local: vec![],
        };

        let err = store.apply_positions(&batch).unwrap_err();
        assert!(matches!(err, StoreError::UnknownReference { .. }));
        // Nothing was written.
        assert!(store.position_of(&NodeRef::existing("a")).is_none());
    }

    #[test]
    fn remove_module_clears_dangling_mappings() {
        let mut store = ModuleStore::new();
        store.insert_module("t", ModuleKind::Trigger);
        store.insert_module("a", ModuleKind::Action);
        store.set_next("t", "a");
        store.set_except("a", "t");

        store.remove_module(&ModuleId::from("a"));
        assert!(store.next_of(&ModuleId::from("t")).is_none());
        assert!(!store.contains_module(&ModuleId::from("a")));
    }

    #[test]
    fn position_map_merges_both_worlds() {
        let mut store = ModuleStore::new();
        store.insert_module("t", ModuleKind::Trigger);
        let batch = UpdateBatch {
            persist: vec![PositionUpdate {
                reference: NodeRef::existing("t"),
                position: Position::new(0.0, 0.0),
            }],
            local: vec![PositionUpdate {
                reference: NodeRef::Draft(DraftKey::Trigger),
                position: Position::new(9.0, 9.0),
            }],
        };
        store.apply_positions(&batch).unwrap();
        let map = store.position_map();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&NodeRef::Draft(DraftKey::Trigger)),
            Some(&Position::new(9.0, 9.0))
        );
    }
}
