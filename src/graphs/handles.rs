//! Source-handle derivation.
//!
//! Outgoing handles are derived from the store, not from the walked graph:
//! a router exposes one conditional handle per route condition plus its
//! default handle regardless of which branches currently connect anywhere.
//! Only persisted modules get derived handles; drafts connect through their
//! structural key alone.

use rustc_hash::FxHashMap;

use super::node::{condition_handle_id, except_handle_id, source_handle_id, SourceHandle};
use crate::store::ModuleStore;
use crate::types::{ConditionId, ModuleId, ModuleKind, NodeRef};

/// Per-module ordered source handle lists for every persisted module.
///
/// Ordering is conditions first (in their stored router order), then the
/// default/plain handle. A response module terminates its branch and gets no
/// plain handle at all.
#[must_use]
pub fn source_handles(store: &ModuleStore) -> FxHashMap<ModuleId, Vec<SourceHandle>> {
    let mut map = FxHashMap::default();
    for id in store.module_ids_sorted() {
        let Some(kind) = store.kind_of(&id) else {
            continue;
        };
        map.insert(id.clone(), handles_for(store, &id, kind));
    }
    map
}

fn handles_for(store: &ModuleStore, id: &ModuleId, kind: ModuleKind) -> Vec<SourceHandle> {
    let node = NodeRef::Existing(id.clone());
    match kind {
        ModuleKind::Router => {
            let mut handles: Vec<SourceHandle> = store
                .conditions_of(id)
                .iter()
                .map(|rc| SourceHandle {
                    id: condition_handle_id(&node, rc),
                    condition: Some(rc.clone()),
                    is_default: false,
                })
                .collect();
            handles.push(SourceHandle {
                id: source_handle_id(&node),
                condition: None,
                is_default: true,
            });
            handles
        }
        kind if kind.terminates_branch() => Vec::new(),
        _ => vec![SourceHandle {
            id: source_handle_id(&node),
            condition: None,
            is_default: false,
        }],
    }
}

/// Resolve the source-side port reference for an edge: conditional edges
/// leave through their branch port, exception edges through the except
/// port, and everything else through the plain source port.
#[must_use]
pub fn source_handle_for_edge(
    source: &NodeRef,
    condition: Option<&ConditionId>,
    is_except: bool,
) -> String {
    if let Some(rc) = condition {
        condition_handle_id(source, rc)
    } else if is_except {
        except_handle_id(source)
    } else {
        source_handle_id(source)
    }
}
