//! End-to-end orchestration: derive, size, lay out, and write positions
//! back.
//!
//! [`FlowLayoutPipeline`] owns the derivation cache and the layout engine
//! and exposes one operation, [`sync_layout`](FlowLayoutPipeline::sync_layout).
//! Re-layout is intentionally lazy: a full layout runs only when the node
//! count changed, when some node has no stored position yet, or when the
//! caller forces an auto-align. Anything else reuses the stored positions
//! and returns an empty batch.

use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::dimensions::resolve_dimensions;
use crate::graphs::{source_handles, GraphCache};
use crate::layout::{compute_layout, LayeredEngine, LayoutEngine, LayoutError, LayoutOptions};
use crate::positions::{diff_positions, split_updates, UpdateBatch};
use crate::store::{ModuleStore, StoreError};

/// Errors surfaced by a pipeline run.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),
}

#[derive(Default)]
struct PipelineState {
    cache: GraphCache,
    last_node_count: Option<usize>,
}

/// Derivation-to-persistence pipeline over one module store.
///
/// The internal mutex serializes runs: concurrent calls against the same
/// pipeline queue up instead of laying out the same graph twice.
pub struct FlowLayoutPipeline {
    engine: Arc<dyn LayoutEngine>,
    options: LayoutOptions,
    state: Mutex<PipelineState>,
}

impl FlowLayoutPipeline {
    pub fn new(engine: Arc<dyn LayoutEngine>, options: LayoutOptions) -> Self {
        Self {
            engine,
            options,
            state: Mutex::new(PipelineState::default()),
        }
    }

    /// Pipeline backed by the built-in layered engine.
    #[must_use]
    pub fn layered(options: LayoutOptions) -> Self {
        Self::new(Arc::new(LayeredEngine), options)
    }

    /// Derive the graph, lay it out if needed, and commit changed positions.
    ///
    /// Returns the applied update batch: `persist` entries belong to the
    /// backend sync, `local` entries stay client-side. An empty batch means
    /// the stored positions were already valid (or the layout moved
    /// nothing).
    #[instrument(skip_all, fields(generation = store.generation(), force_align))]
    pub async fn sync_layout(
        &self,
        store: &mut ModuleStore,
        force_align: bool,
    ) -> Result<UpdateBatch, PipelineError> {
        let mut state = self.state.lock().await;

        let graph = state.cache.graph(store);
        let handles = source_handles(store);
        let nodes = resolve_dimensions(&graph, &handles);

        let node_count = nodes.len();
        let count_changed = state.last_node_count != Some(node_count);
        let missing_position = nodes
            .iter()
            .any(|node| store.position_of(&node.id).is_none());

        if !(force_align || count_changed || missing_position) {
            debug!(node_count, "positions valid, skipping layout");
            return Ok(UpdateBatch::default());
        }

        let computed = compute_layout(self.engine.as_ref(), &nodes, &graph.edges, &self.options)
            .await?;

        let previous = store.position_map();
        let diff = diff_positions(&previous, &computed);
        let batch = split_updates(store, &diff);
        store.apply_positions(&batch)?;
        state.last_node_count = Some(node_count);

        debug!(
            node_count,
            persisted = batch.persist.len(),
            local = batch.local.len(),
            "layout committed"
        );
        Ok(batch)
    }
}
