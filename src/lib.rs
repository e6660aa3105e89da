//! # Flowscape: Workflow Canvas Derivation and Layout
//!
//! Flowscape turns normalized workflow state into a renderable, laid-out
//! flow graph. It is the headless core behind a visual workflow editor:
//! the host owns rendering and persistence, this crate owns everything in
//! between.
//!
//! ## Core Concepts
//!
//! - **Module Store**: the single source of truth for module kinds, the
//!   next/except/condition adjacency, draft modules keyed by insertion
//!   path, and canvas positions, all behind a generation counter.
//! - **Graph Extraction**: a pure walk from the trigger modules producing
//!   deduplicated nodes and edges with deterministic identities.
//! - **Dimensions**: kind-derived render sizes plus fixed-point
//!   reachability ("no-source") marking.
//! - **Layout**: a layered engine behind an async trait seam, followed by
//!   an off-thread force-refinement pass.
//! - **Positions**: minimal diffing and the persisted-vs-local update
//!   split, committed back into the store all-or-nothing.
//!
//! ## Quick Start
//!
//! ```
//! use flowscape::pipeline::FlowLayoutPipeline;
//! use flowscape::layout::LayoutOptions;
//! use flowscape::store::ModuleStore;
//! use flowscape::types::ModuleKind;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), flowscape::pipeline::PipelineError> {
//! let mut store = ModuleStore::new();
//! store.insert_module("hook", ModuleKind::Trigger);
//! store.insert_module("step", ModuleKind::Action);
//! store.set_next("hook", "step");
//!
//! let pipeline = FlowLayoutPipeline::layered(LayoutOptions::default());
//! let batch = pipeline.sync_layout(&mut store, false).await?;
//! assert_eq!(batch.persist.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! Derivation alone, without layout:
//!
//! ```
//! use flowscape::graphs::derive_graph;
//! use flowscape::store::ModuleStore;
//! use flowscape::types::ModuleKind;
//!
//! let mut store = ModuleStore::new();
//! store.insert_module("hook", ModuleKind::Trigger);
//! let graph = derive_graph(&store);
//! assert_eq!(graph.node_count(), 1);
//! ```

pub mod dimensions;
pub mod graphs;
pub mod layout;
pub mod pipeline;
pub mod positions;
pub mod store;
pub mod telemetry;
pub mod types;
