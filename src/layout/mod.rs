//! Position computation for derived flow graphs.
//!
//! Split in three stages:
//!
//! - [`adapter`]: translates sized nodes and edges into the engine-neutral
//!   [`LayoutGraph`](engine::LayoutGraph) of boxes, ports, and links, and
//!   drives the full layout pass.
//! - [`engine`]: the [`LayoutEngine`](engine::LayoutEngine) seam and the
//!   built-in layered implementation (cycle removal, longest-path layering,
//!   barycenter ordering, coordinate assignment).
//! - [`refine`]: the off-thread spring/repulsion pass that relaxes the
//!   layered result for larger graphs.

pub mod adapter;
pub mod engine;
pub mod options;
pub mod refine;

use miette::Diagnostic;
use thiserror::Error;

pub use adapter::{compute_layout, to_layout_graph};
pub use engine::{LayeredEngine, LayoutBox, LayoutEngine, LayoutGraph, LayoutLink, Port, PortSide};
pub use options::{LayoutDirection, LayoutOptions};

/// Errors surfaced by layout and refinement.
#[derive(Debug, Error, Diagnostic)]
pub enum LayoutError {
    /// A link referenced a box the layout graph does not contain.
    #[error("layout link references unknown endpoint: {reference}")]
    #[diagnostic(
        code(flowscape::layout::unknown_endpoint),
        help("Links must connect boxes present in the same layout graph; re-derive before laying out.")
    )]
    UnknownEndpoint { reference: String },

    /// The refinement simulation produced a non-finite coordinate or
    /// otherwise failed inside the worker.
    #[error("refinement worker failed: {reason}")]
    #[diagnostic(code(flowscape::layout::refine_worker))]
    RefineWorker { reason: String },

    /// The refinement worker went away before sending a result.
    #[error("refinement channel closed before a result arrived")]
    #[diagnostic(
        code(flowscape::layout::refine_channel),
        help("The blocking worker panicked or was cancelled; the layered positions are still valid.")
    )]
    RefineChannelClosed,
}
