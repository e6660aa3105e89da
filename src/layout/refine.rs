//! Force refinement: a spring/repulsion pass over the layered result.
//!
//! The simulation is CPU-bound and runs on a blocking worker reached over a
//! one-shot channel; the worker is joined on both the success and the error
//! path so no background execution leaks past the call. Horizontal movement
//! is heavily damped, which keeps the layer ordering produced by the
//! layered engine while letting nodes relax vertically.

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use rustc_hash::FxHashMap;
use tracing::trace;

use super::engine::LayoutGraph;
use super::LayoutError;
use crate::positions::{Position, PositionMap};
use crate::types::NodeRef;

/// Fixed simulation seed: refinement must be as deterministic as the
/// layered pass it follows.
const SIMULATION_SEED: u64 = 0x666c_6f77;
/// Fraction of the computed horizontal displacement that is applied.
const X_DAMPING: f64 = 0.1;
const INITIAL_STEP: f64 = 0.9;
const COOLING: f64 = 0.975;

struct Simulation {
    ids: Vec<NodeRef>,
    /// Box centers, updated in place.
    centers: Vec<(f64, f64)>,
    half_extents: Vec<(f64, f64)>,
    /// Index pairs; rest length derives from the endpoint extents.
    springs: Vec<(usize, usize)>,
    spacing: f64,
    iterations: usize,
}

/// Refine `initial` positions for `graph` off-thread.
///
/// Returns the full refined position map, or an error when the worker fails
/// or produces non-finite coordinates. The caller decides whether to fall
/// back to the unrefined input.
pub async fn refine_positions(
    graph: &LayoutGraph,
    initial: PositionMap,
) -> Result<PositionMap, LayoutError> {
    let simulation = prepare(graph, &initial);
    let (tx, rx) = flume::bounded(1);
    let worker = tokio::task::spawn_blocking(move || {
        let outcome = run(simulation);
        let _ = tx.send(outcome);
    });

    let received = rx.recv_async().await;
    // Join on both paths so the blocking slot is released deterministically.
    let joined = worker.await;
    if let Err(join_error) = joined {
        return Err(LayoutError::RefineWorker {
            reason: join_error.to_string(),
        });
    }
    received.map_err(|_| LayoutError::RefineChannelClosed)?
}

fn prepare(graph: &LayoutGraph, initial: &PositionMap) -> Simulation {
    let ids: Vec<NodeRef> = graph.boxes.iter().map(|b| b.id.clone()).collect();
    let index: FxHashMap<&NodeRef, usize> =
        ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let half_extents: Vec<(f64, f64)> = graph
        .boxes
        .iter()
        .map(|b| (b.width / 2.0, b.height / 2.0))
        .collect();

    let centers: Vec<(f64, f64)> = graph
        .boxes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            let origin = initial.get(&b.id).copied().unwrap_or_default();
            (origin.x + half_extents[i].0, origin.y + half_extents[i].1)
        })
        .collect();

    let springs = graph
        .links
        .iter()
        .filter_map(|link| {
            let a = *index.get(&link.source)?;
            let b = *index.get(&link.target)?;
            (a != b).then_some((a, b))
        })
        .collect();

    Simulation {
        ids,
        centers,
        half_extents,
        springs,
        spacing: graph.options.node_spacing,
        iterations: graph.options.refinement_iterations,
    }
}

fn run(mut sim: Simulation) -> Result<PositionMap, LayoutError> {
    let n = sim.centers.len();
    let mut rng = StdRng::seed_from_u64(SIMULATION_SEED);
    let repulsion = sim.spacing * sim.spacing;
    let mut step = INITIAL_STEP;

    for iteration in 0..sim.iterations {
        let mut disp = vec![(0.0f64, 0.0f64); n];

        for i in 0..n {
            for j in (i + 1)..n {
                let (mut dx, mut dy) = (
                    sim.centers[i].0 - sim.centers[j].0,
                    sim.centers[i].1 - sim.centers[j].1,
                );
                let mut dist2 = dx * dx + dy * dy;
                if dist2 < 1e-6 {
                    // Coincident centers: nudge apart with seeded jitter.
                    dx = rng.random_range(-0.5..0.5);
                    dy = rng.random_range(-0.5..0.5);
                    dist2 = (dx * dx + dy * dy).max(1e-6);
                }
                let dist = dist2.sqrt();
                let force = repulsion / dist2;
                disp[i].0 += dx / dist * force;
                disp[i].1 += dy / dist * force;
                disp[j].0 -= dx / dist * force;
                disp[j].1 -= dy / dist * force;
            }
        }

        for &(a, b) in &sim.springs {
            let dx = sim.centers[b].0 - sim.centers[a].0;
            let dy = sim.centers[b].1 - sim.centers[a].1;
            let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
            let rest = sim.spacing
                + sim.half_extents[a].0
                + sim.half_extents[b].0;
            let pull = (dist - rest) / dist;
            disp[a].0 += dx * pull * 0.5;
            disp[a].1 += dy * pull * 0.5;
            disp[b].0 -= dx * pull * 0.5;
            disp[b].1 -= dy * pull * 0.5;
        }

        for i in 0..n {
            sim.centers[i].0 += disp[i].0 * step * X_DAMPING;
            sim.centers[i].1 += disp[i].1 * step;
            if !sim.centers[i].0.is_finite() || !sim.centers[i].1.is_finite() {
                return Err(LayoutError::RefineWorker {
                    reason: format!(
                        "non-finite coordinate for {} at iteration {iteration}",
                        sim.ids[i].encode()
                    ),
                });
            }
        }
        step *= COOLING;
    }
    trace!(nodes = n, iterations = sim.iterations, "refinement converged");

    Ok(sim
        .ids
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let position = Position::new(
                sim.centers[i].0 - sim.half_extents[i].0,
                sim.centers[i].1 - sim.half_extents[i].1,
            );
            (id, position)
        })
        .collect())
}
