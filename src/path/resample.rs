//! Arc-length re-parameterization of optimized paths
//!
//! An optimized path keeps its point count but loses uniform spacing. This
//! pass re-derives the point set so resolution concentrates where the path
//! moves quickly: segments are subdivided in proportion to their share of
//! the total arc length, then the dense sequence is downsampled back to the
//! original point count by even index selection.

use crate::error::Result;
use crate::path::PathState;
use ndarray::{Array1, Array2};

/// Redistribute every tensor of a path, batch item by batch item
///
/// Point count per batch item is exactly `n_steps` by construction; local
/// density varies with the optimized geometry. Degenerate items where all
/// points coincide fall back to uniform allocation.
pub fn redistribute(path: &PathState) -> Result<PathState> {
    let n_steps = path.n_steps();
    let batch = path.batch();
    let tensors = path
        .tensors()
        .iter()
        .map(|tensor| redistribute_tensor(tensor, n_steps, batch))
        .collect();
    PathState::new(tensors, n_steps)
}

fn redistribute_tensor(tensor: &Array2<f32>, n_steps: usize, batch: usize) -> Array2<f32> {
    let features = tensor.ncols();
    let mut out = Array2::zeros((n_steps * batch, features));
    if n_steps < 2 {
        out.assign(tensor);
        return out;
    }

    for b in 0..batch {
        // Consecutive distances, last entry replicated to keep n_steps values
        let mut sizes = Array1::zeros(n_steps);
        for s in 0..n_steps - 1 {
            let here = tensor.row(s * batch + b);
            let next = tensor.row((s + 1) * batch + b);
            let diff = &next - &here;
            sizes[s] = diff.dot(&diff).sqrt();
        }
        sizes[n_steps - 1] = sizes[n_steps - 2];

        // Share of the arc length per segment; all-coincident points get a
        // uniform split instead of a division by zero
        let total: f32 = sizes.sum();
        let normalized = if total <= f32::EPSILON {
            Array1::from_elem(n_steps, 1.0 / n_steps as f32)
        } else {
            sizes / total
        };

        let max_share = normalized.iter().cloned().fold(0.0f32, f32::max);
        let scale = n_steps as f32 / max_share;

        // Dense sequence: first point, then each segment subdivided
        // proportionally (at least one interval, so the endpoint survives)
        let mut dense: Vec<Array1<f32>> = Vec::with_capacity(n_steps * 2);
        dense.push(tensor.row(b).to_owned());
        for s in 0..n_steps - 1 {
            let num = (normalized[s] * scale).round().max(1.0) as usize;
            let start = tensor.row(s * batch + b);
            let end = tensor.row((s + 1) * batch + b);
            let delta = &end - &start;
            for k in 0..=num {
                let alpha = k as f32 / num as f32;
                dense.push(&start + &(&delta * alpha));
            }
        }

        // Even index selection back down to n_steps points
        let last = (dense.len() - 1) as f32;
        for j in 0..n_steps {
            let pos = j as f32 * last / (n_steps - 1) as f32;
            let idx = (pos.round() as usize).min(dense.len() - 1);
            out.row_mut(j * batch + b).assign(&dense[idx]);
        }
    }
    out
}
