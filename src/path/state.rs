//! Path data model

use crate::error::{AttributionError, Result};
use ndarray::{Array2, ArrayView2};

/// A batched, multi-step path as a tuple of parallel tensors
///
/// Each tensor is shaped `(n_steps * batch, features)` with row
/// `s * batch + b` holding step `s` of example `b`; step order encodes
/// progression from baseline to input. All tensors share the same step and
/// batch counts; feature widths may differ per tensor.
#[derive(Debug, Clone)]
pub struct PathState {
    tensors: Vec<Array2<f32>>,
    n_steps: usize,
    batch: usize,
}

impl PathState {
    /// Wrap raw tensors, validating the shared layout before any reshape
    pub fn new(tensors: Vec<Array2<f32>>, n_steps: usize) -> Result<Self> {
        if tensors.is_empty() {
            return Err(AttributionError::ShapeMismatch(
                "path requires at least one tensor".to_string(),
            ));
        }
        if n_steps == 0 {
            return Err(AttributionError::ShapeMismatch(
                "path requires n_steps >= 1".to_string(),
            ));
        }
        let rows = tensors[0].nrows();
        if rows % n_steps != 0 {
            return Err(AttributionError::ShapeMismatch(format!(
                "leading dimension {rows} is not divisible by n_steps {n_steps}"
            )));
        }
        let batch = rows / n_steps;
        for (i, tensor) in tensors.iter().enumerate() {
            if tensor.nrows() != rows {
                return Err(AttributionError::ShapeMismatch(format!(
                    "path tensor {i} has {} rows, expected {rows}",
                    tensor.nrows()
                )));
            }
        }
        Ok(Self {
            tensors,
            n_steps,
            batch,
        })
    }

    /// Straight-line path: row `s*batch + b` is `baseline_b + alpha_s * (input_b - baseline_b)`
    pub fn straight_line(
        inputs: &[Array2<f32>],
        baselines: &[Array2<f32>],
        alphas: &[f32],
    ) -> Result<Self> {
        if inputs.len() != baselines.len() {
            return Err(AttributionError::ShapeMismatch(format!(
                "{} inputs vs {} baselines",
                inputs.len(),
                baselines.len()
            )));
        }
        let n_steps = alphas.len();
        let mut tensors = Vec::with_capacity(inputs.len());
        for (t, (input, baseline)) in inputs.iter().zip(baselines).enumerate() {
            if input.raw_dim() != baseline.raw_dim() {
                return Err(AttributionError::ShapeMismatch(format!(
                    "input tensor {t} is {:?} but its baseline is {:?}",
                    input.shape(),
                    baseline.shape()
                )));
            }
            let batch = input.nrows();
            let features = input.ncols();
            let mut path = Array2::zeros((n_steps * batch, features));
            for (s, &alpha) in alphas.iter().enumerate() {
                for b in 0..batch {
                    let mut row = path.row_mut(s * batch + b);
                    row.assign(&baseline.row(b));
                    row.scaled_add(alpha, &(&input.row(b) - &baseline.row(b)));
                }
            }
            tensors.push(path);
        }
        Self::new(tensors, n_steps)
    }

    /// Number of steps per example
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Number of examples
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// The underlying tensors
    pub fn tensors(&self) -> &[Array2<f32>] {
        &self.tensors
    }

    /// A single tensor of the tuple
    pub fn tensor(&self, index: usize) -> &Array2<f32> {
        &self.tensors[index]
    }

    /// Consume into the underlying tensors
    pub fn into_tensors(self) -> Vec<Array2<f32>> {
        self.tensors
    }

    /// Borrow every tensor as a view
    pub fn views(&self) -> Vec<ArrayView2<f32>> {
        self.tensors.iter().map(|t| t.view()).collect()
    }

    /// Consecutive-point Euclidean distances for one tensor
    ///
    /// Returns `(n_steps, batch)`; the final step replicates the
    /// second-to-last value so every path point carries a step size.
    pub fn step_sizes(&self, index: usize) -> Array2<f32> {
        let tensor = &self.tensors[index];
        let mut sizes = Array2::zeros((self.n_steps, self.batch));
        if self.n_steps < 2 {
            return sizes;
        }
        for s in 0..self.n_steps - 1 {
            for b in 0..self.batch {
                let here = tensor.row(s * self.batch + b);
                let next = tensor.row((s + 1) * self.batch + b);
                let diff = &next - &here;
                sizes[[s, b]] = diff.dot(&diff).sqrt();
            }
        }
        for b in 0..self.batch {
            sizes[[self.n_steps - 1, b]] = sizes[[self.n_steps - 2, b]];
        }
        sizes
    }
}
