//! Penalized path energy
//!
//! The energy of a candidate path balances staying close to the reference
//! path (distance penalty) against avoiding regions where the oracle's
//! output gradient is large (curvature penalty):
//!
//! `E = Σ (‖c − r‖ − β · ‖∇f(c)‖)` over every path point of every tensor,
//! optionally plus a heavily weighted copy of the distance penalty over the
//! first and last few steps (endpoint matching). Lower is better; the
//! curvature term makes negative values legal.
//!
//! Optimization needs `∂E/∂c`, and the curvature term's derivative is the
//! gradient of a gradient norm — the second-order pass supplied by
//! [`Oracle::hvp`].

use crate::oracle::{AuxArgs, Oracle};
use crate::path::PathState;
use ndarray::{Array2, ArrayView1};

/// Potential-energy evaluator bound to one oracle and one call context
pub struct PotentialEnergy<'a> {
    oracle: &'a dyn Oracle,
    target: Option<usize>,
    aux: Option<&'a AuxArgs>,
    endpoint_weight: f32,
    edge_fraction: f32,
}

fn norm(row: ArrayView1<f32>) -> f32 {
    row.dot(&row).sqrt()
}

impl<'a> PotentialEnergy<'a> {
    /// Bind the evaluator to an oracle and its call context
    pub fn new(
        oracle: &'a dyn Oracle,
        target: Option<usize>,
        aux: Option<&'a AuxArgs>,
        endpoint_weight: f32,
        edge_fraction: f32,
    ) -> Self {
        Self {
            oracle,
            target,
            aux,
            endpoint_weight,
            edge_fraction,
        }
    }

    fn edge_steps(&self, n_steps: usize) -> usize {
        ((self.edge_fraction * n_steps as f32).floor() as usize)
            .max(1)
            .min(n_steps)
    }

    /// Scalar energy of a candidate path against its reference
    pub fn value(
        &self,
        candidate: &PathState,
        reference: &PathState,
        beta: f32,
        use_endpoints_matching: bool,
    ) -> f32 {
        let mut total = 0.0;

        for (c, r) in candidate.tensors().iter().zip(reference.tensors()) {
            let diff = c - r;
            for row in diff.rows() {
                total += norm(row);
            }
        }

        let grads = self
            .oracle
            .gradient(&candidate.views(), self.target, self.aux);
        for g in &grads {
            for row in g.rows() {
                total -= beta * norm(row);
            }
        }

        if use_endpoints_matching {
            total += self.endpoint_term(candidate, reference, None);
        }
        total
    }

    /// Energy plus its gradient with respect to every path row
    ///
    /// Distance and endpoint terms differentiate to normalized offsets from
    /// the reference; the curvature term differentiates through the oracle's
    /// gradient via the Hessian-vector product with the normalized gradient
    /// direction. Zero-norm rows contribute zero gradient.
    pub fn value_and_grad(
        &self,
        candidate: &PathState,
        reference: &PathState,
        beta: f32,
        use_endpoints_matching: bool,
    ) -> (f32, Vec<Array2<f32>>) {
        let mut total = 0.0;
        let mut grads_out: Vec<Array2<f32>> = candidate
            .tensors()
            .iter()
            .map(|t| Array2::zeros(t.raw_dim()))
            .collect();

        // Distance penalty
        for ((c, r), out) in candidate
            .tensors()
            .iter()
            .zip(reference.tensors())
            .zip(&mut grads_out)
        {
            let diff = c - r;
            for (row, mut out_row) in diff.rows().into_iter().zip(out.rows_mut()) {
                let n = norm(row);
                total += n;
                if n > 0.0 {
                    out_row.scaled_add(1.0 / n, &row);
                }
            }
        }

        // Curvature penalty through the second-order pass
        let oracle_grads = self
            .oracle
            .gradient(&candidate.views(), self.target, self.aux);
        let mut directions = Vec::with_capacity(oracle_grads.len());
        for g in &oracle_grads {
            let mut unit = Array2::zeros(g.raw_dim());
            for (row, mut unit_row) in g.rows().into_iter().zip(unit.rows_mut()) {
                let n = norm(row);
                total -= beta * n;
                if n > 0.0 {
                    unit_row.scaled_add(1.0 / n, &row);
                }
            }
            directions.push(unit);
        }
        let hv = self
            .oracle
            .hvp(&candidate.views(), &directions, self.target, self.aux);
        for (out, hv_t) in grads_out.iter_mut().zip(&hv) {
            out.scaled_add(-beta, hv_t);
        }

        if use_endpoints_matching {
            total += self.endpoint_term(candidate, reference, Some(&mut grads_out));
        }
        (total, grads_out)
    }

    /// Deviation penalty over the first and last `edge` steps, optionally
    /// accumulating its gradient
    fn endpoint_term(
        &self,
        candidate: &PathState,
        reference: &PathState,
        mut grads_out: Option<&mut Vec<Array2<f32>>>,
    ) -> f32 {
        let n_steps = candidate.n_steps();
        let batch = candidate.batch();
        let edge = self.edge_steps(n_steps);
        let mut total = 0.0;

        for (t, (c, r)) in candidate
            .tensors()
            .iter()
            .zip(reference.tensors())
            .enumerate()
        {
            for s in (0..edge).chain(n_steps.saturating_sub(edge)..n_steps) {
                for b in 0..batch {
                    let row = s * batch + b;
                    let diff = &c.row(row) - &r.row(row);
                    let n = norm(diff.view());
                    total += self.endpoint_weight * n;
                    if n > 0.0 {
                        if let Some(out) = grads_out.as_deref_mut() {
                            out[t].row_mut(row).scaled_add(self.endpoint_weight / n, &diff);
                        }
                    }
                }
            }
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{LinearOracle, QuadraticOracle};
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn path_1d(points: &[f32], n_steps: usize) -> PathState {
        let tensor = Array2::from_shape_vec((points.len(), 1), points.to_vec()).unwrap();
        PathState::new(vec![tensor], n_steps).unwrap()
    }

    #[test]
    fn test_zero_deviation_zero_distance_term() {
        let oracle = LinearOracle::identity(1);
        let energy = PotentialEnergy::new(&oracle, None, None, 100.0, 0.1);
        let reference = path_1d(&[0.0, 1.0, 2.0, 3.0], 4);

        // Identity oracle has unit gradient at every row
        let value = energy.value(&reference, &reference, 0.5, false);
        assert_abs_diff_eq!(value, -0.5 * 4.0, epsilon = 1e-5);
    }

    #[test]
    fn test_distance_term() {
        let oracle = LinearOracle::identity(1);
        let energy = PotentialEnergy::new(&oracle, None, None, 100.0, 0.1);
        let reference = path_1d(&[0.0, 1.0, 2.0, 3.0], 4);
        let candidate = path_1d(&[0.5, 1.5, 2.0, 3.0], 4);

        // Two rows deviate by 0.5; beta 0 isolates the distance term
        let value = energy.value(&candidate, &reference, 0.0, false);
        assert_abs_diff_eq!(value, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_endpoint_term_weights_edges() {
        let oracle = LinearOracle::identity(1);
        let energy = PotentialEnergy::new(&oracle, None, None, 100.0, 0.1);
        let reference = path_1d(&[0.0; 10], 10);
        // Deviate only at the first point
        let mut points = [0.0; 10];
        points[0] = 0.1;
        let candidate = path_1d(&points, 10);

        let plain = energy.value(&candidate, &reference, 0.0, false);
        let matched = energy.value(&candidate, &reference, 0.0, true);
        // edge = max(1, floor(0.1*10)) = 1, so the endpoint term re-counts
        // the first-point deviation at weight 100
        assert_abs_diff_eq!(plain, 0.1, epsilon = 1e-5);
        assert_abs_diff_eq!(matched, 0.1 + 100.0 * 0.1, epsilon = 1e-4);
    }

    #[test]
    fn test_energy_finite_and_possibly_negative() {
        let oracle = QuadraticOracle::new(3.0);
        let energy = PotentialEnergy::new(&oracle, None, None, 100.0, 0.1);
        let reference = path_1d(&[1.0, 2.0, 3.0, 4.0], 4);

        let value = energy.value(&reference, &reference, 10.0, false);
        assert!(value.is_finite());
        assert!(value < 0.0, "large beta should push energy negative: {value}");
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let oracle = QuadraticOracle::new(0.7);
        let energy = PotentialEnergy::new(&oracle, None, None, 10.0, 0.25);
        let reference = path_1d(&[0.5, 1.0, 2.0, 3.5], 4);
        let candidate = path_1d(&[0.8, 1.4, 1.7, 3.9], 4);

        for use_endpoints in [false, true] {
            let (_, grads) =
                energy.value_and_grad(&candidate, &reference, 0.3, use_endpoints);

            for row in 0..4 {
                let h = 1e-2;
                let mut plus = candidate.clone().into_tensors();
                plus[0][[row, 0]] += h;
                let mut minus = candidate.clone().into_tensors();
                minus[0][[row, 0]] -= h;
                let e_plus = energy.value(
                    &PathState::new(plus, 4).unwrap(),
                    &reference,
                    0.3,
                    use_endpoints,
                );
                let e_minus = energy.value(
                    &PathState::new(minus, 4).unwrap(),
                    &reference,
                    0.3,
                    use_endpoints,
                );
                let numeric = (e_plus - e_minus) / (2.0 * h);
                assert_abs_diff_eq!(grads[0][[row, 0]], numeric, epsilon = 0.05);
            }
        }
    }

    #[test]
    fn test_multi_tensor_tuple() {
        let oracle = LinearOracle::new(vec![
            ndarray::Array1::from(vec![1.0]),
            ndarray::Array1::from(vec![2.0]),
        ]);
        let energy = PotentialEnergy::new(&oracle, None, None, 100.0, 0.1);
        let a = arr2(&[[0.0], [1.0]]);
        let b = arr2(&[[5.0], [6.0]]);
        let reference = PathState::new(vec![a, b], 2).unwrap();

        // Gradient norms: 1 per row for part 0, 2 per row for part 1
        let value = energy.value(&reference, &reference, 1.0, false);
        assert_abs_diff_eq!(value, -(2.0 * 1.0 + 2.0 * 2.0), epsilon = 1e-5);
    }
}
