//! Differentiable-oracle contract
//!
//! The oracle is the model being attributed. It evaluates a batch of path
//! points (one scalar output per row) and exposes first- and second-order
//! derivative passes. The second-order pass is what lets the curvature
//! penalty's own gradient flow back into path optimization: the energy
//! differentiates the norm of the oracle's gradient, which needs a
//! Hessian-vector product.
//!
//! Oracles with exact second derivatives should override [`Oracle::hvp`];
//! the default is a central difference of the exact gradient, which is
//! sufficient for optimization but pays two extra gradient evaluations.

use ndarray::{Array1, Array2, ArrayView2};

/// Auxiliary forward arguments, one row per evaluated path row
pub type AuxArgs = Array2<f32>;

/// A differentiable scalar-per-row function of one or more input tensors
///
/// `parts` carries one tensor per input-tuple member; all parts share the
/// same row count and row `r` of every part belongs to the same evaluation.
/// `target` selects an output index for multi-output models.
pub trait Oracle {
    /// Scalar output for each row
    fn forward(
        &self,
        parts: &[ArrayView2<f32>],
        target: Option<usize>,
        aux: Option<&AuxArgs>,
    ) -> Array1<f32>;

    /// Gradient of each row's output with respect to that row of every part
    fn gradient(
        &self,
        parts: &[ArrayView2<f32>],
        target: Option<usize>,
        aux: Option<&AuxArgs>,
    ) -> Vec<Array2<f32>>;

    /// Hessian-vector product: directional derivative of [`Oracle::gradient`]
    /// along `v`
    ///
    /// The default is a symmetric difference of the exact gradient with the
    /// step scaled to the data's magnitude.
    fn hvp(
        &self,
        parts: &[ArrayView2<f32>],
        v: &[Array2<f32>],
        target: Option<usize>,
        aux: Option<&AuxArgs>,
    ) -> Vec<Array2<f32>> {
        let mut max_abs = 0.0f32;
        for part in parts {
            for &x in part.iter() {
                max_abs = max_abs.max(x.abs());
            }
        }
        let h = f32::EPSILON.cbrt() * (1.0 + max_abs);

        let plus: Vec<Array2<f32>> = parts
            .iter()
            .zip(v)
            .map(|(p, d)| p.to_owned() + &(d * h))
            .collect();
        let minus: Vec<Array2<f32>> = parts
            .iter()
            .zip(v)
            .map(|(p, d)| p.to_owned() - &(d * h))
            .collect();

        let grad_plus = self.gradient(&views(&plus), target, aux);
        let grad_minus = self.gradient(&views(&minus), target, aux);
        grad_plus
            .into_iter()
            .zip(grad_minus)
            .map(|(gp, gm)| (gp - gm) / (2.0 * h))
            .collect()
    }
}

/// Borrow a slice of owned tensors as views
pub(crate) fn views(tensors: &[Array2<f32>]) -> Vec<ArrayView2<f32>> {
    tensors.iter().map(|t| t.view()).collect()
}

/// Linear reference oracle: `f(x) = sum_t x_t . w_t`
///
/// Constant gradient, zero Hessian. The single-feature unit-weight case is
/// the identity map, handy for completeness checks.
#[derive(Debug, Clone)]
pub struct LinearOracle {
    weights: Vec<Array1<f32>>,
}

impl LinearOracle {
    /// Create a linear oracle with one weight vector per input part
    pub fn new(weights: Vec<Array1<f32>>) -> Self {
        Self { weights }
    }

    /// Identity oracle over a single part with `n_features` unit weights
    pub fn identity(n_features: usize) -> Self {
        Self {
            weights: vec![Array1::ones(n_features)],
        }
    }
}

impl Oracle for LinearOracle {
    fn forward(
        &self,
        parts: &[ArrayView2<f32>],
        _target: Option<usize>,
        _aux: Option<&AuxArgs>,
    ) -> Array1<f32> {
        let rows = parts[0].nrows();
        let mut out = Array1::zeros(rows);
        for (part, w) in parts.iter().zip(&self.weights) {
            out += &part.dot(w);
        }
        out
    }

    fn gradient(
        &self,
        parts: &[ArrayView2<f32>],
        _target: Option<usize>,
        _aux: Option<&AuxArgs>,
    ) -> Vec<Array2<f32>> {
        parts
            .iter()
            .zip(&self.weights)
            .map(|(part, w)| {
                let mut g = Array2::zeros(part.raw_dim());
                for mut row in g.rows_mut() {
                    row.assign(w);
                }
                g
            })
            .collect()
    }

    fn hvp(
        &self,
        parts: &[ArrayView2<f32>],
        _v: &[Array2<f32>],
        _target: Option<usize>,
        _aux: Option<&AuxArgs>,
    ) -> Vec<Array2<f32>> {
        parts.iter().map(|p| Array2::zeros(p.raw_dim())).collect()
    }
}

/// Quadratic reference oracle: `f(x) = a * sum x^2` over all parts
///
/// Gradient `2ax`, exact Hessian-vector product `2av`.
#[derive(Debug, Clone)]
pub struct QuadraticOracle {
    coefficient: f32,
}

impl QuadraticOracle {
    /// Create a quadratic oracle with the given coefficient
    pub fn new(coefficient: f32) -> Self {
        Self { coefficient }
    }
}

impl Oracle for QuadraticOracle {
    fn forward(
        &self,
        parts: &[ArrayView2<f32>],
        _target: Option<usize>,
        _aux: Option<&AuxArgs>,
    ) -> Array1<f32> {
        let rows = parts[0].nrows();
        let mut out = Array1::zeros(rows);
        for part in parts {
            for (r, row) in part.rows().into_iter().enumerate() {
                out[r] += self.coefficient * row.dot(&row);
            }
        }
        out
    }

    fn gradient(
        &self,
        parts: &[ArrayView2<f32>],
        _target: Option<usize>,
        _aux: Option<&AuxArgs>,
    ) -> Vec<Array2<f32>> {
        parts
            .iter()
            .map(|part| part.to_owned() * (2.0 * self.coefficient))
            .collect()
    }

    fn hvp(
        &self,
        _parts: &[ArrayView2<f32>],
        v: &[Array2<f32>],
        _target: Option<usize>,
        _aux: Option<&AuxArgs>,
    ) -> Vec<Array2<f32>> {
        v.iter().map(|d| d * (2.0 * self.coefficient)).collect()
    }
}
