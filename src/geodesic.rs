//! Public attribution entry point
//!
//! Wires the pipeline together: validate, build the initial path (straight
//! line or externally supplied approximation), optimize it against the
//! penalized energy, optionally redistribute its points by arc length, then
//! integrate oracle gradients along it.

use crate::batching::{chunk_ranges, concat_attributions, slice_examples};
use crate::config::GeodesicConfig;
use crate::energy::PotentialEnergy;
use crate::error::{AttributionError, Result};
use crate::integrate::Integrator;
use crate::oracle::{AuxArgs, Oracle};
use crate::path::{redistribute, PathState};
use crate::quadrature::Method;
use crate::svi::{OptimizeParams, PathGuide, PathOptimizer, RunReport};
use ndarray::{Array1, Array2};

/// Supplier of approximate initial paths built from an augmentation dataset
///
/// The search itself (typically nearest-neighbor chaining through the
/// augmentation data) lives outside this crate; implementations return path
/// tensors in the standard `(n_steps * batch, features)` row layout.
pub trait ApproxPathBuilder {
    /// Build one path tensor per input tensor
    fn build(
        &self,
        inputs: &[Array2<f32>],
        baselines: &[Array2<f32>],
        augmentation: &Array2<f32>,
        alphas: &[f32],
        n_neighbors: usize,
    ) -> Result<Vec<Array2<f32>>>;
}

/// Per-call attribution parameters
#[derive(Debug, Clone)]
pub struct AttributeRequest<'r> {
    /// Number of path points per example
    pub n_steps: usize,
    /// Quadrature rule laying out the straight-line path
    pub method: Method,
    /// Output index for multi-output oracles
    pub target: Option<usize>,
    /// Auxiliary oracle arguments, one row per example
    pub aux: Option<&'r AuxArgs>,
    /// Augmentation dataset for approximate initial paths
    pub augmentation_data: Option<&'r Array2<f32>>,
    /// Neighbor count for the approximate path builder
    pub n_neighbors: Option<usize>,
    /// Split the example axis into sub-batches of this size
    pub internal_batch_size: Option<usize>,
    /// Curvature weight
    pub beta: f32,
    /// Optimization iteration cap
    pub num_iterations: usize,
    /// Initial learning rate
    pub learning_rate: f32,
    /// Penalize deviation from the initial path near both endpoints
    pub use_endpoints_matching: bool,
    /// Redistribute optimized points by arc length before integrating
    pub do_linear_interp: bool,
    /// Also return the completeness diagnostic
    pub return_convergence_delta: bool,
    /// Also return the optimized path
    pub return_paths: bool,
}

impl Default for AttributeRequest<'_> {
    fn default() -> Self {
        Self {
            n_steps: 50,
            method: Method::GaussLegendre,
            target: None,
            aux: None,
            augmentation_data: None,
            n_neighbors: None,
            internal_batch_size: None,
            beta: 0.3,
            num_iterations: 1000,
            learning_rate: 1e-3,
            use_endpoints_matching: true,
            do_linear_interp: true,
            return_convergence_delta: false,
            return_paths: false,
        }
    }
}

/// Attribution results plus optional extras
#[derive(Debug, Clone)]
pub struct AttributionOutput {
    /// One attribution tensor per input tensor, shaped like the inputs
    pub attributions: Vec<Array2<f32>>,
    /// Final optimized path, when requested and not sub-batched
    pub paths: Option<PathState>,
    /// Per-example completeness gap, when requested
    pub convergence_delta: Option<Array1<f32>>,
    /// One optimization report per pipeline run (one per sub-batch)
    pub reports: Vec<RunReport>,
}

/// Geodesic attribution over a differentiable oracle
///
/// Instead of integrating gradients along the straight line between
/// baseline and input, the path itself is optimized to avoid regions of
/// high gradient magnitude before the line integral is taken.
pub struct GeodesicIgSvi<'a> {
    oracle: &'a dyn Oracle,
    config: GeodesicConfig,
    path_builder: Option<Box<dyn ApproxPathBuilder + 'a>>,
}

impl<'a> GeodesicIgSvi<'a> {
    /// Create an attributor with default configuration
    pub fn new(oracle: &'a dyn Oracle) -> Self {
        Self::with_config(oracle, GeodesicConfig::default())
    }

    /// Create an attributor with an explicit configuration
    pub fn with_config(oracle: &'a dyn Oracle, config: GeodesicConfig) -> Self {
        Self {
            oracle,
            config,
            path_builder: None,
        }
    }

    /// Register a builder for augmentation-based initial paths
    pub fn with_path_builder(mut self, builder: Box<dyn ApproxPathBuilder + 'a>) -> Self {
        self.path_builder = Some(builder);
        self
    }

    /// The active configuration
    pub fn config(&self) -> &GeodesicConfig {
        &self.config
    }

    /// Compute attributions for a tuple of input tensors
    pub fn attribute(
        &self,
        inputs: &[Array2<f32>],
        baselines: &[Array2<f32>],
        request: &AttributeRequest<'_>,
    ) -> Result<AttributionOutput> {
        self.validate(inputs, baselines, request)?;

        let (attributions, paths, reports) = match request.internal_batch_size {
            Some(chunk_size) => {
                let total = inputs[0].nrows();
                let mut chunks = Vec::new();
                let mut reports = Vec::new();
                for (start, end) in chunk_ranges(total, chunk_size)? {
                    let chunk_inputs = slice_examples(inputs, start, end);
                    let chunk_baselines = slice_examples(baselines, start, end);
                    let chunk_aux = request
                        .aux
                        .map(|a| a.slice(ndarray::s![start..end, ..]).to_owned());
                    let (attribution, _, report) = self.attribute_single(
                        &chunk_inputs,
                        &chunk_baselines,
                        chunk_aux.as_ref(),
                        request,
                    )?;
                    chunks.push(attribution);
                    reports.push(report);
                }
                // Per-chunk paths are not stitched back together
                (concat_attributions(chunks)?, None, reports)
            }
            None => {
                let (attribution, path, report) =
                    self.attribute_single(inputs, baselines, request.aux, request)?;
                let paths = request.return_paths.then_some(path);
                (attribution, paths, vec![report])
            }
        };

        let convergence_delta = if request.return_convergence_delta {
            let integrator = Integrator::new(self.oracle, self.config.multiply_by_inputs);
            Some(integrator.convergence_delta(
                &attributions,
                inputs,
                baselines,
                request.target,
                request.aux,
            ))
        } else {
            None
        };

        Ok(AttributionOutput {
            attributions,
            paths,
            convergence_delta,
            reports,
        })
    }

    /// Fail fast on argument combinations and shapes, before any reshape
    fn validate(
        &self,
        inputs: &[Array2<f32>],
        baselines: &[Array2<f32>],
        request: &AttributeRequest<'_>,
    ) -> Result<()> {
        if request.augmentation_data.is_some() && request.n_neighbors.is_none() {
            return Err(AttributionError::Config(
                "augmentation data is provided but n_neighbors is not; please provide n_neighbors"
                    .to_string(),
            ));
        }
        if request.n_neighbors.is_some() && request.augmentation_data.is_none() {
            eprintln!("n_neighbors is provided but no augmentation data is given; ignoring n_neighbors");
        }
        if inputs.is_empty() {
            return Err(AttributionError::ShapeMismatch(
                "at least one input tensor is required".to_string(),
            ));
        }
        if inputs.len() != baselines.len() {
            return Err(AttributionError::ShapeMismatch(format!(
                "{} inputs vs {} baselines",
                inputs.len(),
                baselines.len()
            )));
        }
        let batch = inputs[0].nrows();
        for (t, (input, baseline)) in inputs.iter().zip(baselines).enumerate() {
            if input.raw_dim() != baseline.raw_dim() {
                return Err(AttributionError::ShapeMismatch(format!(
                    "input tensor {t} is {:?} but its baseline is {:?}",
                    input.shape(),
                    baseline.shape()
                )));
            }
            if input.nrows() != batch {
                return Err(AttributionError::ShapeMismatch(format!(
                    "input tensor {t} has {} examples, expected {batch}",
                    input.nrows()
                )));
            }
        }
        if let Some(aux) = request.aux {
            if aux.nrows() != batch {
                return Err(AttributionError::ShapeMismatch(format!(
                    "auxiliary arguments have {} rows, expected {batch}",
                    aux.nrows()
                )));
            }
        }
        if request.n_steps < 2 {
            return Err(AttributionError::Config(format!(
                "n_steps must be at least 2, got {}",
                request.n_steps
            )));
        }
        Ok(())
    }

    /// Full pipeline for one (sub-)batch
    fn attribute_single(
        &self,
        inputs: &[Array2<f32>],
        baselines: &[Array2<f32>],
        aux: Option<&AuxArgs>,
        request: &AttributeRequest<'_>,
    ) -> Result<(Vec<Array2<f32>>, PathState, RunReport)> {
        let (_rule_steps, alphas) = request.method.step_sizes_and_alphas(request.n_steps);

        let (initial, start_beta, beta_decay) = match request.augmentation_data {
            Some(augmentation) => {
                let n_neighbors = request.n_neighbors.ok_or_else(|| {
                    AttributionError::Config("n_neighbors is required".to_string())
                })?;
                let builder = self.path_builder.as_ref().ok_or_else(|| {
                    AttributionError::Config(
                        "augmentation data supplied but no approximate path builder is registered"
                            .to_string(),
                    )
                })?;
                let tensors =
                    builder.build(inputs, baselines, augmentation, &alphas, n_neighbors)?;
                let initial = PathState::new(tensors, request.n_steps)?;

                // Start the curvature weight high so optimization can leave
                // the approximate path early, then settle back geometrically
                let beta = if request.beta > 1.0 {
                    1.0 / request.beta
                } else {
                    request.beta
                };
                let start = beta * self.config.beta_boost;
                let decay = if request.num_iterations == 0 {
                    1.0
                } else {
                    self.config
                        .beta_target_ratio
                        .powf(1.0 / request.num_iterations as f32)
                };
                (initial, start, decay)
            }
            None => {
                let straight = PathState::straight_line(inputs, baselines, &alphas)?;
                (straight, request.beta, 1.0)
            }
        };

        let expanded_aux = aux.map(|a| expand_aux(a, request.n_steps));
        let energy = PotentialEnergy::new(
            self.oracle,
            request.target,
            expanded_aux.as_ref(),
            self.config.endpoint_weight,
            self.config.edge_fraction,
        );
        let optimizer = PathOptimizer::new(energy, &self.config);
        let mut guide = PathGuide::new(&initial, self.config.seed, self.config.scale_floor);

        let params = OptimizeParams {
            beta: start_beta,
            beta_decay,
            num_iterations: request.num_iterations,
            learning_rate: request.learning_rate,
            use_endpoints_matching: request.use_endpoints_matching,
        };
        let (optimized, report) = optimizer.run(&initial, &mut guide, &params);

        let final_path = if request.do_linear_interp {
            redistribute(&optimized)?
        } else {
            optimized
        };

        let integrator = Integrator::new(self.oracle, self.config.multiply_by_inputs);
        let attributions = integrator.attribute(
            &final_path,
            inputs,
            baselines,
            request.target,
            expanded_aux.as_ref(),
        );
        Ok((attributions, final_path, report))
    }
}

/// Repeat per-example auxiliary rows across the step axis
fn expand_aux(aux: &AuxArgs, n_steps: usize) -> AuxArgs {
    let batch = aux.nrows();
    let mut out = Array2::zeros((n_steps * batch, aux.ncols()));
    for s in 0..n_steps {
        for b in 0..batch {
            out.row_mut(s * batch + b).assign(&aux.row(b));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::LinearOracle;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn no_opt_request() -> AttributeRequest<'static> {
        AttributeRequest {
            n_steps: 50,
            method: Method::RiemannLeft,
            num_iterations: 0,
            ..AttributeRequest::default()
        }
    }

    #[test]
    fn test_completeness_on_straight_line() {
        // Identity oracle, no optimization: the line integral of a constant
        // unit gradient equals input - baseline.
        let oracle = LinearOracle::identity(1);
        let config = GeodesicConfig::default().with_multiply_by_inputs(false);
        let attributor = GeodesicIgSvi::with_config(&oracle, config);

        let inputs = [arr2(&[[5.0]])];
        let baselines = [arr2(&[[0.0]])];
        let request = AttributeRequest {
            beta: 0.0,
            return_convergence_delta: true,
            ..no_opt_request()
        };
        let output = attributor.attribute(&inputs, &baselines, &request).unwrap();

        assert_abs_diff_eq!(output.attributions[0][[0, 0]], 5.0, epsilon = 1e-3);
        assert_abs_diff_eq!(output.convergence_delta.unwrap()[0], 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_augmentation_without_neighbors_is_config_error() {
        let oracle = LinearOracle::identity(1);
        let attributor = GeodesicIgSvi::new(&oracle);
        let augmentation = arr2(&[[1.0], [2.0]]);

        let request = AttributeRequest {
            augmentation_data: Some(&augmentation),
            n_neighbors: None,
            ..no_opt_request()
        };
        let err = attributor
            .attribute(&[arr2(&[[5.0]])], &[arr2(&[[0.0]])], &request)
            .unwrap_err();
        assert!(matches!(err, AttributionError::Config(_)));
    }

    #[test]
    fn test_neighbors_without_augmentation_is_ignored() {
        let oracle = LinearOracle::identity(1);
        let attributor = GeodesicIgSvi::new(&oracle);

        let request = AttributeRequest {
            n_neighbors: Some(20),
            ..no_opt_request()
        };
        // Warns on stderr but succeeds
        let output = attributor
            .attribute(&[arr2(&[[5.0]])], &[arr2(&[[0.0]])], &request)
            .unwrap();
        assert_eq!(output.attributions.len(), 1);
    }

    #[test]
    fn test_augmentation_without_builder_is_config_error() {
        let oracle = LinearOracle::identity(1);
        let attributor = GeodesicIgSvi::new(&oracle);
        let augmentation = arr2(&[[1.0], [2.0]]);

        let request = AttributeRequest {
            augmentation_data: Some(&augmentation),
            n_neighbors: Some(2),
            ..no_opt_request()
        };
        let err = attributor
            .attribute(&[arr2(&[[5.0]])], &[arr2(&[[0.0]])], &request)
            .unwrap_err();
        assert!(matches!(err, AttributionError::Config(_)));
    }

    #[test]
    fn test_registered_builder_is_used() {
        // A builder that just returns the straight line
        struct StraightBuilder;
        impl ApproxPathBuilder for StraightBuilder {
            fn build(
                &self,
                inputs: &[Array2<f32>],
                baselines: &[Array2<f32>],
                _augmentation: &Array2<f32>,
                alphas: &[f32],
                _n_neighbors: usize,
            ) -> Result<Vec<Array2<f32>>> {
                Ok(PathState::straight_line(inputs, baselines, alphas)?.into_tensors())
            }
        }

        let oracle = LinearOracle::identity(1);
        let config = GeodesicConfig::default().with_multiply_by_inputs(false);
        let attributor =
            GeodesicIgSvi::with_config(&oracle, config).with_path_builder(Box::new(StraightBuilder));
        let augmentation = arr2(&[[1.0], [2.0]]);

        let request = AttributeRequest {
            augmentation_data: Some(&augmentation),
            n_neighbors: Some(2),
            beta: 0.0,
            ..no_opt_request()
        };
        let output = attributor
            .attribute(&[arr2(&[[5.0]])], &[arr2(&[[0.0]])], &request)
            .unwrap();
        assert_abs_diff_eq!(output.attributions[0][[0, 0]], 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_shape_mismatch_fails_fast() {
        let oracle = LinearOracle::identity(1);
        let attributor = GeodesicIgSvi::new(&oracle);

        let err = attributor
            .attribute(
                &[arr2(&[[5.0]])],
                &[arr2(&[[0.0, 0.0]])],
                &no_opt_request(),
            )
            .unwrap_err();
        assert!(matches!(err, AttributionError::ShapeMismatch(_)));

        let err = attributor
            .attribute(&[arr2(&[[5.0]])], &[], &no_opt_request())
            .unwrap_err();
        assert!(matches!(err, AttributionError::ShapeMismatch(_)));
    }

    #[test]
    fn test_too_few_steps_is_config_error() {
        let oracle = LinearOracle::identity(1);
        let attributor = GeodesicIgSvi::new(&oracle);
        let request = AttributeRequest {
            n_steps: 1,
            ..no_opt_request()
        };
        let err = attributor
            .attribute(&[arr2(&[[5.0]])], &[arr2(&[[0.0]])], &request)
            .unwrap_err();
        assert!(matches!(err, AttributionError::Config(_)));
    }

    #[test]
    fn test_return_paths_flag() {
        let oracle = LinearOracle::identity(1);
        let attributor = GeodesicIgSvi::new(&oracle);
        let inputs = [arr2(&[[5.0]])];
        let baselines = [arr2(&[[0.0]])];

        let request = AttributeRequest {
            return_paths: true,
            ..no_opt_request()
        };
        let output = attributor.attribute(&inputs, &baselines, &request).unwrap();
        let paths = output.paths.unwrap();
        assert_eq!(paths.n_steps(), 50);
        assert_eq!(paths.batch(), 1);

        let request = no_opt_request();
        let output = attributor.attribute(&inputs, &baselines, &request).unwrap();
        assert!(output.paths.is_none());
    }

    #[test]
    fn test_sub_batching_matches_single_run() {
        // With no optimization iterations the pipeline is deterministic, so
        // chunked and unchunked runs agree exactly.
        let oracle = LinearOracle::new(vec![ndarray::Array1::from(vec![1.0, 2.0])]);
        let config = GeodesicConfig::default().with_multiply_by_inputs(false);
        let attributor = GeodesicIgSvi::with_config(&oracle, config);

        let inputs = [arr2(&[[5.0, 1.0], [2.0, 2.0], [3.0, 0.0], [1.0, 4.0], [0.5, 0.5]])];
        let baselines = [Array2::zeros((5, 2))];

        let single = attributor
            .attribute(&inputs, &baselines, &no_opt_request())
            .unwrap();
        let request = AttributeRequest {
            internal_batch_size: Some(2),
            ..no_opt_request()
        };
        let chunked = attributor.attribute(&inputs, &baselines, &request).unwrap();

        assert_eq!(chunked.reports.len(), 3);
        assert!(chunked.paths.is_none());
        for (a, b) in single.attributions[0]
            .iter()
            .zip(chunked.attributions[0].iter())
        {
            assert_abs_diff_eq!(a, b, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_expand_aux_layout() {
        let aux = arr2(&[[1.0, 10.0], [2.0, 20.0]]);
        let expanded = expand_aux(&aux, 3);
        assert_eq!(expanded.nrows(), 6);
        // Row s*batch + b
        assert_abs_diff_eq!(expanded[[0, 0]], 1.0);
        assert_abs_diff_eq!(expanded[[1, 0]], 2.0);
        assert_abs_diff_eq!(expanded[[4, 1]], 10.0);
        assert_abs_diff_eq!(expanded[[5, 1]], 20.0);
    }
}
