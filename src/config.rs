//! Pipeline configuration

use serde::{Deserialize, Serialize};

/// Construction-time configuration for [`crate::GeodesicIgSvi`]
///
/// Collects everything that is fixed for the lifetime of the attributor:
/// RNG seeding, the completeness-axiom multiply convention, the endpoint
/// penalty shape, and the optimizer's plateau/decay behavior. Per-call knobs
/// (step count, iteration cap, learning rate, beta) live on
/// [`crate::geodesic::AttributeRequest`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeodesicConfig {
    /// Seed for the reparameterized sampler
    pub seed: u64,
    /// Multiply summed gradients by (input - baseline)
    pub multiply_by_inputs: bool,
    /// Weight of the endpoint-matching penalty
    pub endpoint_weight: f32,
    /// Fraction of steps at each end of the path covered by endpoint matching
    pub edge_fraction: f32,
    /// Learning rate floor for plateau decay
    pub min_lr: f32,
    /// Multiplicative factor applied to the learning rate on plateau
    pub lr_decay_factor: f32,
    /// Iterations without improvement before the learning rate decays
    pub lr_patience: usize,
    /// Iterations without improvement before early stopping is considered
    pub patience: usize,
    /// Relative loss improvement below which the run counts as converged
    pub rel_improvement_threshold: f32,
    /// Start-of-run multiplier on beta when an approximate initial path is used
    pub beta_boost: f32,
    /// Fraction of the starting beta the schedule reaches by the final iteration
    pub beta_target_ratio: f32,
    /// Strictly positive floor re-applied to the guide's scale parameters
    pub scale_floor: f32,
    /// Print a progress line every this many iterations
    pub log_interval: usize,
}

impl Default for GeodesicConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            multiply_by_inputs: true,
            endpoint_weight: 100.0,
            edge_fraction: 0.1,
            min_lr: 1e-5,
            lr_decay_factor: 0.5,
            lr_patience: 25,
            patience: 4000,
            rel_improvement_threshold: 1e-4,
            beta_boost: 10.0,
            beta_target_ratio: 0.1,
            scale_floor: 1e-6,
            log_interval: 100,
        }
    }
}

impl GeodesicConfig {
    /// Create a config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampler seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set whether attributions are multiplied by (input - baseline)
    pub fn with_multiply_by_inputs(mut self, multiply: bool) -> Self {
        self.multiply_by_inputs = multiply;
        self
    }

    /// Set the endpoint penalty weight
    pub fn with_endpoint_weight(mut self, weight: f32) -> Self {
        self.endpoint_weight = weight;
        self
    }

    /// Set the endpoint edge fraction
    pub fn with_edge_fraction(mut self, fraction: f32) -> Self {
        self.edge_fraction = fraction;
        self
    }

    /// Set the learning rate floor
    pub fn with_min_lr(mut self, min_lr: f32) -> Self {
        self.min_lr = min_lr;
        self
    }

    /// Set the plateau patience for learning rate decay
    pub fn with_lr_patience(mut self, patience: usize) -> Self {
        self.lr_patience = patience;
        self
    }

    /// Set the early-stopping patience
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Set the relative improvement threshold for early stopping
    pub fn with_rel_improvement_threshold(mut self, threshold: f32) -> Self {
        self.rel_improvement_threshold = threshold;
        self
    }

    /// Set the progress log interval
    pub fn with_log_interval(mut self, interval: usize) -> Self {
        self.log_interval = interval.max(1);
        self
    }
}
