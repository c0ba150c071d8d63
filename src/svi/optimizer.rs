//! Convergence-controlled optimization loop

use crate::config::GeodesicConfig;
use crate::energy::PotentialEnergy;
use crate::optim::{Adam, Optimizer};
use crate::path::PathState;
use crate::svi::PathGuide;
use serde::{Deserialize, Serialize};

/// Terminal condition of an optimization run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Loop still in progress (never reported)
    Running,
    /// Early-stopped on a loss plateau
    Converged,
    /// Iteration cap reached; a normal outcome, not an error
    Exhausted,
}

/// Outcome metadata of an optimization run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Terminal state
    pub state: RunState,
    /// Iterations actually executed
    pub iterations: usize,
    /// Loss at the last executed iteration, if any ran
    pub final_loss: Option<f32>,
    /// Best loss observed, if any iteration could be compared
    pub best_loss: Option<f32>,
    /// Learning rate at termination
    pub learning_rate: f32,
}

/// Per-run knobs taken from the attribution request
#[derive(Debug, Clone, Copy)]
pub struct OptimizeParams {
    /// Starting curvature weight
    pub beta: f32,
    /// Multiplicative beta decay per iteration
    pub beta_decay: f32,
    /// Iteration cap
    pub num_iterations: usize,
    /// Initial learning rate
    pub learning_rate: f32,
    /// Whether the endpoint-matching penalty is active
    pub use_endpoints_matching: bool,
}

/// Plateau bookkeeping: best loss plus the two no-improvement counters
///
/// Both counters reset when the best loss improves; the learning-rate
/// counter additionally resets when a decay is applied.
struct PlateauController {
    best_loss: f32,
    patience_counter: usize,
    lr_counter: usize,
}

impl PlateauController {
    fn new() -> Self {
        Self {
            best_loss: f32::INFINITY,
            patience_counter: 0,
            lr_counter: 0,
        }
    }

    fn observe(&mut self, loss: f32) {
        if loss < self.best_loss {
            self.best_loss = loss;
            self.patience_counter = 0;
            self.lr_counter = 0;
        } else {
            self.patience_counter += 1;
            self.lr_counter += 1;
        }
    }

    fn lr_decay_due(&self, patience: usize) -> bool {
        self.lr_counter >= patience.max(1)
    }

    fn reset_lr_counter(&mut self) {
        self.lr_counter = 0;
    }

    fn stop_due(&self, patience: usize) -> bool {
        self.patience_counter >= patience
    }
}

/// Drives the guide toward a low-energy path
///
/// Strictly sequential: each iteration depends only on the parameter state
/// left by the previous one. The guide's parameters are owned by the caller
/// but mutated exclusively through this loop.
pub struct PathOptimizer<'a> {
    energy: PotentialEnergy<'a>,
    config: &'a GeodesicConfig,
}

impl<'a> PathOptimizer<'a> {
    /// Create an optimizer over one energy context
    pub fn new(energy: PotentialEnergy<'a>, config: &'a GeodesicConfig) -> Self {
        Self { energy, config }
    }

    /// Run the loop to a terminal state and extract the point estimate
    ///
    /// Per iteration: one reparameterized sample and Adam step, beta decay,
    /// plateau bookkeeping, optional learning-rate halving (floored, with a
    /// fresh optimizer state), and the relative-improvement early-stop
    /// check. Reaching the iteration cap is reported as
    /// [`RunState::Exhausted`], never raised.
    pub fn run(
        &self,
        reference: &PathState,
        guide: &mut PathGuide,
        params: &OptimizeParams,
    ) -> (PathState, RunReport) {
        let mut lr = params.learning_rate;
        let mut adam = Adam::default_params(lr);
        let mut controller = PlateauController::new();
        let mut history: Vec<f32> = Vec::new();
        let mut beta = params.beta;
        let mut state = RunState::Exhausted;
        let mut iterations = 0;

        for step in 0..params.num_iterations {
            let (loss, grads) = guide.sample_step(
                reference,
                &self.energy,
                beta,
                params.use_endpoints_matching,
            );
            adam.step(guide.params_mut(), &grads);
            guide.clamp_scales();

            history.push(loss);
            beta *= params.beta_decay;
            iterations = step + 1;

            if history.len() > 1 {
                let prev = history[history.len() - 2];
                let rel_improvement = (prev - loss) / prev;
                controller.observe(loss);

                if controller.lr_decay_due(self.config.lr_patience) && lr > self.config.min_lr {
                    lr = (lr * self.config.lr_decay_factor).max(self.config.min_lr);
                    adam = Adam::default_params(lr);
                    controller.reset_lr_counter();
                    println!("decreasing learning rate to {lr:.6}");
                }

                if rel_improvement < self.config.rel_improvement_threshold
                    && controller.stop_due(self.config.patience)
                {
                    println!(
                        "early stopping at step {step}: loss converged with relative improvement {rel_improvement:.6}"
                    );
                    state = RunState::Converged;
                    break;
                }
            }

            if step % self.config.log_interval == 0 {
                println!("step {step}: loss = {loss:.3}, beta = {beta:.3}, lr = {lr:.6}");
            }
        }

        let final_loss = history.last().copied();
        let best_loss = controller
            .best_loss
            .is_finite()
            .then_some(controller.best_loss);
        let report = RunReport {
            state,
            iterations,
            final_loss,
            best_loss,
            learning_rate: lr,
        };
        (guide.point_estimate(reference), report)
    }
}
