//! Gradient optimizers for variational parameters

mod adam;

pub use adam::Adam;

use ndarray::Array2;

/// Trait for optimization algorithms over explicit-gradient parameters
pub trait Optimizer {
    /// Perform a single optimization step
    ///
    /// `grads` is parallel to `params`; both slices share order and shapes.
    fn step(&mut self, params: &mut [Array2<f32>], grads: &[Array2<f32>]);

    /// Get learning rate
    fn lr(&self) -> f32;

    /// Set learning rate
    fn set_lr(&mut self, lr: f32);
}
