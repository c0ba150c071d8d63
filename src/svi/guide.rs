//! Variational family over path perturbations

use crate::energy::PotentialEnergy;
use crate::path::PathState;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

/// Initial value of every scale parameter
const INIT_SCALE: f32 = 0.1;

/// Learnable Gaussian perturbation family, one location/scale pair per
/// path element
///
/// The generative model draws standard-normal perturbations around the
/// reference path and weights candidates by `exp(-energy)`; the guide
/// approximates the resulting low-energy path distribution with independent
/// Gaussians, sampled through the reparameterization trick so gradients
/// flow to the parameters. The deterministic point estimate ignores the
/// noise: it is `reference + loc`.
///
/// Parameters are stored interleaved `[loc_0, scale_0, loc_1, scale_1, ..]`
/// so the optimizer can step them as one slice. Scales stay strictly
/// positive: a floor is re-applied after every optimizer step.
pub struct PathGuide {
    params: Vec<Array2<f32>>,
    n_tensors: usize,
    rng: StdRng,
    scale_floor: f32,
}

impl PathGuide {
    /// Initialize the family around a reference path
    pub fn new(reference: &PathState, seed: u64, scale_floor: f32) -> Self {
        let mut params = Vec::with_capacity(reference.tensors().len() * 2);
        for tensor in reference.tensors() {
            params.push(Array2::zeros(tensor.raw_dim()));
            params.push(Array2::from_elem(tensor.raw_dim(), INIT_SCALE));
        }
        Self {
            n_tensors: reference.tensors().len(),
            params,
            rng: StdRng::seed_from_u64(seed),
            scale_floor,
        }
    }

    /// Location parameters of one path tensor
    pub fn loc(&self, index: usize) -> &Array2<f32> {
        &self.params[2 * index]
    }

    /// Scale parameters of one path tensor
    pub fn scale(&self, index: usize) -> &Array2<f32> {
        &self.params[2 * index + 1]
    }

    /// All parameters, interleaved, for the optimizer
    pub fn params_mut(&mut self) -> &mut [Array2<f32>] {
        &mut self.params
    }

    /// Re-apply the positivity floor to every scale tensor
    pub fn clamp_scales(&mut self) {
        let floor = self.scale_floor;
        for t in 0..self.n_tensors {
            self.params[2 * t + 1].mapv_inplace(|s| s.max(floor));
        }
    }

    /// One reparameterized sample: negative-ELBO estimate and its gradients
    ///
    /// Draws `z = loc + scale * eps`, scores `reference + z` with the energy
    /// and accumulates the Gaussian prior/entropy terms:
    /// `loss = energy + sum(0.5 z^2 - ln scale - 0.5 eps^2)`.
    /// Returned gradients are interleaved to match [`Self::params_mut`]:
    /// `d/dloc = dE/dx + z`, `d/dscale = (dE/dx + z) * eps - 1/scale`.
    pub fn sample_step(
        &mut self,
        reference: &PathState,
        energy: &PotentialEnergy<'_>,
        beta: f32,
        use_endpoints_matching: bool,
    ) -> (f32, Vec<Array2<f32>>) {
        let mut eps_all = Vec::with_capacity(self.n_tensors);
        let mut z_all = Vec::with_capacity(self.n_tensors);
        let mut candidate_tensors = Vec::with_capacity(self.n_tensors);

        for t in 0..self.n_tensors {
            let shape = reference.tensor(t).raw_dim();
            let rng = &mut self.rng;
            let eps = Array2::from_shape_simple_fn(shape, || rng.sample::<f32, _>(StandardNormal));
            let z = self.loc(t) + &(self.scale(t) * &eps);
            candidate_tensors.push(reference.tensor(t) + &z);
            eps_all.push(eps);
            z_all.push(z);
        }
        let candidate = PathState::new(candidate_tensors, reference.n_steps())
            .expect("candidate shares the reference layout");

        let (energy_value, de) =
            energy.value_and_grad(&candidate, reference, beta, use_endpoints_matching);

        let mut loss = energy_value;
        let mut grads = Vec::with_capacity(self.n_tensors * 2);
        for t in 0..self.n_tensors {
            let z = &z_all[t];
            let eps = &eps_all[t];
            let scale = self.scale(t);

            loss += z.mapv(|v| 0.5 * v * v).sum() - scale.mapv(f32::ln).sum()
                - eps.mapv(|v| 0.5 * v * v).sum();

            let pathwise = &de[t] + z;
            let grad_scale = &pathwise * eps - scale.mapv(|s| 1.0 / s);
            grads.push(pathwise);
            grads.push(grad_scale);
        }
        (loss, grads)
    }

    /// Deterministic best-path estimate: `reference + loc`, no sampling
    pub fn point_estimate(&self, reference: &PathState) -> PathState {
        let tensors = (0..self.n_tensors)
            .map(|t| reference.tensor(t) + self.loc(t))
            .collect();
        PathState::new(tensors, reference.n_steps())
            .expect("point estimate shares the reference layout")
    }
}
