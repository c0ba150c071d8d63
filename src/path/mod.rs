//! Batched multi-step paths between baselines and inputs

mod resample;
mod state;

pub use resample::redistribute;
pub use state::PathState;
