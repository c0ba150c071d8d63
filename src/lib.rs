//! Geodesic feature attribution
//!
//! Generalizes straight-line integrated gradients to curved paths between a
//! baseline and an input. A penalized energy functional trades deviation
//! from the straight line against the magnitude of the oracle's output
//! gradient; a stochastic variational loop fits a Gaussian perturbation
//! family minimizing the expected energy; the optimized path is optionally
//! re-parameterized by arc length; and the attribution is the numerical
//! line integral of oracle gradients along the result.
//!
//! # Example
//!
//! ```
//! use atribuir::{AttributeRequest, GeodesicConfig, GeodesicIgSvi, LinearOracle, Method};
//! use ndarray::arr2;
//!
//! let oracle = LinearOracle::identity(1);
//! let config = GeodesicConfig::default().with_multiply_by_inputs(false);
//! let attributor = GeodesicIgSvi::with_config(&oracle, config);
//!
//! let request = AttributeRequest {
//!     method: Method::RiemannLeft,
//!     num_iterations: 0,
//!     beta: 0.0,
//!     ..AttributeRequest::default()
//! };
//! let output = attributor
//!     .attribute(&[arr2(&[[5.0]])], &[arr2(&[[0.0]])], &request)
//!     .unwrap();
//! assert!((output.attributions[0][[0, 0]] - 5.0).abs() < 1e-3);
//! ```

pub mod batching;
pub mod config;
pub mod energy;
pub mod error;
pub mod geodesic;
pub mod integrate;
pub mod optim;
pub mod oracle;
pub mod path;
pub mod quadrature;
pub mod svi;

pub use config::GeodesicConfig;
pub use error::{AttributionError, Result};
pub use geodesic::{ApproxPathBuilder, AttributeRequest, AttributionOutput, GeodesicIgSvi};
pub use integrate::Integrator;
pub use oracle::{AuxArgs, LinearOracle, Oracle, QuadraticOracle};
pub use path::{redistribute, PathState};
pub use quadrature::Method;
pub use svi::{OptimizeParams, PathGuide, PathOptimizer, RunReport, RunState};
