//! Crate error types

use thiserror::Error;

/// Errors raised by the attribution pipeline
///
/// Only configuration and shape problems are errors; numerical degeneracies
/// are absorbed where they occur and optimizer non-convergence is reported
/// through [`crate::svi::RunReport`], never as an error.
#[derive(Debug, Error)]
pub enum AttributionError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// Result type for attribution operations
pub type Result<T> = std::result::Result<T, AttributionError>;
