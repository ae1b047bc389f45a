//! Factor types for quadratic programs expressed as factor graphs.
//!
//! A quadratic program is presented to the solver as three graphs of small
//! factors, each relating a handful of variables:
//!
//! - [`HessianFactor`]: a quadratic cost term ½·xᵀGx − gᵀx scoped to an
//!   ordered tuple of variables
//! - [`EqualityFactor`]: a hard linear constraint A·x = b
//! - [`InequalityFactor`]: a single linear row aᵀx ≤ b with an activity flag
//!
//! Constraint factors carry a *dual key*: the symbolic name of their Lagrange
//! multiplier. The dual key is what links a constraint to its row in the dual
//! graph when multipliers are recovered from KKT stationarity.
//!
//! The generic Gaussian-graph row used by the inner linear solves lives in
//! [`jacobian_factor`]; it is a sealed two-variant world (Hessian or
//! Jacobian row), not an open hierarchy.
//!
//! Factors are immutable once constructed, with one exception: the `active`
//! flag on [`InequalityFactor`], toggled only by the solver driver between
//! linear solves.

use thiserror::Error;
use tracing::error;

pub mod equality_factor;
pub mod graph;
pub mod hessian_factor;
pub mod inequality_factor;
pub mod jacobian_factor;

pub use equality_factor::EqualityFactor;
pub use graph::FactorGraph;
pub use hessian_factor::HessianFactor;
pub use inequality_factor::InequalityFactor;
pub use jacobian_factor::{GaussianFactor, GaussianFactorGraph, JacobianFactor, NoiseModel};

/// Factor-specific error types
#[derive(Debug, Clone, Error)]
pub enum FactorError {
    /// Dimension mismatch between expected and actual
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    /// Coefficient blocks are malformed (wrong count, asymmetric Hessian, ...)
    #[error("Invalid coefficients: {0}")]
    InvalidCoefficients(String),

    /// A key appears more than once in a factor's scope
    #[error("Duplicate key '{0}' in factor scope")]
    DuplicateKey(String),
}

impl FactorError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the original source error
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for factor operations
pub type FactorResult<T> = Result<T, FactorError>;

impl From<FactorError> for crate::core::CoreError {
    fn from(e: FactorError) -> Self {
        crate::core::CoreError::InvalidInput(e.to_string())
    }
}

/// Access to the ordered variable scope of a factor.
///
/// Implemented by every factor type so that graph-level machinery (the
/// variable index, dimension bookkeeping) can stay generic.
pub trait Keyed {
    /// Ordered variable names this factor references.
    fn keys(&self) -> &[String];

    /// Position of `key` in this factor's scope, if referenced.
    fn find(&self, key: &str) -> Option<usize> {
        self.keys().iter().position(|k| k == key)
    }
}

pub(crate) fn check_unique_keys(keys: &[String]) -> FactorResult<()> {
    for (i, key) in keys.iter().enumerate() {
        if keys[..i].contains(key) {
            return Err(FactorError::DuplicateKey(key.clone()).log());
        }
    }
    Ok(())
}
