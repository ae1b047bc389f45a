pub mod kkt;

use thiserror::Error;
use tracing::error;

use crate::core::values::VectorValues;
use crate::factors::GaussianFactorGraph;

/// Linear algebra specific error types
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed (Cholesky, LU, etc.)
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),

    /// The assembled system is rank-deficient or produced a non-finite
    /// solution
    #[error("Indeterminate system: the factor graph does not determine a unique solution")]
    IndeterminateSystem,

    /// Failed to create sparse matrix from triplets
    #[error("Failed to create sparse matrix: {0}")]
    SparseMatrixCreation(String),

    /// Matrix format conversion failed
    #[error("Matrix conversion failed: {0}")]
    MatrixConversion(String),

    /// Variable dimensions disagree across factors in the same graph
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| LinAlgError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party library
    ///
    /// # Arguments
    /// * `source_error` - The original error from the third-party library (must implement Debug)
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Backend contract: eliminate a Gaussian factor graph to a variable
/// assignment.
///
/// Given a graph of quadratic cost factors and linear rows, some carrying a
/// constrained noise model marking hard equalities, the solver returns the
/// assignment minimizing the summed objective subject to every hard row
/// holding exactly. A graph that does not determine a unique assignment is an
/// [`LinAlgError::IndeterminateSystem`].
pub trait GaussianGraphSolver {
    fn solve(&self, graph: &GaussianFactorGraph) -> LinAlgResult<VectorValues>;
}

pub use kkt::SparseKktSolver;
