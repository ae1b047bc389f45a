//! Core data model for factor-graph quadratic programs
//!
//! This module contains the building blocks shared by every stage of the
//! solver:
//! - Vector-valued variable assignments ([`values::VectorValues`])
//! - The reverse variable-to-factor index ([`variable_index::VariableIndex`])
//! - The immutable problem definition ([`problem::Qp`])

pub mod problem;
pub mod values;
pub mod variable_index;

use thiserror::Error;
use tracing::error;

/// Core module error types for problem construction and variable containers
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Dimension mismatch between variables, factors, or containers
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Variable lookup or registration error
    #[error("Variable error: {0}")]
    Variable(String),

    /// Invalid input parameter or problem configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| CoreError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error with the original source error from a third-party library
    ///
    /// # Arguments
    /// * `source_error` - The original error (must implement Debug)
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;
