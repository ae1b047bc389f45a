//! Error types for the apex-qp library
//!
//! This module provides the main error and result types used throughout the
//! library. All errors use the `thiserror` crate for automatic trait
//! implementations.
//!
//! # Error Hierarchy
//!
//! The library uses a hierarchical error system where:
//! - **`ApexQpError`** is the top-level error exposed to users via public APIs
//! - **Module errors** (`CoreError`, `FactorError`, `LinAlgError`,
//!   `SolverError`) are wrapped inside ApexQpError
//! - **Error sources** are preserved, allowing full error chain inspection
//!
//! Example error chain:
//! ```text
//! ApexQpError::Solver(
//!     SolverError::LinAlg(
//!         LinAlgError::IndeterminateSystem
//!     )
//! )
//! ```

use std::error::Error as StdError;

use thiserror::Error;

use crate::{core::CoreError, factors::FactorError, linalg::LinAlgError, solver::SolverError};

/// Main result type used throughout the apex-qp library
pub type ApexQpResult<T> = Result<T, ApexQpError>;

/// Main error type for the apex-qp library
///
/// This is the top-level error type exposed by public APIs. It wraps
/// module-specific errors while preserving the full error chain for
/// debugging.
///
/// # Error Chain Access
///
/// You can access the full error chain using the `chain()` method:
///
/// ```rust,ignore
/// if let Err(e) = solver.optimize(&x0) {
///     warn!("Error: {}", e);
///     warn!("Full chain: {}", e.chain());
/// }
/// ```
#[derive(Debug, Error)]
pub enum ApexQpError {
    /// Core module errors (problem construction, variable containers)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Factor construction errors
    #[error(transparent)]
    Factor(#[from] FactorError),

    /// Linear algebra errors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// Active-set solver errors
    #[error(transparent)]
    Solver(#[from] SolverError),
}

// Module-specific errors are automatically converted via #[from] attributes
// above

impl ApexQpError {
    /// Get the full error chain as a string for logging and debugging.
    ///
    /// Traverses the error source chain and returns a formatted string
    /// showing the hierarchy from the top-level ApexQpError down to the root
    /// cause.
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Get a compact single-line error chain for logging
    ///
    /// Similar to `chain()` but formats as a single line with arrow
    /// separators.
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
