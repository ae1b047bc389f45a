//! Active-set solution of factor-graph quadratic programs.
//!
//! The solver interleaves three subsystems:
//! - an equality-constrained inner solve over the base graph plus the active
//!   inequalities (delegated to the [`linalg`](crate::linalg) backend),
//! - dual-graph construction and solving to recover Lagrange multipliers
//!   from KKT stationarity ([`dual`]),
//! - the textbook active-set loop with step-size computation and
//!   leaving-constraint selection ([`active_set`], [`step`]).
//!
//! See Nocedal & Wright (2006), *Numerical Optimization*, §16.5.

use thiserror::Error;
use tracing::error;

pub mod active_set;
pub mod dual;
pub mod step;

pub use active_set::QpSolver;

use crate::core::CoreError;
use crate::core::values::VectorValues;
use crate::factors::{FactorGraph, InequalityFactor};
use crate::linalg::LinAlgError;

/// Solver state at one iteration of the active-set loop.
///
/// `iterate` consumes a state and produces a fresh one; nothing aliases
/// across iterations except the immutable problem.
#[derive(Debug, Clone)]
pub struct QpState {
    /// Current primal point
    pub values: VectorValues,
    /// Current multiplier estimates, keyed by dual key
    pub duals: VectorValues,
    /// The inequality graph with activity flags set for this iteration
    pub working_set: FactorGraph<InequalityFactor>,
    /// Whether the KKT conditions held at this state
    pub converged: bool,
    /// Iterations performed so far
    pub iterations: u32,
}

impl QpState {
    pub fn new(
        values: VectorValues,
        duals: VectorValues,
        working_set: FactorGraph<InequalityFactor>,
        converged: bool,
        iterations: u32,
    ) -> Self {
        QpState {
            values,
            duals,
            working_set,
            converged,
            iterations,
        }
    }
}

/// Solver-specific error types
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    /// The supplied initial point violates one or more inequalities beyond
    /// the feasibility tolerance; (constraint position, signed residual)
    /// pairs are attached. There is no phase-1 fallback.
    #[error("Infeasible initial point: {} inequality constraint(s) violated", .violations.len())]
    InfeasibleInitial { violations: Vec<(usize, f64)> },

    /// The equality-constrained subproblem or the dual graph was
    /// rank-deficient
    #[error("Linear algebra error: {0}")]
    LinAlg(#[from] LinAlgError),

    /// The iteration cap was reached; the last state is attached for
    /// diagnosis
    #[error("Maximum iterations ({max_iterations}) reached without convergence")]
    MaxIterationsExceeded {
        max_iterations: usize,
        state: Box<QpState>,
    },

    /// Problem/value inconsistency detected at first use
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl SolverError {
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

/// Result type for solver operations
pub type SolverResult<T> = Result<T, SolverError>;

/// Configuration parameters for the active-set solver.
///
/// All options can be set with the builder pattern:
///
/// ```
/// use apex_qp::solver::QpSolverConfig;
///
/// let config = QpSolverConfig::new()
///     .with_max_iterations(50)
///     .with_primal_tolerance(1e-9)
///     .with_warm_start(false);
/// ```
#[derive(Debug, Clone)]
pub struct QpSolverConfig {
    /// Cap on outer iterations; exceeding it raises
    /// [`SolverError::MaxIterationsExceeded`]
    pub max_iterations: usize,
    /// ‖p‖∞ threshold below which the inner solve is declared stationary
    pub primal_tolerance: f64,
    /// Threshold for the leaving-constraint test; |λ| below it is treated
    /// as zero
    pub dual_tolerance: f64,
    /// Tolerance for classifying initial residuals as boundary, interior,
    /// or infeasible
    pub feasibility_tolerance: f64,
    /// Use supplied duals to pre-activate strictly interior constraints
    /// with positive multipliers
    pub warm_start: bool,
}

impl Default for QpSolverConfig {
    fn default() -> Self {
        QpSolverConfig {
            max_iterations: 100,
            primal_tolerance: 1e-7,
            dual_tolerance: 1e-9,
            feasibility_tolerance: 1e-7,
            warm_start: true,
        }
    }
}

impl QpSolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_primal_tolerance(mut self, primal_tolerance: f64) -> Self {
        self.primal_tolerance = primal_tolerance;
        self
    }

    pub fn with_dual_tolerance(mut self, dual_tolerance: f64) -> Self {
        self.dual_tolerance = dual_tolerance;
        self
    }

    pub fn with_feasibility_tolerance(mut self, feasibility_tolerance: f64) -> Self {
        self.feasibility_tolerance = feasibility_tolerance;
        self
    }

    pub fn with_warm_start(mut self, warm_start: bool) -> Self {
        self.warm_start = warm_start;
        self
    }
}
