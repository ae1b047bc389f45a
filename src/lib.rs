//! # Apex QP
//!
//! An active-set quadratic programming solver for problems expressed as
//! factor graphs. Minimizes a convex quadratic objective subject to linear
//! equality and inequality constraints:
//!
//! ```text
//! minimize   ½ xᵀ G x − gᵀ x + ½ f0
//! subject to A_eq · x = b_eq
//!            A_in · x ≤ b_in
//! ```
//!
//! Instead of dense matrices, the problem is presented as three factor
//! graphs (quadratic cost factors, equality factors, and inequality
//! factors), each relating a small tuple of named variables. The solver
//! returns the primal solution together with the Lagrange multipliers of
//! the final working set.
//!
//! ## Features
//!
//! - **Factor-graph problem model**: variables keyed by name, factors owning
//!   small dense coefficient blocks, sparse assembly only at solve time
//! - **Active-set iteration**: working-set management, step-size capping by
//!   blocking constraints, leaving-constraint selection from recovered
//!   multipliers, warm starts from prior duals
//! - **Sparse linear algebra**: equality-constrained subproblems and dual
//!   graphs eliminated through faer's sparse Cholesky/LU factorizations
//! - **Explicit failure taxonomy**: infeasible starts, indeterminate
//!   subproblems, and iteration caps surface as typed errors, never panics
//!
//! The solver requires a **feasible initial point**; there is no phase-1
//! feasibility stage.
//!
//! ## Example
//!
//! ```
//! use apex_qp::core::problem::Qp;
//! use apex_qp::core::values::VectorValues;
//! use apex_qp::factors::{HessianFactor, InequalityFactor};
//! use apex_qp::solver::QpSolver;
//! use nalgebra::{dmatrix, dvector};
//!
//! // minimize ½(x − 3)²  subject to  x ≤ 2
//! let mut qp = Qp::new();
//! qp.add_cost(HessianFactor::unary("x", dmatrix![1.0], dvector![3.0]).unwrap())
//!     .unwrap();
//! qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0]], 2.0, "d0").unwrap())
//!     .unwrap();
//!
//! let solver = QpSolver::new(&qp);
//! let mut x0 = VectorValues::new();
//! x0.insert("x", dvector![0.0]).unwrap();
//!
//! let (x, duals) = solver.optimize(&x0).unwrap();
//! assert!((x.get("x").unwrap()[0] - 2.0).abs() < 1e-9);
//! assert!(duals.get("d0").unwrap()[0] <= 0.0);
//! ```

pub mod core;
pub mod error;
pub mod factors;
pub mod linalg;
#[cfg(feature = "logging")]
pub mod logger;
pub mod solver;

// Re-export core types
pub use core::problem::Qp;
pub use core::values::VectorValues;
pub use error::{ApexQpError, ApexQpResult};

// Re-export factor types
pub use factors::{
    EqualityFactor, FactorGraph, GaussianFactor, GaussianFactorGraph, HessianFactor,
    InequalityFactor, JacobianFactor, NoiseModel,
};

pub use linalg::{GaussianGraphSolver, SparseKktSolver};
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use solver::{QpSolver, QpSolverConfig, QpState, SolverError};
