//! Integration tests for Apex QP
//!
//! These tests drive the active-set solver end-to-end on small quadratic
//! programs with known solutions and verify the KKT conditions at
//! termination.
//!
//! # Coverage
//!
//! - Unconstrained, equality-only, and inequality-constrained solves
//! - Constraint activation (blocking) and release (leaving) events
//! - Warm starts and idempotence at an optimal point
//! - Infeasible initial points
//! - Primal/dual feasibility, complementary slackness, stationarity,
//!   monotone objective progress, and determinism

use apex_qp::core::problem::Qp;
use apex_qp::core::values::VectorValues;
use apex_qp::factors::{EqualityFactor, HessianFactor, InequalityFactor};
use apex_qp::solver::{QpSolver, QpSolverConfig, QpState, SolverError};
use nalgebra::{dmatrix, dvector};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn values_1d(key: &str, value: f64) -> TestResult<VectorValues> {
    let mut values = VectorValues::new();
    values.insert(key, dvector![value])?;
    Ok(values)
}

fn values_2x1d(x: f64, y: f64) -> TestResult<VectorValues> {
    let mut values = VectorValues::new();
    values.insert("x", dvector![x])?;
    values.insert("y", dvector![y])?;
    Ok(values)
}

/// minimize ½(x − 3)² subject to x ≤ bound
fn bounded_scalar_qp(bound: f64) -> TestResult<Qp> {
    let mut qp = Qp::new();
    qp.add_cost(HessianFactor::unary("x", dmatrix![1.0], dvector![3.0])?)?;
    qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0]], bound, "d0")?)?;
    Ok(qp)
}

/// minimize ½((x − 2)² + (y − 2)²) subject to x + y ≤ 5 and x ≤ 1
fn corner_qp() -> TestResult<Qp> {
    let mut qp = Qp::new();
    qp.add_cost(HessianFactor::unary("x", dmatrix![1.0], dvector![2.0])?)?;
    qp.add_cost(HessianFactor::unary("y", dmatrix![1.0], dvector![2.0])?)?;
    qp.add_inequality(InequalityFactor::new(
        &["x", "y"],
        vec![dmatrix![1.0], dmatrix![1.0]],
        5.0,
        "sum",
    )?)?;
    qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0]], 1.0, "xcap")?)?;
    Ok(qp)
}

#[test]
fn test_unconstrained_scalar() -> TestResult {
    // minimize ½·2x² − 4x, minimum at x = 2
    let mut qp = Qp::new();
    qp.add_cost(HessianFactor::unary("x", dmatrix![2.0], dvector![4.0])?)?;

    let solver = QpSolver::new(&qp);
    let (x, duals) = solver.optimize(&values_1d("x", 0.0)?)?;

    assert!((x.get("x").unwrap()[0] - 2.0).abs() < 1e-9);
    assert!(duals.is_empty());
    Ok(())
}

#[test]
fn test_equality_only() -> TestResult {
    // minimize ½(x₁² + x₂²) subject to x₁ + x₂ = 1, solution (0.5, 0.5)
    let mut qp = Qp::new();
    qp.add_cost(HessianFactor::unary("x1", dmatrix![1.0], dvector![0.0])?)?;
    qp.add_cost(HessianFactor::unary("x2", dmatrix![1.0], dvector![0.0])?)?;
    qp.add_equality(EqualityFactor::new(
        &["x1", "x2"],
        vec![dmatrix![1.0], dmatrix![1.0]],
        dvector![1.0],
        "eq",
    )?)?;

    let solver = QpSolver::new(&qp);
    let mut x0 = VectorValues::new();
    x0.insert("x1", dvector![1.0])?;
    x0.insert("x2", dvector![0.0])?;

    let (x, duals) = solver.optimize(&x0)?;
    assert!((x.get("x1").unwrap()[0] - 0.5).abs() < 1e-9);
    assert!((x.get("x2").unwrap()[0] - 0.5).abs() < 1e-9);

    // Stationarity: λ·(1, 1) = ∇f = (0.5, 0.5)
    assert!((duals.get("eq").unwrap()[0] - 0.5).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_inactive_inequality() -> TestResult {
    // minimize ½(x − 3)² subject to x ≤ 10: the bound never engages
    let qp = bounded_scalar_qp(10.0)?;
    let solver = QpSolver::new(&qp);

    let (x, duals) = solver.optimize(&values_1d("x", 0.0)?)?;
    assert!((x.get("x").unwrap()[0] - 3.0).abs() < 1e-9);
    assert!(duals.is_empty());
    Ok(())
}

#[test]
fn test_active_inequality_at_boundary() -> TestResult {
    // minimize ½(x − 3)² subject to x ≤ 2: blocked at the bound with λ = −1
    let qp = bounded_scalar_qp(2.0)?;
    let solver = QpSolver::new(&qp);

    let (x, duals) = solver.optimize(&values_1d("x", 0.0)?)?;
    assert!((x.get("x").unwrap()[0] - 2.0).abs() < 1e-9);
    assert!((duals.get("d0").unwrap()[0] + 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_leaving_constraint_from_corner() -> TestResult {
    // Start at the corner (1, 4) with both constraints active. Stationarity
    // there forces λ = 2 on x + y ≤ 5 and λ = −3 on x ≤ 1, so the sum
    // constraint is released; the solve settles at (1, 2) against x ≤ 1.
    let qp = corner_qp()?;
    let solver = QpSolver::new(&qp);

    let x0 = values_2x1d(1.0, 4.0)?;
    let (x, duals) = solver.optimize(&x0)?;

    assert!((x.get("x").unwrap()[0] - 1.0).abs() < 1e-9);
    assert!((x.get("y").unwrap()[0] - 2.0).abs() < 1e-9);

    // The released constraint ends inactive with slack, its dual cleared
    assert!(duals.get("sum").is_none());
    assert!((duals.get("xcap").unwrap()[0] + 1.0).abs() < 1e-9);

    // Primal feasibility at termination
    let slack_sum = x.get("x").unwrap()[0] + x.get("y").unwrap()[0] - 5.0;
    assert!(slack_sum <= 1e-7);
    Ok(())
}

#[test]
fn test_leaving_constraint_trajectory() -> TestResult {
    // Same problem, stepped manually to observe the release event
    let qp = corner_qp()?;
    let solver = QpSolver::new(&qp);
    let x0 = values_2x1d(1.0, 4.0)?;

    let working_set = solver.identify_active_constraints(&x0, &VectorValues::new())?;
    assert!(working_set.get(0).unwrap().is_active());
    assert!(working_set.get(1).unwrap().is_active());

    let state = QpState::new(x0, VectorValues::new(), working_set, false, 0);

    // Iteration 1: stationary at the corner, the sum constraint is released
    let state = solver.iterate(&state)?;
    assert!(!state.converged);
    assert!(!state.working_set.get(0).unwrap().is_active());
    assert!(state.working_set.get(1).unwrap().is_active());
    assert!(state.duals.get("sum").is_none());

    // Iteration 2: full step to (1, 2), nothing blocks
    let state = solver.iterate(&state)?;
    assert!(!state.converged);
    assert!((state.values.get("y").unwrap()[0] - 2.0).abs() < 1e-9);

    // Iteration 3: stationary with λ ≤ 0, converged
    let state = solver.iterate(&state)?;
    assert!(state.converged);
    assert_eq!(state.iterations, 3);
    Ok(())
}

#[test]
fn test_infeasible_start() -> TestResult {
    // x0 = 5 violates x ≤ 2 by 3; no iterations are run
    let qp = bounded_scalar_qp(2.0)?;
    let solver = QpSolver::new(&qp);

    match solver.optimize(&values_1d("x", 5.0)?) {
        Err(SolverError::InfeasibleInitial { violations }) => {
            assert_eq!(violations, vec![(0, 3.0)]);
        }
        other => panic!("expected InfeasibleInitial, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_mixed_equality_and_inequality() -> TestResult {
    // minimize ½(x² + y²) subject to x + y = 1 and x ≤ 0.2:
    // the line minimum (0.5, 0.5) violates the cap, so the solution slides
    // to (0.2, 0.8) with λ_eq = 0.8 and λ_cap = −0.6
    let mut qp = Qp::new();
    qp.add_cost(HessianFactor::unary("x", dmatrix![1.0], dvector![0.0])?)?;
    qp.add_cost(HessianFactor::unary("y", dmatrix![1.0], dvector![0.0])?)?;
    qp.add_equality(EqualityFactor::new(
        &["x", "y"],
        vec![dmatrix![1.0], dmatrix![1.0]],
        dvector![1.0],
        "eq",
    )?)?;
    qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0]], 0.2, "cap")?)?;

    let solver = QpSolver::new(&qp);
    let (x, duals) = solver.optimize(&values_2x1d(0.0, 1.0)?)?;

    assert!((x.get("x").unwrap()[0] - 0.2).abs() < 1e-9);
    assert!((x.get("y").unwrap()[0] - 0.8).abs() < 1e-9);
    assert!((duals.get("eq").unwrap()[0] - 0.8).abs() < 1e-9);
    assert!((duals.get("cap").unwrap()[0] + 0.6).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_vector_valued_variable() -> TestResult {
    // minimize ½‖x − (3, 4)‖² subject to x₀ ≤ 2: only the first component
    // is clamped
    let mut qp = Qp::new();
    qp.add_cost(HessianFactor::unary(
        "x",
        dmatrix![1.0, 0.0; 0.0, 1.0],
        dvector![3.0, 4.0],
    )?)?;
    qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0, 0.0]], 2.0, "d0")?)?;

    let solver = QpSolver::new(&qp);
    let mut x0 = VectorValues::new();
    x0.insert("x", dvector![0.0, 0.0])?;

    let (x, duals) = solver.optimize(&x0)?;
    let solution = x.get("x").unwrap();
    assert!((solution[0] - 2.0).abs() < 1e-9);
    assert!((solution[1] - 4.0).abs() < 1e-9);
    assert!((duals.get("d0").unwrap()[0] + 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_complementary_slackness_and_stationarity() -> TestResult {
    let qp = corner_qp()?;
    let solver = QpSolver::new(&qp);
    let (x, duals) = solver.optimize(&values_2x1d(1.0, 4.0)?)?;

    // Complementary slackness: (aᵀx − b)·λ ≈ 0 for every inequality
    for (position, factor) in qp.inequalities().iter().enumerate() {
        let slack = factor.residual_at(&x)?;
        let lambda = duals.get(factor.dual_key()).map_or(0.0, |d| d[0]);
        assert!(
            (slack * lambda).abs() < 1e-7,
            "constraint {position}: slack {slack} λ {lambda}"
        );
    }

    // Stationarity: ∇f(x*) = Σ λ_k·∇c_k(x*) componentwise.
    // ∇f = (x − 2, y − 2) = (−1, 0); only x ≤ 1 is active with λ = −1.
    let grad_x = x.get("x").unwrap()[0] - 2.0;
    let grad_y = x.get("y").unwrap()[0] - 2.0;
    let lambda_cap = duals.get("xcap").unwrap()[0];
    assert!((grad_x - lambda_cap).abs() < 1e-7);
    assert!(grad_y.abs() < 1e-7);
    Ok(())
}

#[test]
fn test_monotone_objective_progress() -> TestResult {
    let qp = corner_qp()?;
    let solver = QpSolver::new(&qp);
    let x0 = values_2x1d(1.0, 4.0)?;

    let working_set = solver.identify_active_constraints(&x0, &VectorValues::new())?;
    let mut state = QpState::new(x0, VectorValues::new(), working_set, false, 0);

    let mut objective = qp.objective_value(&state.values)?;
    while !state.converged {
        state = solver.iterate(&state)?;
        let next = qp.objective_value(&state.values)?;
        assert!(
            next <= objective + 1e-7,
            "objective increased: {objective} -> {next}"
        );
        objective = next;
    }
    Ok(())
}

#[test]
fn test_determinism() -> TestResult {
    let qp = corner_qp()?;
    let solver = QpSolver::new(&qp);
    let x0 = values_2x1d(1.0, 4.0)?;

    let (x1, d1) = solver.optimize(&x0)?;
    let (x2, d2) = solver.optimize(&x0)?;

    // Identical inputs produce bitwise-identical outputs
    assert!(x1.equals(&x2, 0.0));
    assert!(d1.equals(&d2, 0.0));
    Ok(())
}

#[test]
fn test_idempotence_at_optimum() -> TestResult {
    // Re-optimizing from (x*, λ*) converges in a single iteration
    let qp = bounded_scalar_qp(2.0)?;
    let solver = QpSolver::new(&qp);

    let (x_star, duals_star) = solver.optimize(&values_1d("x", 0.0)?)?;

    let working_set = solver.identify_active_constraints(&x_star, &duals_star)?;
    let state = QpState::new(x_star.clone(), duals_star, working_set, false, 0);
    let state = solver.iterate(&state)?;

    assert!(state.converged);
    assert_eq!(state.iterations, 1);
    assert!(state.values.equals(&x_star, 0.0));
    Ok(())
}

#[test]
fn test_warm_start_reactivates_constraint() -> TestResult {
    // A strictly interior start with a positive prior dual pre-activates the
    // bound; the first inner solve then lands directly on it
    let qp = bounded_scalar_qp(2.0)?;
    let solver = QpSolver::new(&qp);

    let (x, duals) = solver.optimize_with_duals(&values_1d("x", 0.0)?, &values_1d("d0", 1.0)?)?;
    assert!((x.get("x").unwrap()[0] - 2.0).abs() < 1e-9);
    assert!((duals.get("d0").unwrap()[0] + 1.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_iteration_counts() -> TestResult {
    // From the interior, the bounded problem steps once (activating the
    // bound) and converges on the second pass
    let qp = bounded_scalar_qp(2.0)?;
    let solver = QpSolver::new(&qp);

    let working_set =
        solver.identify_active_constraints(&values_1d("x", 0.0)?, &VectorValues::new())?;
    let mut state = QpState::new(
        values_1d("x", 0.0)?,
        VectorValues::new(),
        working_set,
        false,
        0,
    );
    while !state.converged {
        state = solver.iterate(&state)?;
    }
    assert_eq!(state.iterations, 2);
    Ok(())
}

#[test]
fn test_max_iterations_carries_last_state() -> TestResult {
    let qp = corner_qp()?;
    let solver = QpSolver::with_config(&qp, QpSolverConfig::new().with_max_iterations(2));

    match solver.optimize(&values_2x1d(1.0, 4.0)?) {
        Err(SolverError::MaxIterationsExceeded {
            max_iterations,
            state,
        }) => {
            assert_eq!(max_iterations, 2);
            assert_eq!(state.iterations, 2);
            assert!(!state.converged);
        }
        other => panic!("expected MaxIterationsExceeded, got {other:?}"),
    }
    Ok(())
}
