//! The active-set iteration engine.
//!
//! # Algorithm
//!
//! Starting from a feasible point, each iteration solves the QP restricted
//! to the current working set (active inequalities enforced as equalities),
//! then either moves along the resulting direction or inspects the
//! multipliers:
//!
//! 1. Solve base graph ∪ {active inequalities as hard rows} for a candidate
//!    point; the primal direction is `p = candidate − x_k`.
//! 2. If ‖p‖∞ is below the primal tolerance, `x_k` is stationary for this
//!    working set. Recover the multipliers from the dual graph. A positive
//!    multiplier marks an active inequality pulling the solution toward
//!    infeasibility: release the worst one and continue. No positive
//!    multiplier means the KKT conditions hold and the solve is finished.
//! 3. Otherwise move `x_{k+1} = x_k + α·p`, with α capped by the first
//!    blocking inactive inequality, which then enters the working set.
//!
//! For active `≤`-constraints the optimality condition is λ ≤ 0: the
//! constraint force λ·∇c must push the solution back into the feasible
//! region, opposite the constraint gradient. See Nocedal & Wright (2006),
//! pp. 469–471.
//!
//! # Example
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
//! assert!((duals.get("d0").unwrap()[0] + 1.0).abs() < 1e-9);
//! ```

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::problem::Qp;
use crate::core::values::VectorValues;
use crate::core::variable_index::VariableIndex;
use crate::core::{CoreError, CoreResult};
use crate::factors::{
    FactorGraph, GaussianFactorGraph, InequalityFactor, JacobianFactor, Keyed,
};
use crate::linalg::{GaussianGraphSolver, SparseKktSolver};
use crate::solver::dual::DualGraphBuilder;
use crate::solver::step::compute_step_size;
use crate::solver::{QpSolverConfig, QpState, SolverError, SolverResult};

/// Active-set solver for a factor-graph QP.
///
/// The problem is borrowed immutably for the solver's lifetime; `optimize`
/// may be called repeatedly with different starts. The base graph (costs and
/// equalities) and the variable indexes are built once at construction.
pub struct QpSolver<'a> {
    qp: &'a Qp,
    config: QpSolverConfig,

    /// Cost factors plus equalities as hard rows; active inequalities are
    /// appended per iteration.
    base_graph: GaussianFactorGraph,

    cost_index: VariableIndex,
    equality_index: VariableIndex,
    inequality_index: VariableIndex,

    /// Every variable referenced by a constraint; these become rows of the
    /// dual graph.
    constrained_keys: BTreeSet<String>,

    linear_solver: SparseKktSolver,
}

impl<'a> QpSolver<'a> {
    pub fn new(qp: &'a Qp) -> Self {
        Self::with_config(qp, QpSolverConfig::default())
    }

    pub fn with_config(qp: &'a Qp, config: QpSolverConfig) -> Self {
        let mut base_graph = GaussianFactorGraph::new();
        for factor in qp.cost().iter() {
            base_graph.push_hessian(factor.clone());
        }
        for factor in qp.equalities().iter() {
            base_graph.push_jacobian(JacobianFactor::from_equality(factor));
        }

        let mut constrained_keys = BTreeSet::new();
        for factor in qp.equalities().iter() {
            constrained_keys.extend(factor.keys().iter().cloned());
        }
        for factor in qp.inequalities().iter() {
            constrained_keys.extend(factor.keys().iter().cloned());
        }

        QpSolver {
            qp,
            config,
            base_graph,
            cost_index: VariableIndex::from_graph(qp.cost()),
            equality_index: VariableIndex::from_graph(qp.equalities()),
            inequality_index: VariableIndex::from_graph(qp.inequalities()),
            constrained_keys,
            linear_solver: SparseKktSolver::new(),
        }
    }

    pub fn config(&self) -> &QpSolverConfig {
        &self.config
    }

    /// Classify every inequality at the initial point.
    ///
    /// Residuals beyond the feasibility tolerance are collected and reported
    /// as an infeasible start; boundary constraints are activated. A
    /// strictly interior constraint is activated only under warm start, and
    /// only when the supplied duals carry a strictly positive multiplier
    /// for it.
    pub fn identify_active_constraints(
        &self,
        initial_values: &VectorValues,
        initial_duals: &VectorValues,
    ) -> SolverResult<FactorGraph<InequalityFactor>> {
        let mut working_set = self.qp.inequalities().clone();
        let mut violations = Vec::new();

        for (position, factor) in working_set.iter_mut().enumerate() {
            let residual = factor.residual_at(initial_values)?;
            if residual > self.config.feasibility_tolerance {
                violations.push((position, residual));
            } else if residual >= -self.config.feasibility_tolerance {
                factor.set_active(true);
            } else {
                let warm_activate = self.config.warm_start
                    && initial_duals
                        .get(factor.dual_key())
                        .is_some_and(|dual| dual[0] > 0.0);
                factor.set_active(warm_activate);
            }
        }

        if !violations.is_empty() {
            return Err(SolverError::InfeasibleInitial { violations }.log());
        }
        Ok(working_set)
    }

    /// Find the active inequality whose multiplier most severely violates
    /// the λ ≤ 0 optimality condition, if any.
    ///
    /// A multiplier absent from `duals` reads as zero. Candidates within the
    /// dual tolerance of each other tie toward the lowest position.
    pub fn identify_leaving_constraint(
        &self,
        working_set: &FactorGraph<InequalityFactor>,
        duals: &VectorValues,
    ) -> Option<usize> {
        let mut worst: Option<(usize, f64)> = None;
        for (position, factor) in working_set.iter().enumerate() {
            if !factor.is_active() {
                continue;
            }
            let lambda = duals
                .get(factor.dual_key())
                .map_or(0.0, |dual| dual[0]);
            if lambda > self.config.dual_tolerance
                && worst.is_none_or(|(_, w)| lambda > w + self.config.dual_tolerance)
            {
                worst = Some((position, lambda));
            }
        }
        worst.map(|(position, _)| position)
    }

    /// Perform one active-set step, returning the successor state.
    pub fn iterate(&self, state: &QpState) -> SolverResult<QpState> {
        // Equality subproblem: the base graph plus the working set's active
        // rows promoted to hard equalities
        let mut graph = self.base_graph.clone();
        for factor in state.working_set.iter() {
            if factor.is_active() {
                graph.push_jacobian(JacobianFactor::from_active_inequality(factor));
            }
        }

        let candidate = self.linear_solver.solve(&graph)?;
        let direction = subtract(&candidate, &state.values)?;
        let direction_norm = direction.max_norm();

        if direction_norm <= self.config.primal_tolerance {
            // Stationary for this working set: consult the multipliers
            let dual_builder = DualGraphBuilder::new(
                self.qp,
                &self.cost_index,
                &self.equality_index,
                &self.inequality_index,
                &self.constrained_keys,
            );
            let dual_graph = dual_builder.build(&state.working_set, &state.values)?;
            let duals = self.linear_solver.solve(&dual_graph)?;

            match self.identify_leaving_constraint(&state.working_set, &duals) {
                None => {
                    debug!(
                        "iteration {}: stationary, no leaving constraint, converged",
                        state.iterations + 1
                    );
                    Ok(QpState::new(
                        state.values.clone(),
                        duals,
                        state.working_set.clone(),
                        true,
                        state.iterations + 1,
                    ))
                }
                Some(position) => {
                    debug!(
                        "iteration {}: releasing constraint {} from the working set",
                        state.iterations + 1,
                        position
                    );
                    let mut working_set = state.working_set.clone();
                    let mut duals = duals;
                    let factor = working_set.get_mut(position).ok_or_else(|| {
                        CoreError::Variable(format!("working set has no factor {position}")).log()
                    })?;
                    duals.remove(factor.dual_key());
                    factor.set_active(false);
                    Ok(QpState::new(
                        state.values.clone(),
                        duals,
                        working_set,
                        false,
                        state.iterations + 1,
                    ))
                }
            }
        } else {
            let (alpha, blocking) =
                compute_step_size(&state.working_set, &state.values, &direction)?;
            debug!(
                "iteration {}: |p|_inf = {:.3e}, alpha = {:.6}, blocking = {:?}",
                state.iterations + 1,
                direction_norm,
                alpha,
                blocking
            );

            let mut values = state.values.clone();
            values.scaled_add(alpha, &direction)?;

            let mut working_set = state.working_set.clone();
            if let Some(position) = blocking {
                let factor = working_set.get_mut(position).ok_or_else(|| {
                    CoreError::Variable(format!("working set has no factor {position}")).log()
                })?;
                factor.set_active(true);
            }

            Ok(QpState::new(
                values,
                state.duals.clone(),
                working_set,
                false,
                state.iterations + 1,
            ))
        }
    }

    /// Solve from a feasible start with no prior duals.
    pub fn optimize(
        &self,
        initial_values: &VectorValues,
    ) -> SolverResult<(VectorValues, VectorValues)> {
        self.optimize_with_duals(initial_values, &VectorValues::new())
    }

    /// Solve from a feasible start, warm-starting the working set from
    /// `initial_duals` when the configuration allows it.
    ///
    /// Returns the primal solution and the multipliers of the final working
    /// set (equality multipliers included).
    pub fn optimize_with_duals(
        &self,
        initial_values: &VectorValues,
        initial_duals: &VectorValues,
    ) -> SolverResult<(VectorValues, VectorValues)> {
        self.qp.check_values(initial_values)?;
        let working_set = self.identify_active_constraints(initial_values, initial_duals)?;

        let mut state = QpState::new(
            initial_values.clone(),
            initial_duals.clone(),
            working_set,
            false,
            0,
        );

        loop {
            if state.converged {
                debug!("converged after {} iteration(s)", state.iterations);
                return Ok((state.values, state.duals));
            }
            if state.iterations as usize >= self.config.max_iterations {
                return Err(SolverError::MaxIterationsExceeded {
                    max_iterations: self.config.max_iterations,
                    state: Box::new(state),
                }
                .log());
            }
            state = self.iterate(&state)?;
        }
    }
}

/// Key-wise difference `lhs − rhs`, restricted to the keys of `lhs`.
///
/// Variables the inner solve did not determine keep their current value and
/// contribute no motion.
fn subtract(lhs: &VectorValues, rhs: &VectorValues) -> CoreResult<VectorValues> {
    let mut difference = VectorValues::new();
    for (key, value) in lhs.iter() {
        let base = rhs.get(key).ok_or_else(|| {
            CoreError::Variable(format!("no current value for solved variable '{key}'")).log()
        })?;
        if base.len() != value.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "variable '{}' has dimension {} in the solution but {} in the current point",
                key,
                value.len(),
                base.len()
            ))
            .log());
        }
        difference.insert(key, value - base)?;
    }
    Ok(difference)
}
