//! Dual-graph construction from KKT stationarity.
//!
//! The Lagrangian of the QP is
//!
//! ```text
//! L(x, λ) = f(x) − Σ_k λ_k·c_k(x),    f(x) = ½xᵀGx − gᵀx
//! ```
//!
//! Setting ∇ₓL = 0 at a primal solution gives, for every variable xᵢ that
//! appears in at least one constraint,
//!
//! ```text
//! Σ_k λ_k·∇c_k(xᵢ) = ∇f(xᵢ) = Σⱼ G_ij·xⱼ − gᵢ
//! ```
//!
//! Each such variable becomes one hard row of a Gaussian graph whose
//! unknowns are the multipliers: the coefficient block for λ_k is the
//! transposed Jacobian block of constraint k at xᵢ, and the right-hand side
//! is ∇f(xᵢ) accumulated from the cost factors touching xᵢ. Variables in no
//! constraint reduce to the trivial condition ∇f(xᵢ) = 0, which holds at any
//! stationary point, and are omitted.
//!
//! Primal variables are scanned in sorted key order, so multipliers enter
//! the dual graph in the order their constraints are discovered; this fixes
//! the elimination order.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use crate::core::problem::Qp;
use crate::core::values::VectorValues;
use crate::core::variable_index::VariableIndex;
use crate::core::{CoreError, CoreResult};
use crate::factors::{
    FactorGraph, GaussianFactorGraph, InequalityFactor, JacobianFactor, Keyed, NoiseModel,
};

/// Assembles the multiplier-recovery graph for a working set.
pub struct DualGraphBuilder<'a> {
    qp: &'a Qp,
    cost_index: &'a VariableIndex,
    equality_index: &'a VariableIndex,
    inequality_index: &'a VariableIndex,
    constrained_keys: &'a BTreeSet<String>,
}

impl<'a> DualGraphBuilder<'a> {
    pub fn new(
        qp: &'a Qp,
        cost_index: &'a VariableIndex,
        equality_index: &'a VariableIndex,
        inequality_index: &'a VariableIndex,
        constrained_keys: &'a BTreeSet<String>,
    ) -> Self {
        DualGraphBuilder {
            qp,
            cost_index,
            equality_index,
            inequality_index,
            constrained_keys,
        }
    }

    /// Build the dual graph at the primal point `values`, with activity
    /// taken from `working_set`.
    pub fn build(
        &self,
        working_set: &FactorGraph<InequalityFactor>,
        values: &VectorValues,
    ) -> CoreResult<GaussianFactorGraph> {
        let mut dual_graph = GaussianFactorGraph::new();

        for key in self.constrained_keys {
            let terms = self.collect_dual_jacobians(key, working_set)?;
            if terms.is_empty() {
                // No active constraint touches this variable
                continue;
            }

            let rhs = self.cost_gradient(key, values)?;
            let (dual_keys, blocks): (Vec<String>, Vec<DMatrix<f64>>) = terms.into_iter().unzip();
            dual_graph.push_jacobian(JacobianFactor::from_parts(
                dual_keys,
                blocks,
                rhs,
                NoiseModel::Constrained,
            )?);
        }

        Ok(dual_graph)
    }

    /// Transposed Jacobian blocks at `key` for every active constraint
    /// touching it, keyed by the constraint's dual key. Equality factors
    /// first, then active inequalities, both in graph order.
    fn collect_dual_jacobians(
        &self,
        key: &str,
        working_set: &FactorGraph<InequalityFactor>,
    ) -> CoreResult<Vec<(String, DMatrix<f64>)>> {
        let mut terms = Vec::new();

        for &position in self.equality_index.factors_of(key) {
            let factor = self.qp.equalities().get(position).ok_or_else(|| {
                CoreError::Variable(format!("equality graph has no factor {position}")).log()
            })?;
            let slot = factor.find(key).ok_or_else(|| {
                CoreError::Variable(format!("equality factor {position} lost key '{key}'")).log()
            })?;
            terms.push((factor.dual_key().to_owned(), factor.block(slot).transpose()));
        }

        for &position in self.inequality_index.factors_of(key) {
            let factor = working_set.get(position).ok_or_else(|| {
                CoreError::Variable(format!("working set has no factor {position}")).log()
            })?;
            if !factor.is_active() {
                continue;
            }
            let slot = factor.find(key).ok_or_else(|| {
                CoreError::Variable(format!("inequality factor {position} lost key '{key}'")).log()
            })?;
            terms.push((factor.dual_key().to_owned(), factor.block(slot).transpose()));
        }

        Ok(terms)
    }

    /// ∇f at `key`, summed over every cost factor touching it.
    fn cost_gradient(&self, key: &str, values: &VectorValues) -> CoreResult<DVector<f64>> {
        let dim = self.qp.dim_of(key).ok_or_else(|| {
            CoreError::Variable(format!("no dimension recorded for variable '{key}'")).log()
        })?;
        let mut gradient = DVector::zeros(dim);

        for &position in self.cost_index.factors_of(key) {
            let factor = self.qp.cost().get(position).ok_or_else(|| {
                CoreError::Variable(format!("cost graph has no factor {position}")).log()
            })?;
            let slot = factor.find(key).ok_or_else(|| {
                CoreError::Variable(format!("cost factor {position} lost key '{key}'")).log()
            })?;
            gradient += factor.gradient_at(slot, values)?;
        }

        Ok(gradient)
    }
}
