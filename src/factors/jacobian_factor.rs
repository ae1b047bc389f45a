//! Generic Gaussian-graph rows and the Gaussian factor graph.
//!
//! The inner linear solves operate on a graph mixing two factor shapes: the
//! quadratic cost factors themselves, and linear rows `A·x − b` under a noise
//! model. A [`NoiseModel::Gaussian`] row contributes its squared residual to
//! the objective; a [`NoiseModel::Constrained`] row is a hard equality that
//! the solution must satisfy exactly.
//!
//! The two shapes form the sealed [`GaussianFactor`] enum rather than an open
//! trait hierarchy; the solver backend matches on the variant during
//! assembly.

use nalgebra::{DMatrix, DVector};

use crate::factors::{
    EqualityFactor, FactorError, FactorResult, HessianFactor, InequalityFactor, Keyed,
    check_unique_keys,
};

/// Noise model attached to a Jacobian row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseModel {
    /// Soft row: contributes ½‖A·x − b‖² to the objective.
    Gaussian,
    /// Hard row: A·x = b must hold exactly in the solution.
    Constrained,
}

/// A linear row group `A·x − b` over an ordered tuple of variables.
#[derive(Debug, Clone)]
pub struct JacobianFactor {
    keys: Vec<String>,
    blocks: Vec<DMatrix<f64>>,
    rhs: DVector<f64>,
    noise: NoiseModel,
}

impl JacobianFactor {
    /// Create a Jacobian factor from per-variable coefficient blocks. Every
    /// block must have `rhs.len()` rows.
    pub fn new(
        keys: &[&str],
        blocks: Vec<DMatrix<f64>>,
        rhs: DVector<f64>,
        noise: NoiseModel,
    ) -> FactorResult<Self> {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        check_unique_keys(&keys)?;
        Self::from_parts(keys, blocks, rhs, noise)
    }

    /// Internal constructor for callers that already own `String` keys.
    pub(crate) fn from_parts(
        keys: Vec<String>,
        blocks: Vec<DMatrix<f64>>,
        rhs: DVector<f64>,
        noise: NoiseModel,
    ) -> FactorResult<Self> {
        if keys.len() != blocks.len() {
            return Err(FactorError::InvalidCoefficients(format!(
                "{} keys but {} coefficient blocks",
                keys.len(),
                blocks.len()
            ))
            .log());
        }
        for block in &blocks {
            if block.nrows() != rhs.len() {
                return Err(FactorError::InvalidDimension {
                    expected: rhs.len(),
                    actual: block.nrows(),
                }
                .log());
            }
        }
        Ok(JacobianFactor {
            keys,
            blocks,
            rhs,
            noise,
        })
    }

    /// Promote an equality constraint into a hard Gaussian-graph row.
    pub fn from_equality(factor: &EqualityFactor) -> Self {
        JacobianFactor {
            keys: factor.keys().to_vec(),
            blocks: (0..factor.keys().len())
                .map(|slot| factor.block(slot).clone())
                .collect(),
            rhs: factor.rhs().clone(),
            noise: NoiseModel::Constrained,
        }
    }

    /// Promote an active inequality into a hard Gaussian-graph row
    /// `aᵀx = b`.
    pub fn from_active_inequality(factor: &InequalityFactor) -> Self {
        JacobianFactor {
            keys: factor.keys().to_vec(),
            blocks: (0..factor.keys().len())
                .map(|slot| factor.block(slot).clone())
                .collect(),
            rhs: factor.to_equality_rhs(),
            noise: NoiseModel::Constrained,
        }
    }

    /// Number of rows.
    pub fn dim(&self) -> usize {
        self.rhs.len()
    }

    /// Dimension of the variable in `slot`.
    pub fn key_dim(&self, slot: usize) -> usize {
        self.blocks[slot].ncols()
    }

    /// Coefficient block for the variable in `slot`.
    pub fn block(&self, slot: usize) -> &DMatrix<f64> {
        &self.blocks[slot]
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    pub fn noise(&self) -> NoiseModel {
        self.noise
    }
}

impl Keyed for JacobianFactor {
    fn keys(&self) -> &[String] {
        &self.keys
    }
}

/// Sealed factor variants of a Gaussian graph.
#[derive(Debug, Clone)]
pub enum GaussianFactor {
    Hessian(HessianFactor),
    Jacobian(JacobianFactor),
}

impl Keyed for GaussianFactor {
    fn keys(&self) -> &[String] {
        match self {
            GaussianFactor::Hessian(f) => f.keys(),
            GaussianFactor::Jacobian(f) => f.keys(),
        }
    }
}

/// An ordered graph of Gaussian factors, the input to the linear backend.
#[derive(Debug, Clone, Default)]
pub struct GaussianFactorGraph {
    factors: Vec<GaussianFactor>,
}

impl GaussianFactorGraph {
    pub fn new() -> Self {
        GaussianFactorGraph {
            factors: Vec::new(),
        }
    }

    pub fn push(&mut self, factor: GaussianFactor) {
        self.factors.push(factor);
    }

    pub fn push_hessian(&mut self, factor: HessianFactor) {
        self.factors.push(GaussianFactor::Hessian(factor));
    }

    pub fn push_jacobian(&mut self, factor: JacobianFactor) {
        self.factors.push(GaussianFactor::Jacobian(factor));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GaussianFactor> {
        self.factors.iter()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
