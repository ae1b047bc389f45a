//! Hard linear equality constraints.

use nalgebra::{DMatrix, DVector};

use crate::core::values::VectorValues;
use crate::core::{CoreError, CoreResult};
use crate::factors::{FactorError, FactorResult, Keyed, check_unique_keys};

/// A linear equality constraint `A·x = b` over an ordered tuple of variables.
///
/// Each variable contributes one coefficient block of `A`; all blocks share
/// the constraint's row count. The `dual_key` names the block of Lagrange
/// multipliers attached to these rows, one multiplier per row, and is how the
/// constraint is addressed in the dual graph.
///
/// Equality constraints are always enforced; there is no activity flag.
#[derive(Debug, Clone)]
pub struct EqualityFactor {
    keys: Vec<String>,
    blocks: Vec<DMatrix<f64>>,
    rhs: DVector<f64>,
    dual_key: String,
}

impl EqualityFactor {
    /// Create an equality constraint from per-variable coefficient blocks and
    /// a right-hand side. Every block must have `rhs.len()` rows.
    pub fn new(
        keys: &[&str],
        blocks: Vec<DMatrix<f64>>,
        rhs: DVector<f64>,
        dual_key: &str,
    ) -> FactorResult<Self> {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        check_unique_keys(&keys)?;
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

        Ok(EqualityFactor {
            keys,
            blocks,
            rhs,
            dual_key: dual_key.to_owned(),
        })
    }

    /// Number of constraint rows.
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

    pub fn dual_key(&self) -> &str {
        &self.dual_key
    }

    /// Equality constraints always participate in the working set.
    pub fn is_active(&self) -> bool {
        true
    }

    /// Constraint residual `A·x − b` at `values`.
    pub fn error_at(&self, values: &VectorValues) -> CoreResult<DVector<f64>> {
        let mut error = -self.rhs.clone();
        for (slot, key) in self.keys.iter().enumerate() {
            let x = values.get(key).ok_or_else(|| {
                CoreError::Variable(format!("no value for variable '{key}'")).log()
            })?;
            if x.len() != self.blocks[slot].ncols() {
                return Err(CoreError::DimensionMismatch(format!(
                    "variable '{}' has dimension {} but the constraint declares {}",
                    key,
                    x.len(),
                    self.blocks[slot].ncols()
                ))
                .log());
            }
            error += &self.blocks[slot] * x;
        }
        Ok(error)
    }
}

impl Keyed for EqualityFactor {
    fn keys(&self) -> &[String] {
        &self.keys
    }
}
