//! Linear inequality constraints.

use nalgebra::{DMatrix, DVector};

use crate::core::values::VectorValues;
use crate::core::{CoreError, CoreResult};
use crate::factors::{FactorError, FactorResult, Keyed, check_unique_keys};

/// A single linear inequality row `aᵀx ≤ b` over an ordered tuple of
/// variables.
///
/// Each variable contributes one row block of `a`. The `dual_key` names the
/// constraint's scalar Lagrange multiplier. The `active` flag records whether
/// the constraint is currently enforced as an equality in the working set;
/// it is the only mutable state on any factor and is toggled exclusively by
/// the solver driver between linear solves.
#[derive(Debug, Clone)]
pub struct InequalityFactor {
    keys: Vec<String>,
    rows: Vec<DMatrix<f64>>,
    bound: f64,
    dual_key: String,
    active: bool,
}

impl InequalityFactor {
    /// Create the inequality `Σᵢ aᵢᵀ·xᵢ ≤ bound` from per-variable row
    /// blocks. Every block must have exactly one row; constraints start out
    /// inactive.
    pub fn new(
        keys: &[&str],
        rows: Vec<DMatrix<f64>>,
        bound: f64,
        dual_key: &str,
    ) -> FactorResult<Self> {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        check_unique_keys(&keys)?;
        if keys.len() != rows.len() {
            return Err(FactorError::InvalidCoefficients(format!(
                "{} keys but {} coefficient blocks",
                keys.len(),
                rows.len()
            ))
            .log());
        }
        for row in &rows {
            if row.nrows() != 1 {
                return Err(FactorError::InvalidDimension {
                    expected: 1,
                    actual: row.nrows(),
                }
                .log());
            }
        }

        Ok(InequalityFactor {
            keys,
            rows,
            bound,
            dual_key: dual_key.to_owned(),
            active: false,
        })
    }

    /// Inequalities are single rows.
    pub fn dim(&self) -> usize {
        1
    }

    /// Dimension of the variable in `slot`.
    pub fn key_dim(&self, slot: usize) -> usize {
        self.rows[slot].ncols()
    }

    /// Row block for the variable in `slot` (a 1×dim matrix).
    pub fn block(&self, slot: usize) -> &DMatrix<f64> {
        &self.rows[slot]
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn dual_key(&self) -> &str {
        &self.dual_key
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Signed constraint residual `aᵀx − b` at `values`; ≤ 0 means feasible.
    pub fn residual_at(&self, values: &VectorValues) -> CoreResult<f64> {
        let mut ax = 0.0;
        for (slot, key) in self.keys.iter().enumerate() {
            let x = values.get(key).ok_or_else(|| {
                CoreError::Variable(format!("no value for variable '{key}'")).log()
            })?;
            if x.len() != self.rows[slot].ncols() {
                return Err(CoreError::DimensionMismatch(format!(
                    "variable '{}' has dimension {} but the constraint declares {}",
                    key,
                    x.len(),
                    self.rows[slot].ncols()
                ))
                .log());
            }
            ax += (&self.rows[slot] * x)[0];
        }
        Ok(ax - self.bound)
    }

    /// Directional coefficient `aᵀp` for a primal direction.
    ///
    /// Variables absent from `direction` do not move and contribute zero.
    pub fn dot_row(&self, direction: &VectorValues) -> CoreResult<f64> {
        let mut ap = 0.0;
        for (slot, key) in self.keys.iter().enumerate() {
            let Some(p) = direction.get(key) else {
                continue;
            };
            if p.len() != self.rows[slot].ncols() {
                return Err(CoreError::DimensionMismatch(format!(
                    "direction for '{}' has dimension {} but the constraint declares {}",
                    key,
                    p.len(),
                    self.rows[slot].ncols()
                ))
                .log());
            }
            ap += (&self.rows[slot] * p)[0];
        }
        Ok(ap)
    }

    /// The constraint row as an equality `aᵀx = b`, for promotion into the
    /// working-set subproblem.
    pub fn to_equality_rhs(&self) -> DVector<f64> {
        DVector::from_element(1, self.bound)
    }
}

impl Keyed for InequalityFactor {
    fn keys(&self) -> &[String] {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_construction_checks() {
        // Multi-row blocks are rejected
        let bad = InequalityFactor::new(&["x"], vec![dmatrix![1.0; 2.0]], 1.0, "d0");
        assert!(bad.is_err());

        let bad = InequalityFactor::new(&["x", "y"], vec![dmatrix![1.0]], 1.0, "d0");
        assert!(bad.is_err());
    }

    #[test]
    fn test_residual_and_direction() -> TestResult {
        // x + y ≤ 5
        let factor =
            InequalityFactor::new(&["x", "y"], vec![dmatrix![1.0], dmatrix![1.0]], 5.0, "d0")?;
        assert!(!factor.is_active());

        let mut values = VectorValues::new();
        values.insert("x", dvector![1.0])?;
        values.insert("y", dvector![4.0])?;
        assert!((factor.residual_at(&values)? - 0.0).abs() < 1e-15);

        values.insert("y", dvector![1.0])?;
        assert!((factor.residual_at(&values)? + 3.0).abs() < 1e-15);

        let mut direction = VectorValues::new();
        direction.insert("x", dvector![1.0])?;
        // y missing from the direction contributes zero
        assert!((factor.dot_row(&direction)? - 1.0).abs() < 1e-15);
        Ok(())
    }

    #[test]
    fn test_active_flag() -> TestResult {
        let mut factor = InequalityFactor::new(&["x"], vec![dmatrix![1.0]], 2.0, "d0")?;
        assert!(!factor.is_active());
        factor.set_active(true);
        assert!(factor.is_active());
        Ok(())
    }
}
