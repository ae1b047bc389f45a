//! Quadratic cost factors.
//!
//! A `HessianFactor` contributes the term
//!
//! ```text
//! ½·xᵀ G x − gᵀ x + ½·f0
//! ```
//!
//! to the objective, where `x` is the stacked value of the factor's ordered
//! variable tuple. `G` is stored as one symmetric information matrix over the
//! factor's combined dimension; per-variable blocks are exposed as views.
//!
//! The gradient of the factor at a point, restricted to one of its variables,
//! is what the dual-graph builder needs to assemble stationarity rows:
//!
//! ```text
//! ∇f(xᵢ) = Σⱼ G_ij·xⱼ − gᵢ
//! ```

use nalgebra::{DMatrix, DMatrixView, DVector, DVectorView};

use crate::core::values::VectorValues;
use crate::core::{CoreError, CoreResult};
use crate::factors::{FactorError, FactorResult, Keyed, check_unique_keys};

/// Symmetry check threshold for the information matrix, relative to its
/// largest entry.
const SYMMETRY_TOL: f64 = 1e-12;

/// A quadratic cost term over a small ordered tuple of variables.
#[derive(Debug, Clone)]
pub struct HessianFactor {
    keys: Vec<String>,
    dims: Vec<usize>,
    offsets: Vec<usize>,
    info: DMatrix<f64>,
    linear: DVector<f64>,
    constant: f64,
}

impl HessianFactor {
    /// Create a cost factor from the symmetric information matrix `info` (G),
    /// linear term `linear` (g), and constant `constant` (f0).
    ///
    /// `dims` gives each key's dimension; `info` must be square of the summed
    /// dimension and symmetric, `linear` of the summed dimension.
    pub fn new(
        keys: &[&str],
        dims: &[usize],
        info: DMatrix<f64>,
        linear: DVector<f64>,
        constant: f64,
    ) -> FactorResult<Self> {
        let keys: Vec<String> = keys.iter().map(|k| (*k).to_owned()).collect();
        check_unique_keys(&keys)?;
        if keys.len() != dims.len() {
            return Err(FactorError::InvalidCoefficients(format!(
                "{} keys but {} dimensions",
                keys.len(),
                dims.len()
            ))
            .log());
        }

        let total: usize = dims.iter().sum();
        if info.nrows() != total || info.ncols() != total {
            return Err(FactorError::InvalidDimension {
                expected: total,
                actual: info.nrows().max(info.ncols()),
            }
            .log());
        }
        if linear.len() != total {
            return Err(FactorError::InvalidDimension {
                expected: total,
                actual: linear.len(),
            }
            .log());
        }

        let scale = info.iter().fold(1.0_f64, |acc, &v| acc.max(v.abs()));
        for i in 0..total {
            for j in (i + 1)..total {
                if (info[(i, j)] - info[(j, i)]).abs() > SYMMETRY_TOL * scale {
                    return Err(FactorError::InvalidCoefficients(format!(
                        "information matrix is not symmetric at ({i}, {j})"
                    ))
                    .log());
                }
            }
        }

        let mut offsets = Vec::with_capacity(dims.len());
        let mut offset = 0;
        for &dim in dims {
            offsets.push(offset);
            offset += dim;
        }

        Ok(HessianFactor {
            keys,
            dims: dims.to_vec(),
            offsets,
            info,
            linear,
            constant,
        })
    }

    /// Convenience constructor for a factor over a single variable.
    pub fn unary(key: &str, info: DMatrix<f64>, linear: DVector<f64>) -> FactorResult<Self> {
        let dim = linear.len();
        HessianFactor::new(&[key], &[dim], info, linear, 0.0)
    }

    /// Total row/column dimension of the information matrix.
    pub fn total_dim(&self) -> usize {
        self.linear.len()
    }

    /// Dimension of the variable in `slot`.
    pub fn key_dim(&self, slot: usize) -> usize {
        self.dims[slot]
    }

    /// The G block coupling the variables in slots `i` and `j`.
    pub fn block(&self, i: usize, j: usize) -> DMatrixView<'_, f64> {
        self.info
            .view((self.offsets[i], self.offsets[j]), (self.dims[i], self.dims[j]))
    }

    /// The g sub-vector for the variable in `slot`.
    pub fn linear_term(&self, slot: usize) -> DVectorView<'_, f64> {
        self.linear.rows(self.offsets[slot], self.dims[slot])
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Gradient of this factor at `values`, restricted to the variable in
    /// `slot`: `Σⱼ G_slot,j·xⱼ − g_slot`.
    pub fn gradient_at(&self, slot: usize, values: &VectorValues) -> CoreResult<DVector<f64>> {
        let mut grad = DVector::zeros(self.dims[slot]);
        for (j, key) in self.keys.iter().enumerate() {
            let xj = values.get(key).ok_or_else(|| {
                CoreError::Variable(format!("no value for variable '{key}'")).log()
            })?;
            if xj.len() != self.dims[j] {
                return Err(CoreError::DimensionMismatch(format!(
                    "variable '{}' has dimension {} but the factor declares {}",
                    key,
                    xj.len(),
                    self.dims[j]
                ))
                .log());
            }
            grad += self.block(slot, j) * xj;
        }
        grad -= self.linear_term(slot);
        Ok(grad)
    }

    /// Objective contribution ½·xᵀGx − gᵀx + ½·f0 at `values`.
    pub fn value_at(&self, values: &VectorValues) -> CoreResult<f64> {
        let mut x = DVector::zeros(self.total_dim());
        for (slot, key) in self.keys.iter().enumerate() {
            let xi = values.get(key).ok_or_else(|| {
                CoreError::Variable(format!("no value for variable '{key}'")).log()
            })?;
            if xi.len() != self.dims[slot] {
                return Err(CoreError::DimensionMismatch(format!(
                    "variable '{}' has dimension {} but the factor declares {}",
                    key,
                    xi.len(),
                    self.dims[slot]
                ))
                .log());
            }
            x.rows_mut(self.offsets[slot], self.dims[slot]).copy_from(xi);
        }
        Ok(0.5 * (&self.info * &x).dot(&x) - self.linear.dot(&x) + 0.5 * self.constant)
    }
}

impl Keyed for HessianFactor {
    fn keys(&self) -> &[String] {
        &self.keys
    }
}
