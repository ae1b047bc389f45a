//! Quadratic program definition.
//!
//! The `Qp` struct is the immutable problem container: three factor graphs
//! (quadratic costs, linear equalities, linear inequalities) plus the key
//! dimension table they jointly imply. It plays the same coordinating role
//! for the QP solver that a problem container plays for a nonlinear
//! least-squares optimizer: factors are added once, the dimension of every
//! referenced variable is fixed at first use, and the solver borrows the
//! finished problem immutably for the whole optimize call.
//!
//! ```text
//! minimize   ½ xᵀ G x − gᵀ x + ½ f0       (cost graph)
//! subject to A_eq · x = b_eq              (equality graph)
//!            A_in · x ≤ b_in              (inequality graph)
//! ```
//!
//! # Example
//!
//! ```
//! use apex_qp::core::problem::Qp;
//! use apex_qp::factors::{HessianFactor, InequalityFactor};
//! use nalgebra::{dmatrix, dvector};
//!
//! // minimize ½(x − 3)²  subject to  x ≤ 2
//! let mut qp = Qp::new();
//! qp.add_cost(HessianFactor::unary("x", dmatrix![1.0], dvector![3.0]).unwrap())
//!     .unwrap();
//! qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0]], 2.0, "d0").unwrap())
//!     .unwrap();
//!
//! assert_eq!(qp.dim_of("x"), Some(1));
//! ```

use std::collections::{HashMap, HashSet};

use crate::core::values::VectorValues;
use crate::core::{CoreError, CoreResult};
use crate::factors::graph::FactorGraph;
use crate::factors::{EqualityFactor, HessianFactor, InequalityFactor, Keyed};

/// An immutable quadratic program expressed as three factor graphs.
#[derive(Debug, Clone, Default)]
pub struct Qp {
    cost: FactorGraph<HessianFactor>,
    equalities: FactorGraph<EqualityFactor>,
    inequalities: FactorGraph<InequalityFactor>,

    /// Dimension of every variable referenced by any factor, fixed at first
    /// reference.
    key_dims: HashMap<String, usize>,

    /// Dual keys claimed by constraint factors; must be unique across the
    /// equality and inequality graphs.
    dual_keys: HashSet<String>,
}

impl Qp {
    pub fn new() -> Self {
        Qp::default()
    }

    /// Add a quadratic cost factor, returning its position in the cost graph.
    pub fn add_cost(&mut self, factor: HessianFactor) -> CoreResult<usize> {
        let dims: Vec<usize> = (0..factor.keys().len()).map(|s| factor.key_dim(s)).collect();
        self.register_dims(factor.keys(), &dims)?;
        Ok(self.cost.push(factor))
    }

    /// Add a linear equality constraint, returning its position in the
    /// equality graph.
    pub fn add_equality(&mut self, factor: EqualityFactor) -> CoreResult<usize> {
        let dims: Vec<usize> = (0..factor.keys().len()).map(|s| factor.key_dim(s)).collect();
        self.register_dims(factor.keys(), &dims)?;
        self.register_dual_key(factor.dual_key())?;
        Ok(self.equalities.push(factor))
    }

    /// Add a linear inequality constraint, returning its position in the
    /// inequality graph.
    pub fn add_inequality(&mut self, factor: InequalityFactor) -> CoreResult<usize> {
        let dims: Vec<usize> = (0..factor.keys().len()).map(|s| factor.key_dim(s)).collect();
        self.register_dims(factor.keys(), &dims)?;
        self.register_dual_key(factor.dual_key())?;
        Ok(self.inequalities.push(factor))
    }

    pub fn cost(&self) -> &FactorGraph<HessianFactor> {
        &self.cost
    }

    pub fn equalities(&self) -> &FactorGraph<EqualityFactor> {
        &self.equalities
    }

    pub fn inequalities(&self) -> &FactorGraph<InequalityFactor> {
        &self.inequalities
    }

    /// Dimension of `key`, if any factor references it.
    pub fn dim_of(&self, key: &str) -> Option<usize> {
        self.key_dims.get(key).copied()
    }

    /// All referenced variable names in lexicographic order.
    pub fn sorted_keys(&self) -> Vec<&String> {
        let mut keys: Vec<_> = self.key_dims.keys().collect();
        keys.sort();
        keys
    }

    /// Verify that `values` assigns every referenced variable a vector of
    /// its declared dimension.
    pub fn check_values(&self, values: &VectorValues) -> CoreResult<()> {
        for (key, &dim) in &self.key_dims {
            match values.get(key) {
                Some(v) if v.len() == dim => {}
                Some(v) => {
                    return Err(CoreError::DimensionMismatch(format!(
                        "variable '{}' has dimension {} but the problem declares {}",
                        key,
                        v.len(),
                        dim
                    ))
                    .log());
                }
                None => {
                    return Err(CoreError::Variable(format!(
                        "initial values missing variable '{key}'"
                    ))
                    .log());
                }
            }
        }
        Ok(())
    }

    /// Total objective ½xᵀGx − gᵀx + ½f0 at `values`.
    pub fn objective_value(&self, values: &VectorValues) -> CoreResult<f64> {
        let mut total = 0.0;
        for factor in self.cost.iter() {
            total += factor.value_at(values)?;
        }
        Ok(total)
    }

    fn register_dims(&mut self, keys: &[String], dims: &[usize]) -> CoreResult<()> {
        for (key, &dim) in keys.iter().zip(dims) {
            match self.key_dims.get(key) {
                Some(&existing) if existing != dim => {
                    return Err(CoreError::DimensionMismatch(format!(
                        "variable '{key}' declared with dimension {existing}, factor uses {dim}"
                    ))
                    .log());
                }
                Some(_) => {}
                None => {
                    self.key_dims.insert(key.clone(), dim);
                }
            }
        }
        Ok(())
    }

    fn register_dual_key(&mut self, dual_key: &str) -> CoreResult<()> {
        if !self.dual_keys.insert(dual_key.to_owned()) {
            return Err(CoreError::InvalidInput(format!(
                "dual key '{dual_key}' is already claimed by another constraint"
            ))
            .log());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_dimension_registration() -> TestResult {
        let mut qp = Qp::new();
        qp.add_cost(HessianFactor::unary(
            "x",
            dmatrix![1.0, 0.0; 0.0, 1.0],
            dvector![0.0, 0.0],
        )?)?;
        assert_eq!(qp.dim_of("x"), Some(2));

        // A factor disagreeing on x's dimension is rejected
        let result = qp.add_inequality(InequalityFactor::new(
            &["x"],
            vec![dmatrix![1.0]],
            1.0,
            "d0",
        )?);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_duplicate_dual_keys_rejected() -> TestResult {
        let mut qp = Qp::new();
        qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0]], 1.0, "d0")?)?;
        let result =
            qp.add_inequality(InequalityFactor::new(&["x"], vec![dmatrix![1.0]], 2.0, "d0")?);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn test_check_values() -> TestResult {
        let mut qp = Qp::new();
        qp.add_cost(HessianFactor::unary("x", dmatrix![1.0], dvector![3.0])?)?;

        let mut good = VectorValues::new();
        good.insert("x", dvector![0.0])?;
        assert!(qp.check_values(&good).is_ok());

        let empty = VectorValues::new();
        assert!(qp.check_values(&empty).is_err());

        let mut wrong = VectorValues::new();
        wrong.insert("x", dvector![0.0, 0.0])?;
        assert!(qp.check_values(&wrong).is_err());
        Ok(())
    }

    #[test]
    fn test_objective_value() -> TestResult {
        // ½(x − 3)² = ½x² − 3x + 4.5
        let mut qp = Qp::new();
        qp.add_cost(HessianFactor::new(
            &["x"],
            &[1],
            dmatrix![1.0],
            dvector![3.0],
            9.0,
        )?)?;

        let mut at_min = VectorValues::new();
        at_min.insert("x", dvector![3.0])?;
        assert!((qp.objective_value(&at_min)? - 0.0).abs() < 1e-15);

        let mut at_zero = VectorValues::new();
        at_zero.insert("x", dvector![0.0])?;
        assert!((qp.objective_value(&at_zero)? - 4.5).abs() < 1e-15);
        Ok(())
    }
}
