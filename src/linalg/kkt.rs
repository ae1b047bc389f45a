//! Sparse elimination of equality-constrained Gaussian factor graphs.
//!
//! The backend assembles the graph into one of three sparse systems,
//! depending on what the graph contains:
//!
//! - **Soft factors only** (quadratic costs, Gaussian rows): the normal
//!   equations `H·x = g` with `H = G + Σ AᵀA`, solved by sparse Cholesky.
//! - **Hard rows only**: the stationarity system `C·x = d` is solved through
//!   its normal equations `CᵀC·x = Cᵀd`, again by sparse Cholesky. This is
//!   the dual-graph path, where the rows are exact and consistent.
//! - **Both**: the KKT system
//!
//!   ```text
//!   [ H  Cᵀ ] [x]   [ g ]
//!   [ C  0  ] [ν] = [ d ]
//!   ```
//!
//!   solved by sparse LU, since the indefinite KKT matrix rules out
//!   Cholesky. The auxiliary multipliers ν are discarded; callers recover
//!   the multipliers they care about through the dual graph.
//!
//! Variables are laid out in lexicographic key order, which fixes the
//! elimination order and makes solves deterministic. A factorization failure
//! or a non-finite solution surfaces as [`LinAlgError::IndeterminateSystem`].

use std::collections::HashMap;
use std::ops::Mul;

use faer::{
    Mat, Side,
    linalg::solvers::Solve,
    sparse::linalg::solvers::{Llt, Lu, SymbolicLlt, SymbolicLu},
    sparse::{SparseColMat, Triplet},
};
use nalgebra::DVector;

use crate::core::values::VectorValues;
use crate::factors::{GaussianFactor, GaussianFactorGraph, Keyed, NoiseModel};
use crate::linalg::{GaussianGraphSolver, LinAlgError, LinAlgResult};

/// Direct sparse solver for equality-constrained Gaussian graphs.
#[derive(Debug, Clone, Default)]
pub struct SparseKktSolver;

impl SparseKktSolver {
    pub fn new() -> Self {
        SparseKktSolver
    }
}

/// Column layout of the graph's variables, in lexicographic key order.
struct VariableLayout {
    /// (key, column offset, dimension), sorted by key
    columns: Vec<(String, usize, usize)>,
    by_key: HashMap<String, (usize, usize)>,
    total: usize,
}

impl VariableLayout {
    fn from_graph(graph: &GaussianFactorGraph) -> LinAlgResult<Self> {
        let mut dims: HashMap<String, usize> = HashMap::new();
        for factor in graph.iter() {
            match factor {
                GaussianFactor::Hessian(f) => {
                    for (slot, key) in f.keys().iter().enumerate() {
                        register_dim(&mut dims, key, f.key_dim(slot))?;
                    }
                }
                GaussianFactor::Jacobian(f) => {
                    for (slot, key) in f.keys().iter().enumerate() {
                        register_dim(&mut dims, key, f.key_dim(slot))?;
                    }
                }
            }
        }

        let mut keys: Vec<String> = dims.keys().cloned().collect();
        keys.sort();

        let mut columns = Vec::with_capacity(keys.len());
        let mut by_key = HashMap::with_capacity(keys.len());
        let mut offset = 0;
        for key in keys {
            let dim = dims[&key];
            columns.push((key.clone(), offset, dim));
            by_key.insert(key, (offset, dim));
            offset += dim;
        }

        Ok(VariableLayout {
            columns,
            by_key,
            total: offset,
        })
    }

    fn offset_of(&self, key: &str) -> (usize, usize) {
        self.by_key[key]
    }
}

fn register_dim(dims: &mut HashMap<String, usize>, key: &str, dim: usize) -> LinAlgResult<()> {
    match dims.get(key) {
        Some(&existing) if existing != dim => Err(LinAlgError::DimensionMismatch(format!(
            "variable '{key}' appears with dimensions {existing} and {dim}"
        ))
        .log()),
        Some(_) => Ok(()),
        None => {
            dims.insert(key.to_owned(), dim);
            Ok(())
        }
    }
}

/// Accumulated sparse pieces of the graph: soft normal equations (H, g) and
/// hard rows (C, d).
struct Assembly {
    h_entries: HashMap<(usize, usize), f64>,
    g: Mat<f64>,
    c_triplets: Vec<Triplet<usize, usize, f64>>,
    d_entries: Vec<f64>,
    has_soft: bool,
}

impl Assembly {
    fn from_graph(graph: &GaussianFactorGraph, layout: &VariableLayout) -> Self {
        let mut assembly = Assembly {
            h_entries: HashMap::new(),
            g: Mat::zeros(layout.total, 1),
            c_triplets: Vec::new(),
            d_entries: Vec::new(),
            has_soft: false,
        };

        for factor in graph.iter() {
            match factor {
                GaussianFactor::Hessian(f) => {
                    assembly.has_soft = true;
                    for (i, key_i) in f.keys().iter().enumerate() {
                        let (off_i, dim_i) = layout.offset_of(key_i);
                        for (j, key_j) in f.keys().iter().enumerate() {
                            let (off_j, dim_j) = layout.offset_of(key_j);
                            let block = f.block(i, j);
                            for r in 0..dim_i {
                                for c in 0..dim_j {
                                    let value = block[(r, c)];
                                    if value != 0.0 {
                                        *assembly
                                            .h_entries
                                            .entry((off_i + r, off_j + c))
                                            .or_insert(0.0) += value;
                                    }
                                }
                            }
                        }
                        let linear = f.linear_term(i);
                        for r in 0..dim_i {
                            assembly.g[(off_i + r, 0)] += linear[r];
                        }
                    }
                }
                GaussianFactor::Jacobian(f) if f.noise() == NoiseModel::Gaussian => {
                    assembly.has_soft = true;
                    // Soft row contributes AᵀA to H and Aᵀb to g
                    for (i, key_i) in f.keys().iter().enumerate() {
                        let (off_i, dim_i) = layout.offset_of(key_i);
                        for (j, key_j) in f.keys().iter().enumerate() {
                            let (off_j, dim_j) = layout.offset_of(key_j);
                            let ata = f.block(i).transpose() * f.block(j);
                            for r in 0..dim_i {
                                for c in 0..dim_j {
                                    let value = ata[(r, c)];
                                    if value != 0.0 {
                                        *assembly
                                            .h_entries
                                            .entry((off_i + r, off_j + c))
                                            .or_insert(0.0) += value;
                                    }
                                }
                            }
                        }
                        let atb = f.block(i).transpose() * f.rhs();
                        for r in 0..dim_i {
                            assembly.g[(off_i + r, 0)] += atb[r];
                        }
                    }
                }
                GaussianFactor::Jacobian(f) => {
                    let row_offset = assembly.d_entries.len();
                    for (slot, key) in f.keys().iter().enumerate() {
                        let (offset, dim) = layout.offset_of(key);
                        let block = f.block(slot);
                        for r in 0..f.dim() {
                            for c in 0..dim {
                                let value = block[(r, c)];
                                if value != 0.0 {
                                    assembly.c_triplets.push(Triplet::new(
                                        row_offset + r,
                                        offset + c,
                                        value,
                                    ));
                                }
                            }
                        }
                    }
                    assembly
                        .d_entries
                        .extend(f.rhs().iter().copied());
                }
            }
        }

        assembly
    }

    fn hard_rows(&self) -> usize {
        self.d_entries.len()
    }

    /// Sorted H triplets for deterministic sparse construction.
    fn h_triplets(&self) -> Vec<Triplet<usize, usize, f64>> {
        let mut entries: Vec<_> = self.h_entries.iter().collect();
        entries.sort_by_key(|((r, c), _)| (*c, *r));
        entries
            .into_iter()
            .map(|(&(r, c), &v)| Triplet::new(r, c, v))
            .collect()
    }
}

impl GaussianGraphSolver for SparseKktSolver {
    fn solve(&self, graph: &GaussianFactorGraph) -> LinAlgResult<VectorValues> {
        let layout = VariableLayout::from_graph(graph)?;
        if layout.total == 0 {
            return Ok(VectorValues::new());
        }

        let assembly = Assembly::from_graph(graph, &layout);
        let n = layout.total;
        let m = assembly.hard_rows();

        let solution = if m == 0 {
            solve_normal(n, &assembly.h_triplets(), &assembly.g)?
        } else if !assembly.has_soft {
            solve_hard_rows(n, &assembly)?
        } else {
            solve_kkt(n, &assembly)?
        };

        check_finite(&solution)?;
        extract_values(&solution, &layout)
    }
}

/// Solve `H·x = g` by sparse Cholesky.
fn solve_normal(
    n: usize,
    h_triplets: &[Triplet<usize, usize, f64>],
    g: &Mat<f64>,
) -> LinAlgResult<Mat<f64>> {
    let hessian = SparseColMat::try_new_from_triplets(n, n, h_triplets).map_err(|e| {
        LinAlgError::SparseMatrixCreation("Failed to create Hessian matrix".to_string())
            .log_with_source(e)
    })?;

    let sym = SymbolicLlt::try_new(hessian.symbolic(), Side::Lower).map_err(|e| {
        LinAlgError::FactorizationFailed("Symbolic Cholesky decomposition failed".to_string())
            .log_with_source(e)
    })?;
    let cholesky = Llt::try_new_with_symbolic(sym, hessian.as_ref(), Side::Lower)
        .map_err(|e| LinAlgError::IndeterminateSystem.log_with_source(e))?;

    Ok(cholesky.solve(g))
}

/// Solve the consistent system `C·x = d` through its normal equations.
fn solve_hard_rows(n: usize, assembly: &Assembly) -> LinAlgResult<Mat<f64>> {
    let m = assembly.hard_rows();
    let c = SparseColMat::try_new_from_triplets(m, n, &assembly.c_triplets).map_err(|e| {
        LinAlgError::SparseMatrixCreation("Failed to create constraint matrix".to_string())
            .log_with_source(e)
    })?;
    let d = Mat::from_fn(m, 1, |i, _| assembly.d_entries[i]);

    // CᵀC x = Cᵀd
    let ct = c.as_ref().transpose().to_col_major().map_err(|e| {
        LinAlgError::MatrixConversion(
            "Failed to convert transposed constraint matrix to column-major format".to_string(),
        )
        .log_with_source(e)
    })?;
    let normal = ct.mul(c.as_ref());
    let rhs = c.as_ref().transpose().mul(&d);

    let sym = SymbolicLlt::try_new(normal.symbolic(), Side::Lower).map_err(|e| {
        LinAlgError::FactorizationFailed("Symbolic Cholesky decomposition failed".to_string())
            .log_with_source(e)
    })?;
    let cholesky = Llt::try_new_with_symbolic(sym, normal.as_ref(), Side::Lower)
        .map_err(|e| LinAlgError::IndeterminateSystem.log_with_source(e))?;

    Ok(cholesky.solve(&rhs))
}

/// Solve the full KKT system and return the primal part.
fn solve_kkt(n: usize, assembly: &Assembly) -> LinAlgResult<Mat<f64>> {
    let m = assembly.hard_rows();
    let size = n + m;

    let mut triplets = assembly.h_triplets();
    for t in &assembly.c_triplets {
        // C in the lower-left block, Cᵀ in the upper-right
        triplets.push(Triplet::new(n + t.row, t.col, t.val));
        triplets.push(Triplet::new(t.col, n + t.row, t.val));
    }

    let kkt = SparseColMat::try_new_from_triplets(size, size, &triplets).map_err(|e| {
        LinAlgError::SparseMatrixCreation("Failed to create KKT matrix".to_string())
            .log_with_source(e)
    })?;

    let mut rhs = Mat::zeros(size, 1);
    for i in 0..n {
        rhs[(i, 0)] = assembly.g[(i, 0)];
    }
    for (i, &d) in assembly.d_entries.iter().enumerate() {
        rhs[(n + i, 0)] = d;
    }

    let sym = SymbolicLu::try_new(kkt.symbolic()).map_err(|e| {
        LinAlgError::FactorizationFailed("Symbolic LU decomposition failed".to_string())
            .log_with_source(e)
    })?;
    let lu = Lu::try_new_with_symbolic(sym, kkt.as_ref())
        .map_err(|e| LinAlgError::IndeterminateSystem.log_with_source(e))?;

    let full = lu.solve(&rhs);

    // Keep the primal rows, drop the auxiliary multipliers
    Ok(Mat::from_fn(n, 1, |i, _| full[(i, 0)]))
}

fn check_finite(solution: &Mat<f64>) -> LinAlgResult<()> {
    for i in 0..solution.nrows() {
        if !solution[(i, 0)].is_finite() {
            return Err(LinAlgError::IndeterminateSystem.log());
        }
    }
    Ok(())
}

fn extract_values(solution: &Mat<f64>, layout: &VariableLayout) -> LinAlgResult<VectorValues> {
    let mut values = VectorValues::new();
    for (key, offset, dim) in &layout.columns {
        let v = DVector::from_fn(*dim, |i, _| solution[(offset + i, 0)]);
        values.insert(key, v).map_err(|e| {
            LinAlgError::DimensionMismatch(format!("failed to store solution for '{key}'"))
                .log_with_source(e)
        })?;
    }
    Ok(values)
}
