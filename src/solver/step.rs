//! Maximum feasible step along a primal direction.
//!
//! Given the current point `x_k` and a descent direction `p` computed in the
//! null space of the active constraints, the step engine finds the largest
//! α ∈ [0, 1] such that `x_k + α·p` stays feasible for every *inactive*
//! inequality, and identifies which inequality blocks first.
//!
//! For an inactive row `aᵀx ≤ b`:
//!
//! ```text
//! num = b − aᵀx_k        (slack, ≥ 0 at a feasible point)
//! den = aᵀp              (how fast the step consumes the slack)
//! ```
//!
//! `den ≤ 0` means the step moves away from (or parallel to) the constraint
//! boundary and cannot block. Otherwise the row caps the step at `num / den`.

use crate::core::CoreResult;
use crate::core::values::VectorValues;
use crate::factors::{FactorGraph, InequalityFactor};

/// Denominators with |aᵀp| below this are treated as zero.
const DEN_FLOOR: f64 = 1e-10;

/// Step candidates within this distance of the current minimum tie; the
/// lowest factor index wins.
const ALPHA_TIE_TOL: f64 = 1e-12;

/// Compute the step size α and the blocking constraint, if any.
///
/// Only inactive inequalities are examined; the active ones are already
/// enforced as equalities by the inner solve, so the direction cannot leave
/// them. Returns `(1.0, None)` when no inactive inequality blocks a full
/// step.
pub fn compute_step_size(
    working_set: &FactorGraph<InequalityFactor>,
    xk: &VectorValues,
    p: &VectorValues,
) -> CoreResult<(f64, Option<usize>)> {
    let mut best_alpha = f64::INFINITY;
    let mut blocking = None;

    for (position, factor) in working_set.iter().enumerate() {
        if factor.is_active() {
            continue;
        }

        let den = factor.dot_row(p)?;
        if den <= DEN_FLOOR {
            continue;
        }

        let num = -factor.residual_at(xk)?;
        let alpha = num / den;
        if alpha < best_alpha - ALPHA_TIE_TOL {
            best_alpha = alpha;
            blocking = Some(position);
        }
    }

    if best_alpha < 1.0 {
        Ok((best_alpha, blocking))
    } else {
        Ok((1.0, None))
    }
}
