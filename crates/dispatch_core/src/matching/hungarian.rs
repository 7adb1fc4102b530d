//! Exact minimum-cost assignment via Kuhn-Munkres.
//!
//! `pathfinding` maximizes total weight over integer matrices with
//! `rows <= columns`, so costs are negated, scaled to integers, and the
//! matrix is transposed when there are more riders than drivers.

use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

use super::cost::CostMatrix;

/// Scale factor from cost units to integer weights (1e-3 resolution).
const SCALE: f64 = 1_000.0;

/// Weight for infeasible pairs. Worse than any feasible weight, yet small
/// enough that pathfinding's internal sums cannot overflow i64.
const INFEASIBLE: i64 = -1_000_000_000_000_i64;

/// Simple matrix type implementing pathfinding's Weights for i64.
struct I64Weights(Vec<Vec<i64>>);

impl Weights<i64> for I64Weights {
    fn rows(&self) -> usize {
        self.0.len()
    }

    fn columns(&self) -> usize {
        self.0.first().map_or(0, |r| r.len())
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }

    fn neg(&self) -> Self {
        I64Weights(
            self.0
                .iter()
                .map(|r| r.iter().map(|&x| x.saturating_neg()).collect())
                .collect(),
        )
    }
}

/// Convert a cost to a maximization weight, clamped above [`INFEASIBLE`].
fn cost_to_weight(cost: f64) -> i64 {
    let w = -(cost * SCALE).round();
    if w.is_nan() || w <= INFEASIBLE as f64 {
        INFEASIBLE + 1
    } else if w >= 0.0 {
        w.min(-(INFEASIBLE as f64)) as i64
    } else {
        w as i64
    }
}

/// Solve the assignment problem over `costs`.
///
/// Returns `(row, col)` pairs sorted by row. Rows or columns left over when
/// the sizes differ stay unassigned, and pairs whose cost marks them
/// infeasible are never returned.
pub fn solve_assignment(costs: &CostMatrix) -> Vec<(usize, usize)> {
    let (rows, cols) = (costs.rows(), costs.cols());
    if rows == 0 || cols == 0 {
        return Vec::new();
    }

    // Kuhn-Munkres requires rows <= columns. So we use the smaller set as rows.
    let transposed = rows > cols;
    let (n, m) = if transposed { (cols, rows) } else { (rows, cols) };
    let weight_at = |i: usize, j: usize| {
        let (r, c) = if transposed { (j, i) } else { (i, j) };
        if costs.is_infeasible(r, c) {
            INFEASIBLE
        } else {
            cost_to_weight(costs.at(r, c))
        }
    };
    let weights = I64Weights(
        (0..n)
            .map(|i| (0..m).map(|j| weight_at(i, j)).collect())
            .collect(),
    );

    // Only run if at least one feasible pair exists (avoid churn on all INFEASIBLE)
    let has_feasible = (0..n).any(|i| (0..m).any(|j| weights.at(i, j) > INFEASIBLE));
    if !has_feasible {
        return Vec::new();
    }

    let (_total, assignments) = kuhn_munkres(&weights);

    let mut pairs: Vec<(usize, usize)> = assignments
        .iter()
        .enumerate()
        .filter(|&(i, &j)| j < m && weights.at(i, j) > INFEASIBLE)
        .map(|(i, &j)| if transposed { (j, i) } else { (i, j) })
        .collect();
    pairs.sort_unstable();
    pairs
}
