//! Greedy balancing reference used to judge the learned policy.
//!
//! The oracle repeatedly takes the first surplus → deficit pair in zone order
//! and moves as many drivers as both sides can use. It ignores distance and
//! is not cost-optimal: it shows a balance that is achievable, not the best
//! relocation plan.

use serde::Serialize;

use crate::environment::imbalance_state;
use crate::error::{DispatchError, Result};
use crate::zone::{Move, ZoneSnapshot};

/// Final state of a greedy balancing run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OracleOutcome {
    pub final_state: Vec<i64>,
    pub final_drivers: Vec<u32>,
    pub moves: Vec<Move>,
    /// Scan passes performed, at most `zones²`.
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyOracle;

impl GreedyOracle {
    pub fn solve(&self, riders: &[u32], drivers: &[u32]) -> Result<OracleOutcome> {
        if riders.len() != drivers.len() {
            return Err(DispatchError::ShapeMismatch {
                what: "rider and driver counts",
                expected: riders.len(),
                actual: drivers.len(),
            });
        }

        let zones = riders.len();
        let mut drivers = drivers.to_vec();
        let mut state = imbalance_state(riders, &drivers);
        let mut moves = Vec::new();
        let mut iterations = 0;

        while iterations < zones * zones {
            iterations += 1;
            let Some((from, to)) = first_pair(&state) else {
                break;
            };
            // Both sides are non-zero with opposite signs, so count >= 1.
            let count = (-state[from]).min(state[to]);
            let count = u32::try_from(count).unwrap_or(u32::MAX).min(drivers[from]);
            drivers[from] -= count;
            drivers[to] = drivers[to].saturating_add(count);
            state[from] += i64::from(count);
            state[to] -= i64::from(count);
            moves.push(Move::new(from, to, count));
        }

        tracing::debug!(zones, moves = moves.len(), iterations, "greedy oracle finished");
        Ok(OracleOutcome {
            final_state: state,
            final_drivers: drivers,
            moves,
            iterations,
        })
    }

    pub fn solve_snapshot(&self, snapshot: &ZoneSnapshot) -> Result<OracleOutcome> {
        self.solve(&snapshot.riders(), &snapshot.drivers())
    }
}

fn first_pair(state: &[i64]) -> Option<(usize, usize)> {
    let to = state.iter().position(|&v| v > 0)?;
    let from = state.iter().position(|&v| v < 0)?;
    Some((from, to))
}
