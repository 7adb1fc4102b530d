//! Balance scoring and agent-vs-oracle accuracy.

use serde::Serialize;

use crate::error::{DispatchError, Result};

/// How balanced a final zone state is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceScore {
    /// `w·perfect_fraction + (1 − w)·(1 − normalized_imbalance)`, in `[0, 1]`.
    pub score: f64,
    /// Share of zones with zero imbalance.
    pub perfect_fraction: f64,
    /// Total absolute imbalance over total riders, clamped to `[0, 1]`.
    pub normalized_imbalance: f64,
}

/// Score `state` (per-zone `riders − drivers`) against the rider counts.
///
/// With no riders at all the normalized imbalance is 0 for a balanced state
/// and 1 otherwise.
pub fn balance_score(state: &[i64], riders: &[u32], perfect_zone_weight: f64) -> Result<BalanceScore> {
    if state.len() != riders.len() {
        return Err(DispatchError::ShapeMismatch {
            what: "state and rider counts",
            expected: riders.len(),
            actual: state.len(),
        });
    }

    let zones = state.len().max(1) as f64;
    let perfect_fraction = state.iter().filter(|&&v| v == 0).count() as f64 / zones;
    let abs_imbalance: i64 = state.iter().map(|v| v.abs()).sum();
    let total_riders: u64 = riders.iter().map(|&r| u64::from(r)).sum();
    let normalized_imbalance = if total_riders == 0 {
        if abs_imbalance == 0 {
            0.0
        } else {
            1.0
        }
    } else {
        (abs_imbalance as f64 / total_riders as f64).clamp(0.0, 1.0)
    };

    Ok(BalanceScore {
        score: perfect_zone_weight * perfect_fraction
            + (1.0 - perfect_zone_weight) * (1.0 - normalized_imbalance),
        perfect_fraction,
        normalized_imbalance,
    })
}

/// How closely the agent's final state tracks the greedy oracle's.
///
/// The oracle is a reachable balance, not an optimum, so these numbers
/// measure agreement with it rather than distance from the best plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RebalanceAccuracy {
    /// `0.6·perfect_zones + 0.4·state_similarity`.
    pub overall: f64,
    /// Share of the oracle's balanced zones the agent balanced too.
    pub perfect_zones: f64,
    /// `1 − Σ|agent − oracle| / max(Σ|oracle|, 1)`, clamped to `[0, 1]`.
    pub state_similarity: f64,
}

pub fn accuracy_vs_oracle(agent_state: &[i64], oracle_state: &[i64]) -> Result<RebalanceAccuracy> {
    if agent_state.len() != oracle_state.len() {
        return Err(DispatchError::ShapeMismatch {
            what: "agent and oracle states",
            expected: oracle_state.len(),
            actual: agent_state.len(),
        });
    }

    let oracle_perfect = oracle_state.iter().filter(|&&v| v == 0).count();
    let both_perfect = agent_state
        .iter()
        .zip(oracle_state)
        .filter(|&(&a, &o)| a == 0 && o == 0)
        .count();
    let perfect_zones = if oracle_perfect > 0 {
        both_perfect as f64 / oracle_perfect as f64
    } else {
        0.0
    };

    let diff: i64 = agent_state
        .iter()
        .zip(oracle_state)
        .map(|(a, o)| (a - o).abs())
        .sum();
    let oracle_abs: i64 = oracle_state.iter().map(|v| v.abs()).sum();
    let state_similarity = (1.0 - diff as f64 / oracle_abs.max(1) as f64).clamp(0.0, 1.0);

    Ok(RebalanceAccuracy {
        overall: 0.6 * perfect_zones + 0.4 * state_similarity,
        perfect_zones,
        state_similarity,
    })
}
