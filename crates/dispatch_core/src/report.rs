//! Serializable outcome of a learned rebalancing run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::oracle::OracleOutcome;
use crate::score::{BalanceScore, RebalanceAccuracy};
use crate::zone::{Move, ZoneSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceStatus {
    Balanced,
    Surplus,
    Deficit,
}

impl BalanceStatus {
    pub fn of(imbalance: i64) -> Self {
        match imbalance {
            0 => Self::Balanced,
            v if v < 0 => Self::Surplus,
            _ => Self::Deficit,
        }
    }
}

/// Before/after view of one zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneReport {
    pub zone_index: usize,
    pub zone_id: String,
    pub initial_riders: u32,
    pub initial_drivers: u32,
    pub final_drivers_agent: u32,
    pub final_balance_agent: i64,
    pub is_balanced_agent: bool,
    pub balance_status: BalanceStatus,
    pub imbalance_magnitude: u64,
    pub final_drivers_oracle: u32,
    pub final_balance_oracle: i64,
    pub is_balanced_oracle: bool,
}

impl ZoneReport {
    /// One entry per zone of `snapshot`. The state and driver slices must be
    /// zone-aligned with it.
    pub fn for_zones(
        snapshot: &ZoneSnapshot,
        agent_drivers: &[u32],
        agent_state: &[i64],
        oracle: &OracleOutcome,
    ) -> Vec<Self> {
        snapshot
            .zones()
            .iter()
            .enumerate()
            .map(|(idx, zone)| {
                let agent_balance = agent_state.get(idx).copied().unwrap_or_default();
                let oracle_balance = oracle.final_state.get(idx).copied().unwrap_or_default();
                Self {
                    zone_index: idx,
                    zone_id: zone.id.clone(),
                    initial_riders: zone.riders,
                    initial_drivers: zone.drivers,
                    final_drivers_agent: agent_drivers.get(idx).copied().unwrap_or_default(),
                    final_balance_agent: agent_balance,
                    is_balanced_agent: agent_balance == 0,
                    balance_status: BalanceStatus::of(agent_balance),
                    imbalance_magnitude: agent_balance.unsigned_abs(),
                    final_drivers_oracle: oracle.final_drivers.get(idx).copied().unwrap_or_default(),
                    final_balance_oracle: oracle_balance,
                    is_balanced_oracle: oracle_balance == 0,
                }
            })
            .collect()
    }
}

/// A move with zone ids resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveReport {
    pub from_zone: usize,
    pub to_zone: usize,
    pub from_zone_id: String,
    pub to_zone_id: String,
    pub count: u32,
}

impl MoveReport {
    pub fn new(snapshot: &ZoneSnapshot, mv: &Move) -> Self {
        let id = |idx: usize| snapshot.zone(idx).map(|z| z.id.clone()).unwrap_or_default();
        Self {
            from_zone: mv.from_zone,
            to_zone: mv.to_zone,
            from_zone_id: id(mv.from_zone),
            to_zone_id: id(mv.to_zone),
            count: mv.count,
        }
    }
}

/// Agent move with its step reward and the policy's confidence in it,
/// measured on the state just before the move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentMoveReport {
    #[serde(flatten)]
    pub movement: MoveReport,
    pub reward: f64,
    pub confidence_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub balanced_zones: usize,
    pub unbalanced_zones: usize,
    pub score: BalanceScore,
    pub total_moves: usize,
}

impl PerformanceSummary {
    pub fn new(final_state: &[i64], score: BalanceScore, total_moves: usize) -> Self {
        let balanced_zones = final_state.iter().filter(|&&v| v == 0).count();
        Self {
            balanced_zones,
            unbalanced_zones: final_state.len() - balanced_zones,
            score,
            total_moves,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_zones: usize,
    pub agent: PerformanceSummary,
    pub oracle: PerformanceSummary,
    pub accuracy: RebalanceAccuracy,
    pub average_reward_per_episode: f64,
    /// Percentage of training steps with positive reward.
    pub relocation_success_rate: f64,
    /// Episode whose final state is reported, if any episode ran.
    pub best_episode: Option<usize>,
}

/// Everything a rebalancing run reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebalanceReport {
    pub summary: ReportSummary,
    pub zones: Vec<ZoneReport>,
    pub agent_moves: Vec<AgentMoveReport>,
    pub oracle_moves: Vec<MoveReport>,
    /// Policy confidence per zone id on the initial state.
    pub zone_confidence: BTreeMap<String, f64>,
    /// Episode index → cumulative reward.
    pub episode_cumulative_reward: BTreeMap<usize, f64>,
}
