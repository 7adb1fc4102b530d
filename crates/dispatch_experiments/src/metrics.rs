//! Per-run comparison of the learned policy, the greedy oracle and the
//! flow rebalancer.

use dispatch_core::report::RebalanceReport;
use dispatch_core::score::BalanceScore;

/// Numbers extracted from one experiment run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RunResult {
    pub total_zones: usize,
    /// Balance score of the agent's best episode.
    pub agent_score: f64,
    pub agent_balanced_zones: usize,
    pub agent_moves: usize,
    pub oracle_score: f64,
    pub oracle_balanced_zones: usize,
    pub oracle_moves: usize,
    /// Balance score after applying the flow rebalancer's plan.
    pub flow_score: f64,
    pub flow_balanced_zones: usize,
    pub flow_moves: usize,
    pub flow_drivers_moved: u32,
    pub accuracy_overall: f64,
    pub accuracy_perfect_zones: f64,
    pub accuracy_state_similarity: f64,
    pub average_reward_per_episode: f64,
    /// Percentage of training steps with positive reward.
    pub relocation_success_rate: f64,
    pub best_episode: Option<usize>,
}

/// Flow rebalancer result measured on the same snapshot as the report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowMetrics {
    pub score: BalanceScore,
    pub balanced_zones: usize,
    pub moves: usize,
    pub drivers_moved: u32,
}

pub fn extract_metrics(report: &RebalanceReport, flow: FlowMetrics) -> RunResult {
    let summary = &report.summary;
    RunResult {
        total_zones: summary.total_zones,
        agent_score: summary.agent.score.score,
        agent_balanced_zones: summary.agent.balanced_zones,
        agent_moves: summary.agent.total_moves,
        oracle_score: summary.oracle.score.score,
        oracle_balanced_zones: summary.oracle.balanced_zones,
        oracle_moves: summary.oracle.total_moves,
        flow_score: flow.score.score,
        flow_balanced_zones: flow.balanced_zones,
        flow_moves: flow.moves,
        flow_drivers_moved: flow.drivers_moved,
        accuracy_overall: summary.accuracy.overall,
        accuracy_perfect_zones: summary.accuracy.perfect_zones,
        accuracy_state_similarity: summary.accuracy.state_similarity,
        average_reward_per_episode: summary.average_reward_per_episode,
        relocation_success_rate: summary.relocation_success_rate,
        best_episode: summary.best_episode,
    }
}

impl RunResult {
    /// Agent score minus oracle score; positive when the policy beat greedy.
    pub fn agent_vs_oracle(&self) -> f64 {
        self.agent_score - self.oracle_score
    }

    pub fn agent_vs_flow(&self) -> f64 {
        self.agent_score - self.flow_score
    }
}

#[cfg(test)]
pub(crate) fn sample_result(agent_score: f64, accuracy_overall: f64) -> RunResult {
    RunResult {
        total_zones: 8,
        agent_score,
        agent_balanced_zones: 3,
        agent_moves: 4,
        oracle_score: 0.5,
        oracle_balanced_zones: 3,
        oracle_moves: 4,
        flow_score: 0.45,
        flow_balanced_zones: 2,
        flow_moves: 4,
        flow_drivers_moved: 5,
        accuracy_overall,
        accuracy_perfect_zones: 1.0,
        accuracy_state_similarity: 0.5,
        average_reward_per_episode: 12.5,
        relocation_success_rate: 60.0,
        best_episode: Some(3),
    }
}
