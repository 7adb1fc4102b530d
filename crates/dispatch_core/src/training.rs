//! Episode loop for the learned rebalancer and the end-to-end run that
//! compares it with the greedy oracle.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::agent::RebalancingAgent;
use crate::config::{DispatchConfig, ScoreConfig, TrainingConfig};
use crate::environment::{imbalance_state, RebalancingEnvironment};
use crate::error::Result;
use crate::oracle::GreedyOracle;
use crate::report::{
    AgentMoveReport, MoveReport, PerformanceSummary, RebalanceReport, ReportSummary, ZoneReport,
};
use crate::score::{accuracy_vs_oracle, balance_score, BalanceScore};
use crate::zone::{Move, ZoneSnapshot};

/// Per-episode statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub cumulative_reward: f64,
    pub score: BalanceScore,
    pub steps: usize,
    /// Steps with positive reward.
    pub successful_steps: usize,
    pub epsilon: f64,
}

/// A move taken during an episode and the reward it earned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordedMove {
    pub movement: Move,
    pub reward: f64,
}

/// Full record of one episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeRecord {
    pub summary: EpisodeSummary,
    pub final_state: Vec<i64>,
    pub final_drivers: Vec<u32>,
    pub moves: Vec<RecordedMove>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingOutcome {
    pub episodes: Vec<EpisodeSummary>,
    /// Highest balance score; ties go to the higher cumulative reward, then
    /// to the earlier episode.
    pub best: Option<EpisodeRecord>,
}

impl TrainingOutcome {
    pub fn average_reward(&self) -> f64 {
        if self.episodes.is_empty() {
            return 0.0;
        }
        self.episodes.iter().map(|e| e.cumulative_reward).sum::<f64>() / self.episodes.len() as f64
    }

    /// Percentage of all training steps that earned a positive reward.
    pub fn success_rate(&self) -> f64 {
        let steps: usize = self.episodes.iter().map(|e| e.steps).sum();
        if steps == 0 {
            return 0.0;
        }
        let successful: usize = self.episodes.iter().map(|e| e.successful_steps).sum();
        successful as f64 / steps as f64 * 100.0
    }
}

/// Runs training episodes against one environment.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    training: TrainingConfig,
    score: ScoreConfig,
}

impl Trainer {
    pub fn new(training: &TrainingConfig, score: &ScoreConfig) -> Self {
        Self {
            training: training.clone(),
            score: score.clone(),
        }
    }

    pub fn train(
        &self,
        env: &mut RebalancingEnvironment,
        agent: &mut RebalancingAgent,
    ) -> Result<TrainingOutcome> {
        let mut episodes = Vec::with_capacity(self.training.episodes);
        let mut best: Option<EpisodeRecord> = None;

        for episode in 0..self.training.episodes {
            let record = self.run_episode(episode, env, agent)?;
            let summary = &record.summary;
            if episode == 0 || (self.training.log_every > 0 && (episode + 1) % self.training.log_every == 0) {
                tracing::info!(
                    episode = episode + 1,
                    reward = summary.cumulative_reward,
                    score = summary.score.score,
                    perfect = summary.score.perfect_fraction,
                    normalized_imbalance = summary.score.normalized_imbalance,
                    epsilon = summary.epsilon,
                    "training episode finished"
                );
            }
            episodes.push(summary.clone());

            let improves = best.as_ref().map_or(true, |current| {
                let (new, old) = (&record.summary, &current.summary);
                new.score.score > old.score.score
                    || (new.score.score == old.score.score
                        && new.cumulative_reward > old.cumulative_reward)
            });
            if improves {
                best = Some(record);
            }
        }

        Ok(TrainingOutcome { episodes, best })
    }

    fn run_episode(
        &self,
        episode: usize,
        env: &mut RebalancingEnvironment,
        agent: &mut RebalancingAgent,
    ) -> Result<EpisodeRecord> {
        let mut state = env.reset();
        let mut moves = Vec::new();
        let mut steps = 0;
        let mut successful_steps = 0;

        loop {
            let Some(action) = agent.act(&state)? else {
                break;
            };
            let logged = env.move_log().len();
            let outcome = env.step(action.from_zone, action.to_zone, action.count)?;
            if let Some(&movement) = env.move_log().get(logged) {
                moves.push(RecordedMove {
                    movement,
                    reward: outcome.reward,
                });
            }
            steps += 1;
            if outcome.reward > 0.0 {
                successful_steps += 1;
            }

            agent.remember(&state, action.index, outcome.reward, &outcome.state, outcome.done)?;
            agent.replay();
            state = outcome.state;
            if outcome.done {
                break;
            }
        }

        let score = balance_score(env.state(), env.riders(), self.score.perfect_zone_weight)?;
        Ok(EpisodeRecord {
            summary: EpisodeSummary {
                episode,
                cumulative_reward: env.cumulative_reward(),
                score,
                steps,
                successful_steps,
                epsilon: agent.epsilon(),
            },
            final_state: env.state().to_vec(),
            final_drivers: env.drivers().to_vec(),
            moves,
        })
    }
}

/// Train an agent on `snapshot`, balance the same snapshot greedily, and
/// report both.
pub fn run_rebalancing(snapshot: &ZoneSnapshot, config: &DispatchConfig) -> Result<RebalanceReport> {
    config.validate()?;
    let mut env = RebalancingEnvironment::from_snapshot(snapshot, &config.environment)?;
    let mut agent = RebalancingAgent::new(snapshot.len(), &config.agent)?;
    let trainer = Trainer::new(&config.training, &config.score);

    tracing::info!(
        zones = snapshot.len(),
        episodes = config.training.episodes,
        max_moves = config.environment.max_moves,
        "training rebalancing agent"
    );
    let training = trainer.train(&mut env, &mut agent)?;

    let riders = snapshot.riders();
    let initial_drivers = snapshot.drivers();
    let initial_state = imbalance_state(&riders, &initial_drivers);
    let oracle = GreedyOracle.solve(&riders, &initial_drivers)?;

    let (agent_state, agent_drivers, agent_moves) = match &training.best {
        Some(best) => (best.final_state.clone(), best.final_drivers.clone(), best.moves.clone()),
        None => (initial_state.clone(), initial_drivers.clone(), Vec::new()),
    };
    let weight = config.score.perfect_zone_weight;
    let agent_score = balance_score(&agent_state, &riders, weight)?;
    let oracle_score = balance_score(&oracle.final_state, &riders, weight)?;
    let accuracy = accuracy_vs_oracle(&agent_state, &oracle.final_state)?;

    // Confidence of each move, measured on the state right before it.
    let mut state = initial_state.clone();
    let mut agent_move_reports = Vec::with_capacity(agent_moves.len());
    for recorded in &agent_moves {
        let mv = recorded.movement;
        let confidence = agent
            .get_confidence_scores(&state)?
            .action(mv.from_zone, mv.to_zone)
            .unwrap_or(0.0);
        state[mv.from_zone] += i64::from(mv.count);
        state[mv.to_zone] -= i64::from(mv.count);
        agent_move_reports.push(AgentMoveReport {
            movement: MoveReport::new(snapshot, &mv),
            reward: recorded.reward,
            confidence_score: confidence,
        });
    }

    let zone_confidence: BTreeMap<String, f64> = snapshot
        .zones()
        .iter()
        .zip(agent.get_confidence_scores(&initial_state)?.zones)
        .map(|(zone, confidence)| (zone.id.clone(), confidence))
        .collect();

    let summary = ReportSummary {
        total_zones: snapshot.len(),
        agent: PerformanceSummary::new(&agent_state, agent_score, agent_moves.len()),
        oracle: PerformanceSummary::new(&oracle.final_state, oracle_score, oracle.moves.len()),
        accuracy,
        average_reward_per_episode: training.average_reward(),
        relocation_success_rate: training.success_rate(),
        best_episode: training.best.as_ref().map(|best| best.summary.episode),
    };
    tracing::info!(
        agent_score = agent_score.score,
        oracle_score = oracle_score.score,
        accuracy = accuracy.overall,
        agent_moves = agent_moves.len(),
        oracle_moves = oracle.moves.len(),
        "rebalancing run complete"
    );

    Ok(RebalanceReport {
        summary,
        zones: ZoneReport::for_zones(snapshot, &agent_drivers, &agent_state, &oracle),
        agent_moves: agent_move_reports,
        oracle_moves: oracle
            .moves
            .iter()
            .map(|mv| MoveReport::new(snapshot, mv))
            .collect(),
        zone_confidence,
        episode_cumulative_reward: training
            .episodes
            .iter()
            .map(|e| (e.episode, e.cumulative_reward))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, EnvironmentConfig};

    fn fast_config(episodes: usize) -> DispatchConfig {
        DispatchConfig {
            agent: AgentConfig {
                hidden_layers: vec![16, 16],
                batch_size: 8,
                memory_size: 256,
                target_update_every: 10,
                ..AgentConfig::default()
            },
            environment: EnvironmentConfig {
                max_moves: 20,
                ..EnvironmentConfig::default()
            },
            training: TrainingConfig {
                episodes,
                log_every: 10,
            },
            ..DispatchConfig::default()
        }
    }

    #[test]
    fn trainer_records_every_episode() {
        let config = fast_config(5);
        let mut env =
            RebalancingEnvironment::new(vec![3, 0, 2, 1], vec![0, 4, 0, 2], &config.environment)
                .expect("env");
        let mut agent = RebalancingAgent::new(4, &config.agent).expect("agent");
        let outcome = Trainer::new(&config.training, &config.score)
            .train(&mut env, &mut agent)
            .expect("train");

        assert_eq!(outcome.episodes.len(), 5);
        let best = outcome.best.as_ref().expect("best episode");
        assert!(outcome
            .episodes
            .iter()
            .all(|e| e.score.score <= best.summary.score.score));
        for e in &outcome.episodes {
            assert!(e.steps <= config.environment.max_moves);
            assert!(e.successful_steps <= e.steps);
        }
        let rate = outcome.success_rate();
        assert!((0.0..=100.0).contains(&rate));
    }

    #[test]
    fn episode_stops_when_nothing_is_left_to_move() {
        // One move of 2 drivers balances everything.
        let config = fast_config(1);
        let mut env = RebalancingEnvironment::new(vec![2, 0], vec![0, 2], &config.environment)
            .expect("env");
        let mut agent = RebalancingAgent::new(2, &config.agent).expect("agent");
        let outcome = Trainer::new(&config.training, &config.score)
            .train(&mut env, &mut agent)
            .expect("train");
        let best = outcome.best.expect("best");
        assert_eq!(best.summary.steps, 1);
        assert_eq!(best.final_state, vec![0, 0]);
        assert_eq!(best.moves[0].movement, Move::new(1, 0, 2));
        assert_eq!(best.moves[0].reward, 22.0);
    }

    #[test]
    fn report_covers_every_zone_and_episode() {
        let snapshot = ZoneSnapshot::from_counts(&[(3, 4), (4, 2), (6, 2), (2, 4), (4, 2)]);
        let report = run_rebalancing(&snapshot, &fast_config(4)).expect("run");
        assert_eq!(report.zones.len(), 5);
        assert_eq!(report.episode_cumulative_reward.len(), 4);
        assert_eq!(report.zone_confidence.len(), 5);
        assert_eq!(report.summary.agent.total_moves, report.agent_moves.len());
        assert!(report.summary.agent.score.score >= 0.0);
        for value in [
            report.summary.accuracy.overall,
            report.summary.accuracy.perfect_zones,
            report.summary.accuracy.state_similarity,
        ] {
            assert!((0.0..=1.0).contains(&value));
        }
        for mv in &report.agent_moves {
            assert!((0.0..=1.0).contains(&mv.confidence_score));
        }
    }

    #[test]
    fn zero_episodes_reports_the_initial_state() {
        let snapshot = ZoneSnapshot::from_counts(&[(1, 0), (0, 1)]);
        let report = run_rebalancing(&snapshot, &fast_config(0)).expect("run");
        assert_eq!(report.summary.best_episode, None);
        assert!(report.agent_moves.is_empty());
        assert_eq!(report.zones[0].final_balance_agent, 1);
        assert_eq!(report.summary.oracle.balanced_zones, 2);
    }
}
