//! Masked value-learning rebalancing policy.
//!
//! The agent scores every `from → to` zone pair with a Q-network and only
//! ever considers pairs the mask admits. Training follows the usual deep
//! Q-learning loop: epsilon-greedy acting, a replay buffer, and a target
//! network that is replaced wholesale every few learning steps.

pub mod mask;
pub mod network;
pub mod replay;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;

pub use mask::ActionSpace;
pub use network::{Adam, Gradients, QNetwork};
pub use replay::{ReplayBuffer, Transition};

use crate::config::AgentConfig;
use crate::error::{DispatchError, Result};

/// A concrete relocation chosen by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentAction {
    pub from_zone: usize,
    pub to_zone: usize,
    pub count: u32,
    /// Flat index into the action space.
    pub index: usize,
}

/// Softmax policy confidence for one state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfidenceScores {
    /// Per zone: summed probability of the valid actions touching it,
    /// normalized so the largest is 1.
    pub zones: Vec<f64>,
    /// Per valid action, keyed `"{from}_to_{to}"`.
    pub actions: BTreeMap<String, f64>,
}

impl ConfidenceScores {
    pub fn action(&self, from: usize, to: usize) -> Option<f64> {
        self.actions.get(&action_key(from, to)).copied()
    }
}

pub fn action_key(from: usize, to: usize) -> String {
    format!("{from}_to_{to}")
}

/// Deep Q-learning agent over a fixed number of zones.
#[derive(Debug, Clone)]
pub struct RebalancingAgent {
    space: ActionSpace,
    online: QNetwork,
    target: QNetwork,
    optimizer: Adam,
    memory: ReplayBuffer,
    epsilon: f64,
    learn_steps: usize,
    rng: StdRng,
    config: AgentConfig,
}

impl RebalancingAgent {
    pub fn new(zones: usize, config: &AgentConfig) -> Result<Self> {
        config.validate()?;
        let space = ActionSpace::new(zones);
        let mut rng = StdRng::seed_from_u64(config.seed);

        let mut sizes = Vec::with_capacity(config.hidden_layers.len() + 2);
        sizes.push(zones);
        sizes.extend_from_slice(&config.hidden_layers);
        sizes.push(space.size());

        let online = QNetwork::new(&sizes, &mut rng);
        let target = online.clone();
        let optimizer = Adam::new(&online, config.learning_rate);
        Ok(Self {
            space,
            online,
            target,
            optimizer,
            memory: ReplayBuffer::new(config.memory_size),
            epsilon: config.epsilon_start,
            learn_steps: 0,
            rng,
            config: config.clone(),
        })
    }

    /// Choose a move for `state`, or `None` when no valid move exists.
    pub fn act(&mut self, state: &[i64]) -> Result<Option<AgentAction>> {
        self.check_state(state)?;
        let valid = self.space.valid_actions(state);
        if valid.is_empty() {
            return Ok(None);
        }

        let index = if self.rng.gen::<f64>() < self.epsilon {
            valid.choose(&mut self.rng).copied()
        } else {
            let values = self.online.forward(&features(state));
            best_valid(&values, &valid)
        };
        Ok(index.map(|index| self.action(state, index)))
    }

    /// Greedy choice with no exploration and no change to agent state.
    pub fn act_greedy(&self, state: &[i64]) -> Result<Option<AgentAction>> {
        self.check_state(state)?;
        let valid = self.space.valid_actions(state);
        let values = self.online.forward(&features(state));
        Ok(best_valid(&values, &valid).map(|index| self.action(state, index)))
    }

    fn action(&self, state: &[i64], index: usize) -> AgentAction {
        let (from_zone, to_zone) = self.space.decode(index);
        AgentAction {
            from_zone,
            to_zone,
            count: self.space.move_count(state, index),
            index,
        }
    }

    pub fn remember(
        &mut self,
        state: &[i64],
        action: usize,
        reward: f64,
        next_state: &[i64],
        done: bool,
    ) -> Result<()> {
        self.check_state(state)?;
        self.check_state(next_state)?;
        if action >= self.space.size() {
            return Err(DispatchError::ShapeMismatch {
                what: "action index bound",
                expected: self.space.size(),
                actual: action,
            });
        }
        self.memory.push(Transition {
            state: state.to_vec(),
            action,
            reward,
            next_state: next_state.to_vec(),
            done,
        });
        Ok(())
    }

    /// One learning step on a uniform minibatch.
    ///
    /// Returns the batch MSE loss, or `None` while the buffer holds fewer
    /// transitions than a batch (no learning happens then, and epsilon is
    /// left alone).
    pub fn replay(&mut self) -> Option<f64> {
        let batch_size = self.config.batch_size;
        let batch: Vec<Transition> = self
            .memory
            .sample(&mut self.rng, batch_size)?
            .into_iter()
            .cloned()
            .collect();

        let mut grads = Gradients::zeros_like(&self.online);
        let mut loss = 0.0;
        let scale = 2.0 / batch_size as f64;
        for transition in &batch {
            let target = self.td_target(transition);
            let input = features(&transition.state);
            let predicted = self.online.forward(&input)[transition.action];
            let error = predicted - target;
            loss += error * error;

            let mut output_grad = vec![0.0; self.space.size()];
            output_grad[transition.action] = scale * error;
            self.online.backward(&input, &output_grad, &mut grads);
        }
        grads.clip_norm(self.config.max_grad_norm);
        self.optimizer.step(&mut self.online, &grads);

        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        self.learn_steps += 1;
        if self.learn_steps % self.config.target_update_every == 0 {
            self.sync_target();
        }
        Some(loss / batch_size as f64)
    }

    /// `r` for terminal transitions, else `r + γ·max` over the target
    /// network's values of the actions valid in the next state.
    fn td_target(&self, transition: &Transition) -> f64 {
        if transition.done {
            return transition.reward;
        }
        let valid = self.space.valid_actions(&transition.next_state);
        if valid.is_empty() {
            return transition.reward;
        }
        let values = self.target.forward(&features(&transition.next_state));
        let best = valid
            .iter()
            .map(|&idx| values[idx])
            .fold(f64::NEG_INFINITY, f64::max);
        transition.reward + self.config.gamma * best
    }

    /// Replace the target network with a copy of the online network.
    pub fn sync_target(&mut self) {
        self.target = self.online.clone();
    }

    /// Softmax over the online values of the valid actions in `state`.
    pub fn get_confidence_scores(&self, state: &[i64]) -> Result<ConfidenceScores> {
        self.check_state(state)?;
        let zones = self.space.zones();
        let valid = self.space.valid_actions(state);
        if valid.is_empty() {
            return Ok(ConfidenceScores {
                zones: vec![0.0; zones],
                actions: BTreeMap::new(),
            });
        }

        let values = self.online.forward(&features(state));
        let max = valid
            .iter()
            .map(|&idx| values[idx])
            .fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = valid.iter().map(|&idx| (values[idx] - max).exp()).collect();
        let total: f64 = exp.iter().sum();

        let mut zone_scores = vec![0.0; zones];
        let mut actions = BTreeMap::new();
        for (&idx, e) in valid.iter().zip(&exp) {
            let p = e / total;
            let (from, to) = self.space.decode(idx);
            zone_scores[from] += p;
            zone_scores[to] += p;
            actions.insert(action_key(from, to), p);
        }
        let peak = zone_scores.iter().copied().fold(0.0, f64::max);
        if peak > 0.0 {
            for score in &mut zone_scores {
                *score /= peak;
            }
        }
        Ok(ConfidenceScores {
            zones: zone_scores,
            actions,
        })
    }

    /// Online network values for `state`, one per action.
    pub fn q_values(&self, state: &[i64]) -> Result<Vec<f64>> {
        self.check_state(state)?;
        Ok(self.online.forward(&features(state)))
    }

    pub fn action_space(&self) -> ActionSpace {
        self.space
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn learn_steps(&self) -> usize {
        self.learn_steps
    }

    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    fn check_state(&self, state: &[i64]) -> Result<()> {
        if state.len() != self.space.zones() {
            return Err(DispatchError::ShapeMismatch {
                what: "state vector",
                expected: self.space.zones(),
                actual: state.len(),
            });
        }
        Ok(())
    }
}

fn features(state: &[i64]) -> Vec<f64> {
    state.iter().map(|&v| v as f64).collect()
}

/// Highest-valued valid action; ties go to the lowest index.
fn best_valid(values: &[f64], valid: &[usize]) -> Option<usize> {
    valid.iter().copied().fold(None, |best, idx| match best {
        Some(b) if values[b] >= values[idx] => Some(b),
        _ => Some(idx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> AgentConfig {
        AgentConfig {
            hidden_layers: vec![16, 16],
            batch_size: 8,
            memory_size: 64,
            target_update_every: 5,
            ..AgentConfig::default()
        }
    }

    #[test]
    fn acts_only_on_masked_actions() {
        let mut agent = RebalancingAgent::new(5, &small_config()).expect("agent");
        let states = [
            vec![-3, 2, 0, 1, 0],
            vec![1, -1, -4, 2, 2],
            vec![0, 0, -1, 0, 1],
        ];
        for _ in 0..50 {
            for state in &states {
                let action = agent.act(state).expect("act").expect("valid action exists");
                assert!(state[action.from_zone] < 0);
                assert!(state[action.to_zone] > 0);
                assert_ne!(action.from_zone, action.to_zone);
                assert_eq!(
                    i64::from(action.count),
                    (-state[action.from_zone]).min(state[action.to_zone])
                );
            }
        }
    }

    #[test]
    fn no_valid_action_yields_none() {
        let mut agent = RebalancingAgent::new(3, &small_config()).expect("agent");
        assert_eq!(agent.act(&[0, 0, 0]).expect("act"), None);
        assert_eq!(agent.act(&[2, 1, 0]).expect("act"), None);
        assert!(agent.act(&[1, 2]).is_err());
    }

    #[test]
    fn greedy_when_epsilon_is_zero() {
        let config = AgentConfig {
            epsilon_start: 0.0,
            ..small_config()
        };
        let mut agent = RebalancingAgent::new(4, &config).expect("agent");
        let state = [-2, 1, -1, 2];
        let greedy = agent.act_greedy(&state).expect("act").expect("action");
        for _ in 0..10 {
            assert_eq!(agent.act(&state).expect("act"), Some(greedy));
        }
    }

    #[test]
    fn replay_waits_for_a_full_batch() {
        let mut agent = RebalancingAgent::new(3, &small_config()).expect("agent");
        let state = [-1, 1, 0];
        for _ in 0..7 {
            agent.remember(&state, 1, 1.0, &[0, 0, 0], true).expect("remember");
            assert_eq!(agent.replay(), None);
        }
        assert_eq!(agent.epsilon(), 1.0);
        agent.remember(&state, 1, 1.0, &[0, 0, 0], true).expect("remember");
        assert!(agent.replay().is_some());
        assert!((agent.epsilon() - 0.995).abs() < 1e-12);
    }

    #[test]
    fn epsilon_never_drops_below_minimum() {
        let config = AgentConfig {
            epsilon_decay: 0.5,
            ..small_config()
        };
        let mut agent = RebalancingAgent::new(3, &config).expect("agent");
        for _ in 0..8 {
            agent.remember(&[-1, 1, 0], 1, 0.0, &[0, 0, 0], true).expect("remember");
        }
        for _ in 0..20 {
            agent.replay();
        }
        assert_eq!(agent.epsilon(), config.epsilon_min);
    }

    #[test]
    fn target_network_syncs_on_schedule() {
        let mut agent = RebalancingAgent::new(3, &small_config()).expect("agent");
        for _ in 0..8 {
            agent.remember(&[-1, 1, 0], 1, 5.0, &[0, 0, 0], true).expect("remember");
        }
        for step in 1..=5 {
            agent.replay().expect("learning step");
            if step < 5 {
                assert_ne!(agent.online, agent.target, "step {step}");
            }
        }
        assert_eq!(agent.online, agent.target);
        assert_eq!(agent.learn_steps(), 5);
    }

    #[test]
    fn learning_moves_values_toward_rewards() {
        let config = AgentConfig {
            learning_rate: 1e-2,
            ..small_config()
        };
        let mut agent = RebalancingAgent::new(3, &config).expect("agent");
        let state = [-1, 1, 0];
        let action = agent.action_space().index(0, 1);
        for _ in 0..8 {
            agent.remember(&state, action, 10.0, &[0, 0, 0], true).expect("remember");
        }
        let before = (agent.q_values(&state).expect("q")[action] - 10.0).abs();
        for _ in 0..200 {
            agent.replay();
        }
        let after = (agent.q_values(&state).expect("q")[action] - 10.0).abs();
        assert!(after < before * 0.1, "error {after} from {before}");
    }

    #[test]
    fn confidence_scores_are_a_distribution() {
        let agent = RebalancingAgent::new(4, &small_config()).expect("agent");
        let scores = agent.get_confidence_scores(&[-2, 1, -1, 2]).expect("scores");
        assert_eq!(scores.actions.len(), 4);
        let total: f64 = scores.actions.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(scores.action(0, 1).is_some());
        assert!(scores.action(1, 0).is_none());
        let peak = scores.zones.iter().copied().fold(0.0, f64::max);
        assert!((peak - 1.0).abs() < 1e-12);

        let empty = agent.get_confidence_scores(&[0, 0, 0, 0]).expect("scores");
        assert_eq!(empty.zones, vec![0.0; 4]);
        assert!(empty.actions.is_empty());
    }

    #[test]
    fn same_seed_same_behaviour() {
        let mut a = RebalancingAgent::new(4, &small_config()).expect("agent");
        let mut b = RebalancingAgent::new(4, &small_config()).expect("agent");
        let state = [-2, 1, -1, 2];
        for _ in 0..20 {
            assert_eq!(a.act(&state).expect("act"), b.act(&state).expect("act"));
        }
    }
}
