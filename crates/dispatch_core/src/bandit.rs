//! UCB1 bandit over the assignment cost weights.
//!
//! Each arm is a fixed `(eta_weight, dist_weight)` pair from the configured
//! catalogue. The matcher pulls one arm per round and feeds back how good the
//! round's matches were, so the weighting drifts toward what works.

use serde::{Deserialize, Serialize};

use crate::config::{BanditConfig, ConfigError};

/// Weights of the assignment cost `eta_weight·seconds + dist_weight·meters`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostWeights {
    pub eta_weight: f64,
    pub dist_weight: f64,
}

impl CostWeights {
    pub const fn new(eta_weight: f64, dist_weight: f64) -> Self {
        Self {
            eta_weight,
            dist_weight,
        }
    }

    pub fn cost(&self, duration_secs: f64, distance_m: f64) -> f64 {
        self.eta_weight * duration_secs + self.dist_weight * distance_m
    }
}

impl Default for CostWeights {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

/// One arm with its pull statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BanditArm {
    pub weights: CostWeights,
    pub pulls: u64,
    pub mean_reward: f64,
}

/// UCB1 multi-armed bandit.
#[derive(Debug, Clone)]
pub struct WeightBandit {
    arms: Vec<BanditArm>,
    total_pulls: u64,
    reward_sum: f64,
}

impl WeightBandit {
    /// Create a bandit from the configured catalogue.
    pub fn new(config: &BanditConfig) -> Result<Self, ConfigError> {
        if config.arms.is_empty() {
            return Err(ConfigError::Invalid("bandit.arms must not be empty".into()));
        }
        Ok(Self {
            arms: config
                .arms
                .iter()
                .map(|&weights| BanditArm {
                    weights,
                    pulls: 0,
                    mean_reward: 0.0,
                })
                .collect(),
            total_pulls: 0,
            reward_sum: 0.0,
        })
    }

    /// Pick the next arm.
    ///
    /// Every arm is pulled once first, in index order. After that the arm
    /// maximizing `mean + sqrt(2·ln(total)/pulls)` wins; ties go to the lowest
    /// index.
    pub fn select_arm(&self) -> usize {
        if let Some(cold) = self.arms.iter().position(|arm| arm.pulls == 0) {
            return cold;
        }

        let ln_total = (self.total_pulls as f64).ln();
        let mut best = 0;
        let mut best_score = f64::NEG_INFINITY;
        for (idx, arm) in self.arms.iter().enumerate() {
            let bonus = (2.0 * ln_total / arm.pulls as f64).sqrt();
            let score = arm.mean_reward + bonus;
            if score > best_score {
                best = idx;
                best_score = score;
            }
        }
        best
    }

    /// Record the reward observed after pulling `arm`. Unknown arms are ignored.
    pub fn update(&mut self, arm: usize, reward: f64) {
        let Some(stats) = self.arms.get_mut(arm) else {
            tracing::warn!(arm, arms = self.arms.len(), "reward for unknown bandit arm ignored");
            return;
        };
        stats.pulls += 1;
        stats.mean_reward += (reward - stats.mean_reward) / stats.pulls as f64;
        self.total_pulls += 1;
        self.reward_sum += reward;
    }

    pub fn weights(&self, arm: usize) -> Option<CostWeights> {
        self.arms.get(arm).map(|stats| stats.weights)
    }

    pub fn arms(&self) -> &[BanditArm] {
        &self.arms
    }

    pub fn total_pulls(&self) -> u64 {
        self.total_pulls
    }

    /// Mean of every reward observed so far; 0 before the first update.
    pub fn average_reward(&self) -> f64 {
        if self.total_pulls == 0 {
            0.0
        } else {
            self.reward_sum / self.total_pulls as f64
        }
    }

    /// Pulled arm with the highest mean reward.
    pub fn best_arm(&self) -> Option<usize> {
        self.arms
            .iter()
            .enumerate()
            .filter(|(_, arm)| arm.pulls > 0)
            .fold(None, |best: Option<(usize, f64)>, (idx, arm)| match best {
                Some((_, mean)) if mean >= arm.mean_reward => best,
                _ => Some((idx, arm.mean_reward)),
            })
            .map(|(idx, _)| idx)
    }
}
