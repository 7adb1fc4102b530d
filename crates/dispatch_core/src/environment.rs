//! Multi-zone relocation environment for the learned rebalancer.
//!
//! Rider counts are fixed for an episode; only driver counts move. The state
//! is the per-zone `riders − drivers` vector, so negative entries are surplus
//! zones and positive entries are zones short of drivers.

use serde::Serialize;

use crate::config::EnvironmentConfig;
use crate::error::{DispatchError, Result};
use crate::zone::{Move, ZoneSnapshot};

/// Result of a single [`RebalancingEnvironment::step`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub state: Vec<i64>,
    pub reward: f64,
    pub done: bool,
}

/// Deterministic driver-relocation environment.
#[derive(Debug, Clone)]
pub struct RebalancingEnvironment {
    riders: Vec<u32>,
    initial_drivers: Vec<u32>,
    drivers: Vec<u32>,
    state: Vec<i64>,
    move_log: Vec<Move>,
    moves_done: usize,
    cumulative_reward: f64,
    prev_abs_imbalance: i64,
    prev_balanced: usize,
    config: EnvironmentConfig,
}

impl RebalancingEnvironment {
    pub fn new(riders: Vec<u32>, drivers: Vec<u32>, config: &EnvironmentConfig) -> Result<Self> {
        if riders.len() != drivers.len() {
            return Err(DispatchError::ShapeMismatch {
                what: "rider and driver counts",
                expected: riders.len(),
                actual: drivers.len(),
            });
        }
        let mut env = Self {
            riders,
            initial_drivers: drivers.clone(),
            drivers,
            state: Vec::new(),
            move_log: Vec::new(),
            moves_done: 0,
            cumulative_reward: 0.0,
            prev_abs_imbalance: 0,
            prev_balanced: 0,
            config: config.clone(),
        };
        env.reset();
        Ok(env)
    }

    pub fn from_snapshot(snapshot: &ZoneSnapshot, config: &EnvironmentConfig) -> Result<Self> {
        Self::new(snapshot.riders(), snapshot.drivers(), config)
    }

    /// Restore the initial drivers and clear episode bookkeeping.
    pub fn reset(&mut self) -> Vec<i64> {
        self.drivers.clone_from(&self.initial_drivers);
        self.state = imbalance_state(&self.riders, &self.drivers);
        self.move_log.clear();
        self.moves_done = 0;
        self.cumulative_reward = 0.0;
        self.prev_abs_imbalance = total_abs_imbalance(&self.state);
        self.prev_balanced = balanced_zones(&self.state);
        self.state.clone()
    }

    /// Move up to `count` drivers from `from` to `to`.
    ///
    /// The count is clamped to the drivers available in `from` and to the
    /// room left in `to`. A clamped
    /// zero or a self move changes nothing but still uses up a step.
    pub fn step(&mut self, from: usize, to: usize, count: u32) -> Result<StepOutcome> {
        let zones = self.zone_count();
        for zone in [from, to] {
            if zone >= zones {
                return Err(DispatchError::ZoneOutOfRange { zone, zones });
            }
        }

        let count = count
            .min(self.drivers[from])
            .min(u32::MAX - self.drivers[to]);
        if count > 0 && from != to {
            self.drivers[from] -= count;
            self.drivers[to] += count;
            self.move_log.push(Move::new(from, to, count));
        }
        self.state = imbalance_state(&self.riders, &self.drivers);

        let abs_imbalance = total_abs_imbalance(&self.state);
        let balanced = balanced_zones(&self.state);
        let reward = self.config.imbalance_weight * (self.prev_abs_imbalance - abs_imbalance) as f64
            + self.config.balanced_zone_weight * (balanced as f64 - self.prev_balanced as f64);
        self.prev_abs_imbalance = abs_imbalance;
        self.prev_balanced = balanced;
        self.cumulative_reward += reward;

        self.moves_done += 1;
        Ok(StepOutcome {
            state: self.state.clone(),
            reward,
            done: self.moves_done >= self.config.max_moves,
        })
    }

    pub fn zone_count(&self) -> usize {
        self.riders.len()
    }

    pub fn riders(&self) -> &[u32] {
        &self.riders
    }

    pub fn drivers(&self) -> &[u32] {
        &self.drivers
    }

    pub fn initial_drivers(&self) -> &[u32] {
        &self.initial_drivers
    }

    pub fn state(&self) -> &[i64] {
        &self.state
    }

    /// Moves that actually changed driver counts this episode.
    pub fn move_log(&self) -> &[Move] {
        &self.move_log
    }

    pub fn moves_done(&self) -> usize {
        self.moves_done
    }

    pub fn cumulative_reward(&self) -> f64 {
        self.cumulative_reward
    }

    pub fn max_moves(&self) -> usize {
        self.config.max_moves
    }
}

/// Per-zone `riders − drivers`.
pub fn imbalance_state(riders: &[u32], drivers: &[u32]) -> Vec<i64> {
    riders
        .iter()
        .zip(drivers)
        .map(|(&r, &d)| i64::from(r) - i64::from(d))
        .collect()
}

pub fn total_abs_imbalance(state: &[i64]) -> i64 {
    state.iter().map(|v| v.abs()).sum()
}

pub fn balanced_zones(state: &[i64]) -> usize {
    state.iter().filter(|&&v| v == 0).count()
}
