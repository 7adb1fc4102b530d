//! Configuration for every dispatch component.
//!
//! One [`DispatchConfig`] tree is built at startup and each component receives
//! its own section at construction. All sections implement `Default` with the
//! documented production values, and the whole tree can be loaded from TOML:
//!
//! ```
//! use dispatch_core::config::DispatchConfig;
//!
//! let config = DispatchConfig::from_toml_str(r#"
//!     [agent]
//!     hidden_layers = [32, 32]
//!     batch_size = 16
//!
//!     [training]
//!     episodes = 20
//! "#).unwrap();
//!
//! assert_eq!(config.agent.batch_size, 16);
//! assert_eq!(config.environment.max_moves, 100);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bandit::CostWeights;
use crate::routing::RouteProviderKind;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub bandit: BanditConfig,
    pub matching: MatchingConfig,
    pub flow: FlowConfig,
    pub environment: EnvironmentConfig,
    pub agent: AgentConfig,
    pub training: TrainingConfig,
    pub score: ScoreConfig,
}

impl DispatchConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file and validates it.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string and validates it.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bandit.validate()?;
        self.matching.validate()?;
        self.flow.validate()?;
        self.agent.validate()?;
        self.score.validate()?;
        if self.environment.max_moves == 0 {
            return Err(ConfigError::Invalid(
                "environment.max_moves must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// UCB1 arm catalogue for the assignment cost function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanditConfig {
    /// Fixed `(eta_weight, dist_weight)` arms. ETA is in seconds and distance
    /// in meters, so distance weights are small.
    pub arms: Vec<CostWeights>,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            arms: vec![
                CostWeights::new(1.0, 0.0),
                CostWeights::new(0.8, 0.02),
                CostWeights::new(0.6, 0.05),
                CostWeights::new(0.5, 0.1),
            ],
        }
    }
}

impl BanditConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.arms.is_empty() {
            return Err(ConfigError::Invalid("bandit.arms must not be empty".into()));
        }
        if self
            .arms
            .iter()
            .any(|arm| !(arm.eta_weight >= 0.0 && arm.dist_weight >= 0.0))
        {
            return Err(ConfigError::Invalid(
                "bandit arm weights must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Assignment matcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Routing backend used for driver → rider queries.
    pub route_provider: RouteProviderKind,
    /// Upper bound on route queries in flight at once.
    pub max_concurrent_queries: usize,
    /// Per-query deadline; a query that misses it counts as unreachable.
    pub route_timeout_ms: Option<u64>,
    /// Cost assigned to unreachable pairs. Must dwarf any real cost.
    pub unreachable_cost: f64,
    /// ETA (seconds) at which match confidence drops to 0.5.
    pub confidence_eta_scale_secs: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            route_provider: RouteProviderKind::default(),
            max_concurrent_queries: 8,
            route_timeout_ms: Some(10_000),
            unreachable_cost: 1e9,
            confidence_eta_scale_secs: 300.0,
        }
    }
}

impl MatchingConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_queries == 0 {
            return Err(ConfigError::Invalid(
                "matching.max_concurrent_queries must be at least 1".into(),
            ));
        }
        if !(self.unreachable_cost > 0.0 && self.unreachable_cost.is_finite()) {
            return Err(ConfigError::Invalid(
                "matching.unreachable_cost must be positive and finite".into(),
            ));
        }
        if !(self.confidence_eta_scale_secs > 0.0) {
            return Err(ConfigError::Invalid(
                "matching.confidence_eta_scale_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Flow rebalancer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Egress cap applied to zones without an explicit one. `None` = unlimited.
    pub default_egress_cap: Option<u32>,
    /// Extra limit on drivers moved between any one pair of zones.
    /// `None` = bounded only by the pair's surplus and deficit.
    pub pairwise_capacity: Option<u32>,
    /// Edge cost used when either zone has no known coordinate.
    pub unknown_distance_cost: i64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            default_egress_cap: None,
            pairwise_capacity: None,
            unknown_distance_cost: 1,
        }
    }
}

impl FlowConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.pairwise_capacity == Some(0) {
            return Err(ConfigError::Invalid(
                "flow.pairwise_capacity must be at least 1 when set".into(),
            ));
        }
        if self.unknown_distance_cost < 0 {
            return Err(ConfigError::Invalid(
                "flow.unknown_distance_cost must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Rebalancing environment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Episode length in steps.
    pub max_moves: usize,
    /// Reward per unit of total absolute imbalance removed.
    pub imbalance_weight: f64,
    /// Reward per zone that became perfectly balanced.
    pub balanced_zone_weight: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            max_moves: 100,
            imbalance_weight: 3.0,
            balanced_zone_weight: 5.0,
        }
    }
}

/// Value-learning agent hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    pub gamma: f64,
    pub epsilon_start: f64,
    pub epsilon_min: f64,
    pub epsilon_decay: f64,
    /// Replay buffer capacity (oldest transitions evicted first).
    pub memory_size: usize,
    pub batch_size: usize,
    /// Learning steps between hard target-network syncs.
    pub target_update_every: usize,
    /// Global gradient-norm clip.
    pub max_grad_norm: f64,
    pub seed: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![256, 256],
            learning_rate: 1e-3,
            gamma: 0.95,
            epsilon_start: 1.0,
            epsilon_min: 0.05,
            epsilon_decay: 0.995,
            memory_size: 20_000,
            batch_size: 128,
            target_update_every: 200,
            max_grad_norm: 5.0,
            seed: 42,
        }
    }
}

impl AgentConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.memory_size < self.batch_size {
            return Err(ConfigError::Invalid(
                "agent.batch_size must be positive and no larger than agent.memory_size".into(),
            ));
        }
        if self.target_update_every == 0 {
            return Err(ConfigError::Invalid(
                "agent.target_update_every must be at least 1".into(),
            ));
        }
        if self.hidden_layers.iter().any(|&width| width == 0) {
            return Err(ConfigError::Invalid(
                "agent.hidden_layers must not contain zero-width layers".into(),
            ));
        }
        let unit = 0.0..=1.0;
        if !unit.contains(&self.epsilon_start)
            || !unit.contains(&self.epsilon_min)
            || !unit.contains(&self.epsilon_decay)
            || !unit.contains(&self.gamma)
        {
            return Err(ConfigError::Invalid(
                "agent epsilon_*, gamma must lie in [0, 1]".into(),
            ));
        }
        if !(self.learning_rate > 0.0) || !(self.max_grad_norm > 0.0) {
            return Err(ConfigError::Invalid(
                "agent.learning_rate and agent.max_grad_norm must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Episode loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub episodes: usize,
    /// Log progress on the first episode and every N episodes after.
    pub log_every: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            episodes: 100,
            log_every: 50,
        }
    }
}

/// Balance score weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Weight of the perfectly-balanced-zone fraction; the rest goes to the
    /// normalized imbalance term.
    pub perfect_zone_weight: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            perfect_zone_weight: 0.7,
        }
    }
}

impl ScoreConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.perfect_zone_weight) {
            return Err(ConfigError::Invalid(
                "score.perfect_zone_weight must lie in [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DispatchConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DispatchConfig::from_toml_str(
            r#"
            [flow]
            default_egress_cap = 3

            [score]
            perfect_zone_weight = 0.5
            "#,
        )
        .expect("parse");
        assert_eq!(config.flow.default_egress_cap, Some(3));
        assert_eq!(config.flow.pairwise_capacity, None);
        assert_eq!(config.score.perfect_zone_weight, 0.5);
        assert_eq!(config.agent, AgentConfig::default());
    }

    #[test]
    fn rejects_batch_larger_than_memory() {
        let err = DispatchConfig::from_toml_str(
            r#"
            [agent]
            memory_size = 10
            batch_size = 64
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_degenerate_flow_settings() {
        for toml in [
            "[flow]\nunknown_distance_cost = -5\n",
            "[flow]\npairwise_capacity = 0\n",
            "[matching]\nunreachable_cost = 0.0\n",
        ] {
            let err = DispatchConfig::from_toml_str(toml).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{toml}");
        }
        let config = DispatchConfig::from_toml_str("[flow]\npairwise_capacity = 4\n").expect("parse");
        assert_eq!(config.flow.pairwise_capacity, Some(4));
    }

    #[test]
    fn rejects_empty_arm_catalogue() {
        let err = DispatchConfig::from_toml_str("[bandit]\narms = []\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bandit_arms_parse_from_tables() {
        let config = DispatchConfig::from_toml_str(
            r#"
            [[bandit.arms]]
            eta_weight = 1.0
            dist_weight = 0.0

            [[bandit.arms]]
            eta_weight = 0.5
            dist_weight = 0.25
            "#,
        )
        .expect("parse");
        assert_eq!(config.bandit.arms.len(), 2);
        assert_eq!(config.bandit.arms[1], CostWeights::new(0.5, 0.25));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = DispatchConfig::load("/definitely/not/here/dispatch.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
