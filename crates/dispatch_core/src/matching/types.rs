use serde::{Deserialize, Serialize};

use crate::bandit::CostWeights;
use crate::spatial::Coordinate;

/// A rider waiting for pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    pub id: String,
    pub location: Coordinate,
}

impl Rider {
    pub fn new(id: impl Into<String>, location: Coordinate) -> Self {
        Self {
            id: id.into(),
            location,
        }
    }
}

/// An idle driver that can be assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub location: Coordinate,
}

impl Driver {
    pub fn new(id: impl Into<String>, location: Coordinate) -> Self {
        Self {
            id: id.into(),
            location,
        }
    }
}

/// A successful rider → driver assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub rider_id: String,
    pub driver_id: String,
    pub eta_seconds: f64,
    pub distance_meters: f64,
    /// `1 / (1 + eta/300)`: in (0, 1], decreasing in ETA.
    pub confidence_score: f64,
}

/// A driver that was not chosen for a rider, and what choosing it would cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedDriver {
    pub driver_id: String,
    /// Other driver's ETA minus the chosen driver's ETA. `None` if unreachable.
    pub extra_wait_secs: Option<f64>,
    pub distance_meters: Option<f64>,
}

/// Why a rider got the driver it got.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchExplanation {
    pub rider_id: String,
    pub chosen_driver_id: String,
    pub chosen_eta_secs: f64,
    pub confidence_score: f64,
    pub rejected_drivers: Vec<RejectedDriver>,
}

/// Aggregate wait-time metrics for one matching round.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchMetrics {
    pub match_count: usize,
    /// Sum of matched ETAs.
    pub total_wait_secs: f64,
    /// Sum over riders of the ETA of each rider's cheapest reachable driver,
    /// ignoring the one-driver-per-rider constraint.
    pub baseline_wait_secs: f64,
    pub average_wait_secs: f64,
    pub efficiency_percent: f64,
}

/// Everything a matching round produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub matches: Vec<MatchResult>,
    pub explanations: Vec<MatchExplanation>,
    pub metrics: MatchMetrics,
    pub weights: CostWeights,
    /// Bandit arm that supplied `weights`, when the bandit was consulted.
    pub arm_index: Option<usize>,
}
