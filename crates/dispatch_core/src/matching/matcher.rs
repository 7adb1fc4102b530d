//! Assignment matcher: route queries, cost matrix, exact assignment, and the
//! bandit loop that tunes the cost weights between rounds.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rayon::{ThreadPool, ThreadPoolBuilder};

use super::cost::RouteMatrix;
use super::hungarian::solve_assignment;
use super::types::{
    Driver, MatchExplanation, MatchMetrics, MatchOutcome, MatchResult, RejectedDriver, Rider,
};
use crate::bandit::{CostWeights, WeightBandit};
use crate::config::{BanditConfig, DispatchConfig, MatchingConfig};
use crate::error::{DispatchError, Result};
use crate::routing::{build_route_provider, DeadlineRouteProvider, RouteProvider};

/// Matches riders to drivers one-to-one at minimum total weighted cost.
pub struct AssignmentMatcher {
    provider: Arc<dyn RouteProvider>,
    pool: ThreadPool,
    bandit: WeightBandit,
    config: MatchingConfig,
}

impl AssignmentMatcher {
    /// Build a matcher around `provider`.
    ///
    /// When `config.route_timeout_ms` is set every query runs under that
    /// deadline, and a miss makes the pair unreachable. Timed-out queries
    /// still count against `max_concurrent_queries` until they finish.
    pub fn new(
        provider: Arc<dyn RouteProvider>,
        config: &MatchingConfig,
        bandit: &BanditConfig,
    ) -> Result<Self> {
        let workers = config.max_concurrent_queries.max(1);
        let provider: Arc<dyn RouteProvider> = match config.route_timeout_ms {
            Some(ms) => Arc::new(
                DeadlineRouteProvider::new(provider, Duration::from_millis(ms), workers)
                    .map_err(|err| DispatchError::ThreadPool(err.to_string()))?,
            ),
            None => provider,
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("route-pool-{idx}"))
            .build()
            .map_err(|err| DispatchError::ThreadPool(err.to_string()))?;
        Ok(Self {
            provider,
            pool,
            bandit: WeightBandit::new(bandit)?,
            config: config.clone(),
        })
    }

    /// Build a matcher with the routing backend named in the configuration.
    pub fn from_config(config: &DispatchConfig) -> Result<Self> {
        let provider = build_route_provider(&config.matching.route_provider);
        Self::new(provider, &config.matching, &config.bandit)
    }

    pub fn bandit(&self) -> &WeightBandit {
        &self.bandit
    }

    /// One bandit-driven round: pick an arm, match with its weights, and
    /// reward the arm with the round's mean confidence.
    ///
    /// A round with no riders or no drivers leaves the bandit untouched.
    pub fn match_round(&mut self, riders: &[Rider], drivers: &[Driver]) -> Result<MatchOutcome> {
        check_unique_ids(riders, drivers)?;
        if riders.is_empty() || drivers.is_empty() {
            return Ok(MatchOutcome::default());
        }

        let arm = self.bandit.select_arm();
        let weights = self.bandit.weights(arm).unwrap_or_default();
        let mut outcome = self.match_with_weights(riders, drivers, weights)?;
        outcome.arm_index = Some(arm);

        let reward = if outcome.matches.is_empty() {
            0.0
        } else {
            outcome
                .matches
                .iter()
                .map(|m| m.confidence_score)
                .sum::<f64>()
                / outcome.matches.len() as f64
        };
        self.bandit.update(arm, reward);
        tracing::debug!(
            arm,
            reward,
            matches = outcome.matches.len(),
            "matching round rewarded bandit arm"
        );
        Ok(outcome)
    }

    /// Match with fixed weights; the bandit is not consulted.
    pub fn match_with_weights(
        &self,
        riders: &[Rider],
        drivers: &[Driver],
        weights: CostWeights,
    ) -> Result<MatchOutcome> {
        check_unique_ids(riders, drivers)?;
        if riders.is_empty() || drivers.is_empty() {
            return Ok(MatchOutcome {
                weights,
                ..MatchOutcome::default()
            });
        }

        let routes = RouteMatrix::query(&self.pool, self.provider.as_ref(), riders, drivers);
        Ok(self.assemble(riders, drivers, &routes, weights))
    }

    /// Solve and describe a round over an already queried route matrix.
    pub fn assemble(
        &self,
        riders: &[Rider],
        drivers: &[Driver],
        routes: &RouteMatrix,
        weights: CostWeights,
    ) -> MatchOutcome {
        let costs = routes.costs(weights, self.config.unreachable_cost);
        let pairs = solve_assignment(&costs);

        let mut matches = Vec::with_capacity(pairs.len());
        let mut explanations = Vec::with_capacity(pairs.len());
        for &(i, j) in &pairs {
            // Solver only returns feasible pairs, which always have a leg.
            let Some(chosen) = routes.leg(i, j) else {
                continue;
            };
            let confidence_score = self.confidence(chosen.duration_secs);
            matches.push(MatchResult {
                rider_id: riders[i].id.clone(),
                driver_id: drivers[j].id.clone(),
                eta_seconds: chosen.duration_secs,
                distance_meters: chosen.distance_m,
                confidence_score,
            });

            let rejected_drivers = drivers
                .iter()
                .enumerate()
                .filter(|&(other, _)| other != j)
                .map(|(other, driver)| {
                    let leg = routes.leg(i, other);
                    RejectedDriver {
                        driver_id: driver.id.clone(),
                        extra_wait_secs: leg.map(|l| l.duration_secs - chosen.duration_secs),
                        distance_meters: leg.map(|l| l.distance_m),
                    }
                })
                .collect();
            explanations.push(MatchExplanation {
                rider_id: riders[i].id.clone(),
                chosen_driver_id: drivers[j].id.clone(),
                chosen_eta_secs: chosen.duration_secs,
                confidence_score,
                rejected_drivers,
            });
        }

        let metrics = metrics(&matches, routes, weights);
        tracing::debug!(
            riders = riders.len(),
            drivers = drivers.len(),
            matched = metrics.match_count,
            total_wait_secs = metrics.total_wait_secs,
            "assignment solved"
        );
        MatchOutcome {
            matches,
            explanations,
            metrics,
            weights,
            arm_index: None,
        }
    }

    fn confidence(&self, eta_secs: f64) -> f64 {
        1.0 / (1.0 + eta_secs.max(0.0) / self.config.confidence_eta_scale_secs)
    }
}

fn metrics(matches: &[MatchResult], routes: &RouteMatrix, weights: CostWeights) -> MatchMetrics {
    let match_count = matches.len();
    let total_wait_secs: f64 = matches.iter().map(|m| m.eta_seconds).sum();

    // Every rider's cheapest reachable driver, ignoring one-to-one.
    let baseline_wait_secs: f64 = (0..routes.riders())
        .filter_map(|i| {
            (0..routes.drivers())
                .filter_map(|j| routes.leg(i, j))
                .min_by(|a, b| {
                    weights
                        .cost(a.duration_secs, a.distance_m)
                        .total_cmp(&weights.cost(b.duration_secs, b.distance_m))
                })
                .map(|leg| leg.duration_secs)
        })
        .sum();

    MatchMetrics {
        match_count,
        total_wait_secs,
        baseline_wait_secs,
        average_wait_secs: total_wait_secs / match_count.max(1) as f64,
        efficiency_percent: (baseline_wait_secs - total_wait_secs) / baseline_wait_secs.max(1.0)
            * 100.0,
    }
}

fn check_unique_ids(riders: &[Rider], drivers: &[Driver]) -> Result<()> {
    let mut seen = HashSet::new();
    if let Some(dup) = riders.iter().find(|r| !seen.insert(r.id.as_str())) {
        return Err(DispatchError::DuplicateId(format!("rider {}", dup.id)));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = drivers.iter().find(|d| !seen.insert(d.id.as_str())) {
        return Err(DispatchError::DuplicateId(format!("driver {}", dup.id)));
    }
    Ok(())
}
