//! Parallel experiment execution using rayon.

use dispatch_core::flow::FlowRebalancer;
use dispatch_core::score::balance_score;
use dispatch_core::training::run_rebalancing;
use dispatch_core::{DispatchError, ZoneSnapshot};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use thiserror::Error;

use crate::metrics::{extract_metrics, FlowMetrics, RunResult};
use crate::parameters::ExperimentRun;

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("run {run_id} failed: {source}")]
    Run {
        run_id: usize,
        #[source]
        source: DispatchError,
    },
    #[error("failed to build experiment pool: {0}")]
    ThreadPool(String),
}

/// Train, rebalance and score one run.
pub fn run_single_experiment(
    snapshot: &ZoneSnapshot,
    run: &ExperimentRun,
) -> Result<RunResult, DispatchError> {
    let config = &run.config;
    let report = run_rebalancing(snapshot, config)?;

    let plan = FlowRebalancer::new(&config.flow).rebalance(snapshot);
    let (after, applied) = snapshot.apply_moves(&plan)?;
    let state = after.imbalances();
    let flow = FlowMetrics {
        score: balance_score(&state, &snapshot.riders(), config.score.perfect_zone_weight)?,
        balanced_zones: state.iter().filter(|&&v| v == 0).count(),
        moves: applied.len(),
        drivers_moved: applied.iter().map(|mv| mv.count).sum(),
    };

    let result = extract_metrics(&report, flow);
    tracing::debug!(
        run_id = run.run_id,
        seed = run.seed(),
        agent_score = result.agent_score,
        oracle_score = result.oracle_score,
        flow_score = result.flow_score,
        "experiment run finished"
    );
    Ok(result)
}

/// Run every experiment in parallel with a progress bar.
///
/// Results come back in the order of `runs`. `num_threads = None` uses
/// rayon's default.
pub fn run_parallel_experiments(
    snapshot: &ZoneSnapshot,
    runs: &[ExperimentRun],
    num_threads: Option<usize>,
) -> Result<Vec<RunResult>, ExperimentError> {
    run_parallel_experiments_with_progress(snapshot, runs, num_threads, true)
}

pub fn run_parallel_experiments_with_progress(
    snapshot: &ZoneSnapshot,
    runs: &[ExperimentRun],
    num_threads: Option<usize>,
    show_progress: bool,
) -> Result<Vec<RunResult>, ExperimentError> {
    let total = runs.len();
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Some(bar)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder
        .build()
        .map_err(|err| ExperimentError::ThreadPool(err.to_string()))?;

    let results = pool.install(|| {
        runs.par_iter()
            .map(|run| {
                let result = run_single_experiment(snapshot, run).map_err(|source| {
                    ExperimentError::Run {
                        run_id: run.run_id,
                        source,
                    }
                });
                if let Some(progress_bar) = &pb {
                    progress_bar.inc(1);
                }
                result
            })
            .collect::<Result<Vec<_>, _>>()
    });

    if let Some(progress_bar) = &pb {
        progress_bar.finish_with_message("Completed");
    }
    tracing::info!(runs = total, ok = results.is_ok(), "experiments finished");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ExperimentSpace;
    use dispatch_core::test_helpers::{eight_zone_snapshot, fast_config};

    #[test]
    fn single_run_compares_all_three() {
        let runs = ExperimentSpace::grid().with_base(fast_config(5)).generate();
        let result = run_single_experiment(&eight_zone_snapshot(), &runs[0]).expect("run");

        assert_eq!(result.total_zones, 8);
        // The flow plan drains all five surplus drivers.
        assert_eq!(result.flow_drivers_moved, 5);
        assert!(result.flow_score >= 0.0 && result.flow_score <= 1.0);
        assert!((0.0..=1.0).contains(&result.accuracy_overall));
        assert!(result.best_episode.is_some());
    }

    #[test]
    fn parallel_runs_keep_input_order() {
        let runs = ExperimentSpace::grid()
            .with_base(fast_config(3))
            .seeds(vec![1, 2])
            .episodes(vec![2, 3])
            .generate();
        let snapshot = eight_zone_snapshot();
        let results =
            run_parallel_experiments_with_progress(&snapshot, &runs, Some(2), false).expect("runs");
        assert_eq!(results.len(), 4);

        // Same seed and budget reproduce the same numbers.
        let again = run_single_experiment(&snapshot, &runs[2]).expect("run");
        assert_eq!(again, results[2]);
    }

    #[test]
    fn failing_run_reports_its_id() {
        let mut runs = ExperimentSpace::grid().with_base(fast_config(1)).generate();
        runs[0].config.agent.hidden_layers = vec![0];
        let err = run_parallel_experiments_with_progress(&eight_zone_snapshot(), &runs, Some(1), false)
            .expect_err("invalid agent config");
        assert!(matches!(err, ExperimentError::Run { run_id: 0, .. }));
    }
}
