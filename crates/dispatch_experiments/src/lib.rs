//! Parallel experiment runs for the learned zone rebalancer.
//!
//! Each run trains a fresh agent on the same zone snapshot with its own
//! seed and hyper-parameters, then scores the agent, the greedy oracle and
//! the flow rebalancer side by side.
//!
//! ```no_run
//! use dispatch_experiments::{export_to_csv, find_best_result_index, run_parallel_experiments, ExperimentSpace};
//! use dispatch_core::test_helpers::city_snapshot;
//!
//! let runs = ExperimentSpace::grid()
//!     .seeds(vec![1, 2, 3])
//!     .episodes(vec![100, 300])
//!     .generate();
//! let results = run_parallel_experiments(&city_snapshot(), &runs, None).unwrap();
//! let best = find_best_result_index(&results).unwrap();
//! export_to_csv(&results, &runs, "runs.csv").unwrap();
//! println!("best run: {}", runs[best].experiment_id);
//! ```
//!
//! - [`parameters`]: grid and random sampling over seeds and training settings
//! - [`runner`]: rayon-parallel execution with a progress bar
//! - [`metrics`]: per-run comparison numbers
//! - [`export`]: JSON/CSV export and ranking

pub mod export;
pub mod metrics;
pub mod parameters;
pub mod runner;

pub use export::{export_to_csv, export_to_json, find_best_result_index};
pub use metrics::RunResult;
pub use parameters::{ExperimentRun, ExperimentSpace};
pub use runner::{run_parallel_experiments, run_single_experiment, ExperimentError};
