//! Sweep seeds and episode budgets on the 25-zone city snapshot, then export
//! the comparison against the greedy oracle and the flow rebalancer.
//!
//! Run with: cargo run --release -p dispatch_experiments --example rebalancing_sweep

use dispatch_core::test_helpers::{city_snapshot, fast_config};
use dispatch_experiments::{
    export_to_csv, export_to_json, find_best_result_index, run_parallel_experiments,
    ExperimentSpace,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Starting rebalancing sweep...");

    let runs = ExperimentSpace::grid()
        .with_base(fast_config(100))
        .seeds(vec![1, 2, 3, 4])
        .episodes(vec![100, 300])
        .egress_caps(vec![None, Some(2)])
        .generate();
    println!("Generated {} runs", runs.len());

    let snapshot = city_snapshot();
    let results = run_parallel_experiments(&snapshot, &runs, None)?;
    println!("Completed {} runs", results.len());

    let best_idx = find_best_result_index(&results).ok_or("No results to analyze")?;
    let best = &results[best_idx];
    let run = &runs[best_idx];

    println!("\n=== Best Run ===");
    println!(
        "{} (seed {}, {} episodes, egress cap {:?})",
        run.experiment_id,
        run.seed(),
        run.episodes(),
        run.config.flow.default_egress_cap
    );
    println!(
        "Agent score {:.3} vs oracle {:.3} vs flow {:.3}",
        best.agent_score, best.oracle_score, best.flow_score
    );
    println!(
        "Accuracy vs oracle {:.3}, success rate {:.1}%",
        best.accuracy_overall, best.relocation_success_rate
    );

    export_to_csv(&results, &runs, "rebalancing_sweep.csv")?;
    export_to_json(&results, "rebalancing_sweep.json")?;
    println!("\nResults written to rebalancing_sweep.csv and rebalancing_sweep.json");
    Ok(())
}
