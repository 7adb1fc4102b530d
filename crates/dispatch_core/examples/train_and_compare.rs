//! Train the relocation policy on the 25-zone city snapshot and compare it
//! with the greedy oracle and the flow rebalancer.
//!
//! Run with: RUST_LOG=info cargo run -p dispatch_core --example train_and_compare

use dispatch_core::flow::FlowRebalancer;
use dispatch_core::score::balance_score;
use dispatch_core::test_helpers::{city_snapshot, fast_config};
use dispatch_core::training::run_rebalancing;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    const EPISODES: usize = 200;
    let config = fast_config(EPISODES);
    let snapshot = city_snapshot();

    let report = run_rebalancing(&snapshot, &config)?;
    let summary = &report.summary;

    let flow_moves = FlowRebalancer::new(&config.flow).rebalance(&snapshot);
    let (after_flow, applied) = snapshot.apply_moves(&flow_moves)?;
    let flow_score = balance_score(
        &after_flow.imbalances(),
        &snapshot.riders(),
        config.score.perfect_zone_weight,
    )?;

    println!("--- Rebalancing ({} zones, {} episodes) ---", summary.total_zones, EPISODES);
    println!(
        "Agent:  score={:.3} balanced={}/{} moves={}",
        summary.agent.score.score, summary.agent.balanced_zones, summary.total_zones, summary.agent.total_moves
    );
    println!(
        "Oracle: score={:.3} balanced={}/{} moves={}",
        summary.oracle.score.score, summary.oracle.balanced_zones, summary.total_zones, summary.oracle.total_moves
    );
    println!(
        "Flow:   score={:.3} moves={} drivers moved={}",
        flow_score.score,
        applied.len(),
        applied.iter().map(|mv| mv.count).sum::<u32>()
    );
    println!(
        "Accuracy vs oracle: overall={:.3} perfect_zones={:.3} similarity={:.3}",
        summary.accuracy.overall, summary.accuracy.perfect_zones, summary.accuracy.state_similarity
    );
    println!(
        "Avg reward/episode={:.2} success rate={:.1}% best episode={:?}",
        summary.average_reward_per_episode, summary.relocation_success_rate, summary.best_episode
    );

    println!("\nAgent moves:");
    for mv in &report.agent_moves {
        println!(
            "  {} -> {} x{}  reward={:.2} confidence={:.3}",
            mv.movement.from_zone_id, mv.movement.to_zone_id, mv.movement.count, mv.reward, mv.confidence_score
        );
    }
    Ok(())
}
