use crate::metrics::RunResult;
use crate::parameters::ExperimentRun;

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(crate) fn export_to_csv_impl(
    results: &[RunResult],
    runs: &[ExperimentRun],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    if results.len() != runs.len() {
        return Err(format!(
            "Results length ({}) doesn't match runs length ({})",
            results.len(),
            runs.len()
        )
        .into());
    }

    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "experiment_id",
        "run_id",
        "seed",
        "episodes",
        "learning_rate",
        "epsilon_decay",
        "default_egress_cap",
        "total_zones",
        "agent_score",
        "agent_balanced_zones",
        "agent_moves",
        "oracle_score",
        "oracle_balanced_zones",
        "oracle_moves",
        "flow_score",
        "flow_balanced_zones",
        "flow_moves",
        "flow_drivers_moved",
        "accuracy_overall",
        "accuracy_perfect_zones",
        "accuracy_state_similarity",
        "average_reward_per_episode",
        "relocation_success_rate",
        "best_episode",
    ])?;

    for (result, run) in results.iter().zip(runs) {
        let config = &run.config;
        wtr.write_record([
            run.experiment_id.clone(),
            run.run_id.to_string(),
            run.seed().to_string(),
            run.episodes().to_string(),
            config.agent.learning_rate.to_string(),
            config.agent.epsilon_decay.to_string(),
            optional(config.flow.default_egress_cap),
            result.total_zones.to_string(),
            result.agent_score.to_string(),
            result.agent_balanced_zones.to_string(),
            result.agent_moves.to_string(),
            result.oracle_score.to_string(),
            result.oracle_balanced_zones.to_string(),
            result.oracle_moves.to_string(),
            result.flow_score.to_string(),
            result.flow_balanced_zones.to_string(),
            result.flow_moves.to_string(),
            result.flow_drivers_moved.to_string(),
            result.accuracy_overall.to_string(),
            result.accuracy_perfect_zones.to_string(),
            result.accuracy_state_similarity.to_string(),
            result.average_reward_per_episode.to_string(),
            result.relocation_success_rate.to_string(),
            optional(result.best_episode),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
