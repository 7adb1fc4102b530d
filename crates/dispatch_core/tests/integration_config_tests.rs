use dispatch_core::config::{ConfigError, DispatchConfig};
use dispatch_core::flow::FlowRebalancer;
use dispatch_core::matching::AssignmentMatcher;
use dispatch_core::test_helpers::{eight_zone_snapshot, random_fleet};
use dispatch_core::training::run_rebalancing;

const SMALL_RUN: &str = r#"
[bandit]
arms = [
    { eta_weight = 1.0, dist_weight = 0.0 },
    { eta_weight = 0.5, dist_weight = 0.1 },
]

[matching]
max_concurrent_queries = 2
route_timeout_ms = 5000

[flow]
default_egress_cap = 1

[environment]
max_moves = 10

[agent]
hidden_layers = [16]
batch_size = 8
memory_size = 100
target_update_every = 10
seed = 7

[training]
episodes = 5
log_every = 5
"#;

#[test]
fn toml_config_drives_every_component() {
    let config = DispatchConfig::from_toml_str(SMALL_RUN).expect("config");
    assert_eq!(config.bandit.arms.len(), 2);
    assert_eq!(config.score.perfect_zone_weight, 0.7);

    let mut matcher = AssignmentMatcher::from_config(&config).expect("matcher");
    let (riders, drivers) = random_fleet(3, 3, 1);
    matcher.match_round(&riders, &drivers).expect("round");
    assert_eq!(matcher.bandit().arms().len(), 2);

    let snapshot = eight_zone_snapshot();
    let moves = FlowRebalancer::new(&config.flow).rebalance(&snapshot);
    for zone in 0..snapshot.len() {
        let sent: u32 = moves.iter().filter(|m| m.from_zone == zone).map(|m| m.count).sum();
        assert!(sent <= 1);
    }

    let report = run_rebalancing(&snapshot, &config).expect("run");
    assert_eq!(report.episode_cumulative_reward.len(), 5);
    assert!(report.agent_moves.len() <= 10);
}

#[test]
fn invalid_values_are_rejected() {
    let err = DispatchConfig::from_toml_str("[agent]\nbatch_size = 0\n").expect_err("invalid");
    assert!(matches!(err, ConfigError::Invalid(_)));

    let err = DispatchConfig::from_toml_str("[score]\nperfect_zone_weight = 1.5\n").expect_err("invalid");
    assert!(matches!(err, ConfigError::Invalid(_)));
}
