//! Shared fixtures for unit tests, integration tests and benches.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{AgentConfig, DispatchConfig, EnvironmentConfig, TrainingConfig};
use crate::matching::{Driver, Rider};
use crate::spatial::Coordinate;
use crate::zone::ZoneSnapshot;

/// A standard H3 cell (resolution 10, San Francisco) used across tests.
pub const TEST_CELL: &str = "8a1fb46622dffff";

/// `(riders, drivers)` per zone for the eight-zone relocation scenario.
pub const EIGHT_ZONE_COUNTS: [(u32, u32); 8] =
    [(3, 4), (4, 2), (6, 2), (2, 4), (4, 2), (0, 2), (7, 5), (3, 1)];

pub const CITY_RIDERS: [u32; 25] = [
    14, 6, 19, 18, 20, 25, 29, 12, 17, 22, 16, 19, 21, 18, 24, 20, 15, 27, 23, 14, 18, 16, 19,
    22, 26,
];

pub const CITY_DRIVERS: [u32; 25] = [
    15, 20, 15, 14, 15, 15, 16, 14, 18, 20, 17, 18, 19, 16, 22, 21, 16, 25, 21, 15, 17, 18, 20,
    21, 24,
];

pub fn eight_zone_snapshot() -> ZoneSnapshot {
    ZoneSnapshot::from_counts(&EIGHT_ZONE_COUNTS)
}

/// 25-zone city snapshot with fewer drivers than riders overall.
pub fn city_snapshot() -> ZoneSnapshot {
    let counts: Vec<(u32, u32)> = CITY_RIDERS.iter().copied().zip(CITY_DRIVERS).collect();
    ZoneSnapshot::from_counts(&counts)
}

/// Small network and short episodes so training finishes quickly in debug builds.
pub fn fast_config(episodes: usize) -> DispatchConfig {
    DispatchConfig {
        agent: AgentConfig {
            hidden_layers: vec![32, 32],
            batch_size: 16,
            memory_size: 2_000,
            target_update_every: 25,
            ..AgentConfig::default()
        },
        environment: EnvironmentConfig {
            max_moves: 30,
            ..EnvironmentConfig::default()
        },
        training: TrainingConfig {
            episodes,
            log_every: 25,
        },
        ..DispatchConfig::default()
    }
}

/// Point near midtown Manhattan, offset by `(dlat, dlng)` degrees.
pub fn point_near(dlat: f64, dlng: f64) -> Coordinate {
    Coordinate {
        lat: 40.75 + dlat,
        lng: -73.98 + dlng,
    }
}

fn scattered(rng: &mut StdRng) -> Coordinate {
    point_near(rng.gen_range(-0.05..0.05), rng.gen_range(-0.05..0.05))
}

/// `riders` riders and `drivers` drivers scattered over a ~10 km square.
pub fn random_fleet(riders: usize, drivers: usize, seed: u64) -> (Vec<Rider>, Vec<Driver>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let r = (0..riders)
        .map(|i| Rider::new(format!("rider-{i}"), scattered(&mut rng)))
        .collect();
    let d = (0..drivers)
        .map(|i| Driver::new(format!("driver-{i}"), scattered(&mut rng)))
        .collect();
    (r, d)
}
