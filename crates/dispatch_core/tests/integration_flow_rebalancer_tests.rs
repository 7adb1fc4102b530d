use std::collections::HashMap;

use dispatch_core::config::FlowConfig;
use dispatch_core::flow::FlowRebalancer;
use dispatch_core::test_helpers::{city_snapshot, eight_zone_snapshot, point_near};
use dispatch_core::{Move, Zone, ZoneSnapshot};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn totals_by_zone(moves: &[Move], zones: usize) -> (Vec<u32>, Vec<u32>) {
    let mut out = vec![0; zones];
    let mut inn = vec![0; zones];
    for mv in moves {
        out[mv.from_zone] += mv.count;
        inn[mv.to_zone] += mv.count;
    }
    (out, inn)
}

#[test]
fn eight_zone_relocation_drains_every_surplus() {
    let snapshot = eight_zone_snapshot();
    let moves = FlowRebalancer::default().rebalance(&snapshot);
    let (out, inn) = totals_by_zone(&moves, snapshot.len());

    // Surplus zones 0, 3 and 5 hold 1 + 2 + 2 spare drivers; all of them move.
    assert_eq!(out, vec![1, 0, 0, 2, 0, 2, 0, 0]);
    assert_eq!(inn.iter().sum::<u32>(), 5);
    for (zone, &received) in snapshot.zones().iter().zip(&inn) {
        assert!(received <= zone.deficit(), "{} over-served", zone.id);
    }
    for mv in &moves {
        assert_ne!(mv.from_zone, mv.to_zone);
        assert!(mv.count > 0);
    }

    let (after, applied) = snapshot.apply_moves(&moves).expect("valid moves");
    assert_eq!(applied, moves);
    assert_eq!(after.total_drivers(), snapshot.total_drivers());
    assert!(after.zones().iter().all(|zone| zone.surplus() == 0));
}

#[test]
fn conservation_and_caps_hold_on_random_snapshots() {
    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..100 {
        let zones: Vec<Zone> = (0..rng.gen_range(2..10))
            .map(|i| {
                let mut zone = Zone::new(format!("h{i}"), rng.gen_range(0..12), rng.gen_range(0..12))
                    .with_coordinate(point_near(rng.gen_range(-0.1..0.1), rng.gen_range(-0.1..0.1)));
                if rng.gen_bool(0.3) {
                    zone = zone.with_egress_cap(rng.gen_range(0..4));
                }
                zone
            })
            .collect();
        let snapshot = ZoneSnapshot::new(zones).expect("snapshot");
        let moves = FlowRebalancer::default().rebalance(&snapshot);
        let (out, inn) = totals_by_zone(&moves, snapshot.len());

        let mut sendable = 0;
        let mut demand = 0;
        for (idx, zone) in snapshot.zones().iter().enumerate() {
            let cap = zone.egress_cap.map_or(zone.surplus(), |c| c.min(zone.surplus()));
            assert!(out[idx] <= cap);
            assert!(inn[idx] <= zone.deficit());
            sendable += cap;
            demand += zone.deficit();
        }
        // Every zone may reach every other, so the flow is as large as possible.
        assert_eq!(out.iter().sum::<u32>(), sendable.min(demand));

        let (after, _) = snapshot.apply_moves(&moves).expect("valid moves");
        assert_eq!(after.total_drivers(), snapshot.total_drivers());
    }
}

#[test]
fn city_snapshot_with_default_cap() {
    let snapshot = city_snapshot();
    let rebalancer = FlowRebalancer::new(&FlowConfig {
        default_egress_cap: Some(1),
        ..FlowConfig::default()
    });
    let moves = rebalancer.rebalance(&snapshot);
    let (out, _) = totals_by_zone(&moves, snapshot.len());
    assert!(out.iter().all(|&sent| sent <= 1));
    assert_eq!(
        out.iter().sum::<u32>(),
        snapshot.zones().iter().filter(|z| z.surplus() > 0).count() as u32
    );

    let caps: HashMap<String, u32> = snapshot
        .zones()
        .iter()
        .map(|zone| (zone.id.clone(), 0))
        .collect();
    assert!(rebalancer.rebalance_with_caps(&snapshot, &caps).is_empty());
}
