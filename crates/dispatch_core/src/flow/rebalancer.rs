//! Zone rebalancing as a single min-cost max-flow solve.
//!
//! Each surplus zone is wired to every reachable short zone; the solver
//! drains surplus into demand along the cheapest (nearest) pairs.

use std::collections::HashMap;

use super::network::{EdgeId, FlowError, FlowNetwork};
use crate::config::FlowConfig;
use crate::zone::{Move, Zone, ZoneSnapshot};

const SOURCE: usize = 0;
const SINK: usize = 1;
/// Zone `z` is node `z + ZONE_OFFSET`.
const ZONE_OFFSET: usize = 2;

/// One-shot driver relocation as a min-cost max-flow problem.
///
/// Surplus zones (more drivers than riders) feed demand zones (more riders
/// than drivers). Moving a driver costs the rounded distance in meters
/// between the zones, so nearer surplus is drained first.
#[derive(Debug, Clone, Default)]
pub struct FlowRebalancer {
    config: FlowConfig,
}

impl FlowRebalancer {
    pub fn new(config: &FlowConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Plan moves using each zone's own egress cap, or the configured default.
    pub fn rebalance(&self, snapshot: &ZoneSnapshot) -> Vec<Move> {
        self.rebalance_with_caps(snapshot, &HashMap::new())
    }

    /// Plan moves with per-zone egress caps keyed by zone id.
    ///
    /// A solver failure is logged and yields no moves.
    pub fn rebalance_with_caps(
        &self,
        snapshot: &ZoneSnapshot,
        caps: &HashMap<String, u32>,
    ) -> Vec<Move> {
        match self.plan(snapshot, caps) {
            Ok(moves) => moves,
            Err(err) => {
                tracing::warn!(error = %err, zones = snapshot.len(), "flow rebalancing failed");
                Vec::new()
            }
        }
    }

    fn egress_cap(&self, zone: &Zone, caps: &HashMap<String, u32>) -> Option<u32> {
        caps.get(&zone.id)
            .copied()
            .or(zone.egress_cap)
            .or(self.config.default_egress_cap)
    }

    fn plan(
        &self,
        snapshot: &ZoneSnapshot,
        caps: &HashMap<String, u32>,
    ) -> Result<Vec<Move>, FlowError> {
        let zones = snapshot.zones();
        let sources: Vec<usize> = (0..zones.len()).filter(|&z| zones[z].surplus() > 0).collect();
        let sinks: Vec<usize> = (0..zones.len()).filter(|&z| zones[z].deficit() > 0).collect();
        if sources.is_empty() || sinks.is_empty() {
            return Ok(Vec::new());
        }

        let mut network = FlowNetwork::new(zones.len() + ZONE_OFFSET);
        let mut supply_total = 0_usize;
        for &s in &sources {
            let supply = zones[s].surplus();
            let cap = self
                .egress_cap(&zones[s], caps)
                .map_or(supply, |cap| cap.min(supply));
            if cap > 0 {
                network.add_edge(SOURCE, s + ZONE_OFFSET, i64::from(cap), 0)?;
                supply_total += cap as usize;
            }
        }
        for &d in &sinks {
            network.add_edge(d + ZONE_OFFSET, SINK, i64::from(zones[d].deficit()), 0)?;
        }

        let mut pairs: Vec<(usize, usize, EdgeId)> = Vec::new();
        for &s in &sources {
            for &d in &sinks {
                if !zones[s].can_send_to(&zones[d]) {
                    continue;
                }
                let cost = match (zones[s].location(), zones[d].location()) {
                    (Some(a), Some(b)) => a.distance_m(&b).round() as i64,
                    _ => self.config.unknown_distance_cost,
                };
                let mut capacity = zones[s].surplus().min(zones[d].deficit());
                if let Some(limit) = self.config.pairwise_capacity {
                    capacity = capacity.min(limit);
                }
                let edge =
                    network.add_edge(s + ZONE_OFFSET, d + ZONE_OFFSET, i64::from(capacity), cost)?;
                pairs.push((s, d, edge));
            }
        }

        let summary = network.min_cost_max_flow(SOURCE, SINK, supply_total + 1)?;
        let moves: Vec<Move> = pairs
            .into_iter()
            .filter_map(|(s, d, edge)| {
                let flow = network.flow(edge);
                (flow > 0).then(|| Move::new(s, d, u32::try_from(flow).unwrap_or(u32::MAX)))
            })
            .collect();

        tracing::debug!(
            zones = zones.len(),
            flow = summary.flow,
            cost = summary.cost,
            moves = moves.len(),
            "flow rebalancing solved"
        );
        Ok(moves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Coordinate;

    fn moved_out(moves: &[Move], zone: usize) -> u32 {
        moves.iter().filter(|m| m.from_zone == zone).map(|m| m.count).sum()
    }

    fn moved_in(moves: &[Move], zone: usize) -> u32 {
        moves.iter().filter(|m| m.to_zone == zone).map(|m| m.count).sum()
    }

    #[test]
    fn no_surplus_or_no_demand_means_no_moves() {
        let rebalancer = FlowRebalancer::default();
        let all_short = ZoneSnapshot::from_counts(&[(3, 1), (2, 0)]);
        assert!(rebalancer.rebalance(&all_short).is_empty());
        let balanced = ZoneSnapshot::from_counts(&[(2, 2), (1, 1)]);
        assert!(rebalancer.rebalance(&balanced).is_empty());
    }

    #[test]
    fn flow_stays_within_surplus_and_demand() {
        let snapshot = ZoneSnapshot::from_counts(&[(0, 5), (4, 1), (2, 0), (1, 3)]);
        let moves = FlowRebalancer::default().rebalance(&snapshot);
        // Supply 5 + 2, demand 3 + 2.
        assert_eq!(moves.iter().map(|m| m.count).sum::<u32>(), 5);
        for (z, zone) in snapshot.zones().iter().enumerate() {
            assert!(moved_out(&moves, z) <= zone.surplus());
            assert!(moved_in(&moves, z) <= zone.deficit());
        }
        let (after, _) = snapshot.apply_moves(&moves).expect("valid moves");
        assert_eq!(after.total_drivers(), snapshot.total_drivers());
    }

    #[test]
    fn explicit_caps_override_zone_and_default_caps() {
        let snapshot = ZoneSnapshot::new(vec![
            Zone::new("a", 0, 6).with_egress_cap(4),
            Zone::new("b", 10, 0),
        ])
        .expect("snapshot");
        let rebalancer = FlowRebalancer::new(&FlowConfig {
            default_egress_cap: Some(1),
            ..FlowConfig::default()
        });
        assert_eq!(moved_out(&rebalancer.rebalance(&snapshot), 0), 4);

        let caps = HashMap::from([("a".to_string(), 2)]);
        assert_eq!(moved_out(&rebalancer.rebalance_with_caps(&snapshot, &caps), 0), 2);

        let zero = HashMap::from([("a".to_string(), 0)]);
        assert!(rebalancer.rebalance_with_caps(&snapshot, &zero).is_empty());
    }

    #[test]
    fn large_surplus_meets_demand_exactly() {
        let snapshot = ZoneSnapshot::from_counts(&[(0, 25_000), (12_345, 0), (7, 0)]);
        let moves = FlowRebalancer::default().rebalance(&snapshot);
        assert_eq!(moved_in(&moves, 1), 12_345);
        assert_eq!(moved_in(&moves, 2), 7);
        assert_eq!(moved_out(&moves, 0), 12_352);
    }

    #[test]
    fn pairwise_limit_caps_each_pair() {
        let snapshot = ZoneSnapshot::from_counts(&[(0, 10), (8, 0)]);
        let rebalancer = FlowRebalancer::new(&FlowConfig {
            pairwise_capacity: Some(3),
            ..FlowConfig::default()
        });
        assert_eq!(rebalancer.rebalance(&snapshot), vec![Move::new(0, 1, 3)]);
    }

    #[test]
    fn nearer_surplus_is_used_first() {
        let at = |lat: f64| Coordinate::new(lat, -73.98).expect("valid coordinate");
        let snapshot = ZoneSnapshot::new(vec![
            Zone::new("far", 0, 2).with_coordinate(at(40.90)),
            Zone::new("near", 0, 2).with_coordinate(at(40.75)),
            Zone::new("short", 2, 0).with_coordinate(at(40.74)),
        ])
        .expect("snapshot");
        let moves = FlowRebalancer::default().rebalance(&snapshot);
        assert_eq!(moves, vec![Move::new(1, 2, 2)]);
    }

    #[test]
    fn adjacency_restricts_destinations() {
        let snapshot = ZoneSnapshot::new(vec![
            Zone::new("a", 0, 3).with_adjacent(["c"]),
            Zone::new("b", 2, 0),
            Zone::new("c", 1, 0),
        ])
        .expect("snapshot");
        let moves = FlowRebalancer::default().rebalance(&snapshot);
        assert_eq!(moves, vec![Move::new(0, 2, 1)]);
    }
}
