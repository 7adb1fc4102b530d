//! Zone snapshots and relocation moves.
//!
//! A [`ZoneSnapshot`] is the input shared by the flow rebalancer, the
//! environment and the oracle. Every solver clones it before mutating, so a
//! caller's snapshot is never changed behind its back.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};
use crate::spatial::{cell_centroid, Coordinate};

/// One geographic cell with its rider and driver counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    pub riders: u32,
    pub drivers: u32,
    #[serde(default)]
    pub coordinate: Option<Coordinate>,
    /// Per-zone override of the maximum drivers allowed to leave.
    #[serde(default)]
    pub egress_cap: Option<u32>,
    /// Zone ids this zone may send drivers to. `None` means any zone.
    #[serde(default)]
    pub adjacent: Option<HashSet<String>>,
}

impl Zone {
    pub fn new(id: impl Into<String>, riders: u32, drivers: u32) -> Self {
        Self {
            id: id.into(),
            riders,
            drivers,
            coordinate: None,
            egress_cap: None,
            adjacent: None,
        }
    }

    pub fn with_coordinate(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    pub fn with_egress_cap(mut self, cap: u32) -> Self {
        self.egress_cap = Some(cap);
        self
    }

    pub fn with_adjacent<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.adjacent = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// `riders − drivers`: positive is a deficit, negative a surplus.
    pub fn imbalance(&self) -> i64 {
        i64::from(self.riders) - i64::from(self.drivers)
    }

    pub fn surplus(&self) -> u32 {
        self.drivers.saturating_sub(self.riders)
    }

    pub fn deficit(&self) -> u32 {
        self.riders.saturating_sub(self.drivers)
    }

    /// Explicit coordinate, else the H3 centroid when the id is a cell index.
    pub fn location(&self) -> Option<Coordinate> {
        self.coordinate.or_else(|| cell_centroid(&self.id))
    }

    /// Whether this zone may send drivers to `other`.
    pub fn can_send_to(&self, other: &Zone) -> bool {
        self.adjacent
            .as_ref()
            .map_or(true, |adjacent| adjacent.contains(&other.id))
    }
}

/// Rider/driver counts for one zone in the mapping form of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCounts {
    pub riders: u32,
    pub drivers: u32,
}

/// Relocate `count` drivers from one zone index to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub from_zone: usize,
    pub to_zone: usize,
    pub count: u32,
}

impl Move {
    pub fn new(from_zone: usize, to_zone: usize, count: u32) -> Self {
        Self {
            from_zone,
            to_zone,
            count,
        }
    }
}

/// Ordered set of zones. Zone indices in [`Move`]s refer to this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    zones: Vec<Zone>,
}

impl ZoneSnapshot {
    /// Build a snapshot, rejecting duplicate ids and invalid coordinates.
    pub fn new(zones: Vec<Zone>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(zones.len());
        for zone in &zones {
            if !seen.insert(zone.id.as_str()) {
                return Err(DispatchError::DuplicateId(zone.id.clone()));
            }
            if let Some(coordinate) = &zone.coordinate {
                coordinate.validate()?;
            }
        }
        Ok(Self { zones })
    }

    /// Snapshot from `(riders, drivers)` pairs; zones are named `z0`, `z1`, ...
    pub fn from_counts(counts: &[(u32, u32)]) -> Self {
        Self {
            zones: counts
                .iter()
                .enumerate()
                .map(|(idx, &(riders, drivers))| Zone::new(format!("z{idx}"), riders, drivers))
                .collect(),
        }
    }

    /// Snapshot from the `zone_id → {riders, drivers}` mapping, ordered by id.
    pub fn from_map(map: BTreeMap<String, ZoneCounts>) -> Self {
        Self {
            zones: map
                .into_iter()
                .map(|(id, counts)| Zone::new(id, counts.riders, counts.drivers))
                .collect(),
        }
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn zone(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.zones.iter().position(|zone| zone.id == id)
    }

    pub fn riders(&self) -> Vec<u32> {
        self.zones.iter().map(|zone| zone.riders).collect()
    }

    pub fn drivers(&self) -> Vec<u32> {
        self.zones.iter().map(|zone| zone.drivers).collect()
    }

    pub fn imbalances(&self) -> Vec<i64> {
        self.zones.iter().map(Zone::imbalance).collect()
    }

    pub fn total_riders(&self) -> u64 {
        self.zones.iter().map(|zone| u64::from(zone.riders)).sum()
    }

    pub fn total_drivers(&self) -> u64 {
        self.zones.iter().map(|zone| u64::from(zone.drivers)).sum()
    }

    /// Apply moves in order to a clone of this snapshot.
    ///
    /// Each count is clamped to the drivers currently in the source zone and
    /// to the room left in the destination, so driver counts never wrap. Returns the new snapshot together with
    /// the moves as actually applied (zero-count moves dropped).
    pub fn apply_moves(&self, moves: &[Move]) -> Result<(ZoneSnapshot, Vec<Move>)> {
        let mut next = self.clone();
        let mut applied = Vec::with_capacity(moves.len());
        let zones = next.zones.len();
        for mv in moves {
            for zone in [mv.from_zone, mv.to_zone] {
                if zone >= zones {
                    return Err(DispatchError::ZoneOutOfRange { zone, zones });
                }
            }
            if mv.from_zone == mv.to_zone {
                continue;
            }
            let room = u32::MAX - next.zones[mv.to_zone].drivers;
            let count = mv.count.min(next.zones[mv.from_zone].drivers).min(room);
            if count == 0 {
                continue;
            }
            next.zones[mv.from_zone].drivers -= count;
            next.zones[mv.to_zone].drivers += count;
            applied.push(Move::new(mv.from_zone, mv.to_zone, count));
        }
        Ok((next, applied))
    }
}
