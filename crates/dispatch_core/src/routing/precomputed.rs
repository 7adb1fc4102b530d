//! Pre-computed route table loaded from a bincode file.

use std::collections::HashMap;
use std::fs;

use serde::{Deserialize, Serialize};

use super::{CoordKey, RouteError, RouteProvider, RouteResult};
use crate::spatial::Coordinate;

/// Directional key for the route table.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoordPair(pub CoordKey, pub CoordKey);

impl CoordPair {
    pub fn new(from: Coordinate, to: Coordinate) -> Self {
        Self(from.into(), to.into())
    }
}

/// Route table: pairs missing from the table are unreachable.
pub struct PrecomputedRouteProvider {
    table: HashMap<CoordPair, RouteResult>,
}

impl PrecomputedRouteProvider {
    /// Load from a bincode-serialized file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let data = fs::read(path)?;
        let table: HashMap<CoordPair, RouteResult> = bincode::deserialize(&data)?;
        Ok(Self { table })
    }

    /// Create from an in-memory table (useful for tests).
    pub fn from_table(table: HashMap<CoordPair, RouteResult>) -> Self {
        Self { table }
    }

    /// Serialize a table to a file.
    pub fn save_to_file(
        table: &HashMap<CoordPair, RouteResult>,
        path: &str,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = bincode::serialize(table)?;
        fs::write(path, data)?;
        Ok(())
    }
}

impl RouteProvider for PrecomputedRouteProvider {
    fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError> {
        self.table
            .get(&CoordPair::new(from, to))
            .cloned()
            .ok_or(RouteError::Unreachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_directional_pairs() {
        let a = Coordinate::new(40.74, -73.98).unwrap();
        let b = Coordinate::new(40.75, -73.99).unwrap();
        let route = RouteResult {
            duration_secs: 120.0,
            distance_m: 900.0,
            geometry: vec![a, b],
        };
        let mut table = HashMap::new();
        table.insert(CoordPair::new(a, b), route.clone());
        let provider = PrecomputedRouteProvider::from_table(table);
        assert_eq!(provider.route(a, b), Ok(route));
        assert_eq!(provider.route(b, a), Err(RouteError::Unreachable));
    }

    #[test]
    fn round_trips_through_file() {
        let a = Coordinate::new(40.74, -73.98).unwrap();
        let b = Coordinate::new(40.75, -73.99).unwrap();
        let mut table = HashMap::new();
        table.insert(
            CoordPair::new(a, b),
            RouteResult {
                duration_secs: 60.0,
                distance_m: 500.0,
                geometry: Vec::new(),
            },
        );
        let file = tempfile::NamedTempFile::new().expect("temp file");
        let path = file.path().to_string_lossy().into_owned();
        PrecomputedRouteProvider::save_to_file(&table, &path).expect("save");
        let provider = PrecomputedRouteProvider::from_file(&path).expect("load");
        assert_eq!(provider.route(a, b).map(|r| r.duration_secs), Ok(60.0));
    }
}
