//! Route and cost matrices for one matching round.

use rayon::prelude::*;
use rayon::ThreadPool;

use super::types::{Driver, Rider};
use crate::bandit::CostWeights;
use crate::routing::{RouteError, RouteProvider};

/// Travel estimate for one driver → rider pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub duration_secs: f64,
    pub distance_m: f64,
}

/// `riders × drivers` route results; `None` marks an unreachable or timed-out pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatrix {
    legs: Vec<Vec<Option<Leg>>>,
    drivers: usize,
}

impl RouteMatrix {
    /// Query every driver → rider pair on `pool` and wait for all of them.
    ///
    /// The pool's thread count bounds how many queries are in flight.
    pub fn query(
        pool: &ThreadPool,
        provider: &dyn RouteProvider,
        riders: &[Rider],
        drivers: &[Driver],
    ) -> Self {
        let pairs: Vec<(usize, usize)> = (0..riders.len())
            .flat_map(|i| (0..drivers.len()).map(move |j| (i, j)))
            .collect();

        let flat: Vec<Option<Leg>> = pool.install(|| {
            pairs
                .par_iter()
                .map(|&(i, j)| {
                    match provider.route(drivers[j].location, riders[i].location) {
                        Ok(route) => Some(Leg {
                            duration_secs: route.duration_secs,
                            distance_m: route.distance_m,
                        }),
                        Err(RouteError::Unreachable) => None,
                        Err(err) => {
                            tracing::debug!(
                                rider = %riders[i].id,
                                driver = %drivers[j].id,
                                error = %err,
                                "route query failed, pair treated as unreachable"
                            );
                            None
                        }
                    }
                })
                .collect()
        });

        Self::from_flat(flat, drivers.len())
    }

    /// Build from row-major legs. `legs.len()` must be a multiple of `drivers`.
    pub fn from_flat(flat: Vec<Option<Leg>>, drivers: usize) -> Self {
        let legs = if drivers == 0 {
            Vec::new()
        } else {
            flat.chunks(drivers).map(<[Option<Leg>]>::to_vec).collect()
        };
        Self { legs, drivers }
    }

    pub fn from_rows(legs: Vec<Vec<Option<Leg>>>) -> Self {
        let drivers = legs.first().map_or(0, Vec::len);
        Self { legs, drivers }
    }

    pub fn riders(&self) -> usize {
        self.legs.len()
    }

    pub fn drivers(&self) -> usize {
        self.drivers
    }

    pub fn leg(&self, rider: usize, driver: usize) -> Option<Leg> {
        self.legs.get(rider).and_then(|row| row.get(driver)).copied().flatten()
    }

    /// Weighted costs, with `sentinel` for unreachable pairs.
    pub fn costs(&self, weights: CostWeights, sentinel: f64) -> CostMatrix {
        let values = self
            .legs
            .iter()
            .map(|row| {
                row.iter()
                    .map(|leg| match leg {
                        Some(leg) => weights.cost(leg.duration_secs, leg.distance_m),
                        None => sentinel,
                    })
                    .collect()
            })
            .collect();
        CostMatrix {
            values,
            cols: self.drivers,
            sentinel,
        }
    }
}

/// Dense rider × driver cost matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    values: Vec<Vec<f64>>,
    cols: usize,
    sentinel: f64,
}

impl CostMatrix {
    pub fn new(values: Vec<Vec<f64>>, sentinel: f64) -> Self {
        let cols = values.first().map_or(0, Vec::len);
        Self {
            values,
            cols,
            sentinel,
        }
    }

    pub fn rows(&self) -> usize {
        self.values.len()
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.values[row][col]
    }

    pub fn sentinel(&self) -> f64 {
        self.sentinel
    }

    /// True if the pair costs the sentinel (or more), i.e. it is unreachable.
    pub fn is_infeasible(&self, row: usize, col: usize) -> bool {
        self.at(row, col) >= self.sentinel
    }

    /// Summed cost of an assignment.
    pub fn total(&self, pairs: &[(usize, usize)]) -> f64 {
        pairs.iter().map(|&(r, c)| self.at(r, c)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::StraightLineRouteProvider;
    use crate::spatial::Coordinate;

    fn point(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).expect("valid coordinate")
    }

    #[test]
    fn parallel_queries_fill_every_pair() {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .build()
            .expect("pool");
        let riders = vec![
            Rider::new("r0", point(40.74, -73.98)),
            Rider::new("r1", point(40.76, -73.97)),
        ];
        let drivers = vec![
            Driver::new("d0", point(40.74, -73.98)),
            Driver::new("d1", point(40.75, -73.99)),
            Driver::new("d2", point(40.80, -73.95)),
        ];
        let matrix = RouteMatrix::query(
            &pool,
            &StraightLineRouteProvider::default(),
            &riders,
            &drivers,
        );
        assert_eq!(matrix.riders(), 2);
        assert_eq!(matrix.drivers(), 3);
        assert_eq!(matrix.leg(0, 0).map(|leg| leg.duration_secs), Some(0.0));
        assert!(matrix.leg(1, 2).is_some());
    }

    #[test]
    fn unreachable_pairs_take_the_sentinel() {
        let leg = Leg {
            duration_secs: 60.0,
            distance_m: 500.0,
        };
        let matrix = RouteMatrix::from_rows(vec![vec![Some(leg), None]]);
        let costs = matrix.costs(CostWeights::new(1.0, 0.1), 1e9);
        assert_eq!(costs.at(0, 0), 110.0);
        assert_eq!(costs.at(0, 1), 1e9);
        assert!(costs.is_infeasible(0, 1));
        assert!(!costs.is_infeasible(0, 0));
    }
}
