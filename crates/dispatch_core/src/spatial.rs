//! Spatial helpers: coordinates, Haversine distance and H3 cell centroids.
//!
//! Zones are usually H3 cells. When a zone carries no explicit coordinate but
//! its id parses as an H3 index, the cell centroid stands in for it.

use std::str::FromStr;

use h3o::{CellIndex, LatLng};
use serde::{Deserialize, Serialize};

use crate::error::{DispatchError, Result};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// WGS84 latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        let coordinate = Self { lat, lng };
        coordinate.validate()?;
        Ok(coordinate)
    }

    pub fn validate(&self) -> Result<()> {
        let valid = self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng);
        if valid {
            Ok(())
        } else {
            Err(DispatchError::InvalidCoordinate {
                lat: self.lat,
                lng: self.lng,
            })
        }
    }

    /// Great-circle distance in kilometres.
    pub fn haversine_km(&self, other: &Coordinate) -> f64 {
        let (lat1, lon1) = (self.lat.to_radians(), self.lng.to_radians());
        let (lat2, lon2) = (other.lat.to_radians(), other.lng.to_radians());
        let sin_dlat = ((lat2 - lat1) * 0.5).sin();
        let sin_dlon = ((lon2 - lon1) * 0.5).sin();
        let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
        let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
        EARTH_RADIUS_KM * c
    }

    pub fn distance_m(&self, other: &Coordinate) -> f64 {
        self.haversine_km(other) * 1000.0
    }
}

impl From<LatLng> for Coordinate {
    fn from(ll: LatLng) -> Self {
        Self {
            lat: ll.lat(),
            lng: ll.lng(),
        }
    }
}

/// Centroid of an H3 cell given as a hex string (e.g. `"872a100adffffff"`).
pub fn cell_centroid(cell: &str) -> Option<Coordinate> {
    let cell = CellIndex::from_str(cell).ok()?;
    Some(LatLng::from(cell).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_matches_known_distance() {
        // Berlin Alexanderplatz → Brandenburger Tor is roughly 2.6 km.
        let alex = Coordinate::new(52.5219, 13.4132).unwrap();
        let gate = Coordinate::new(52.5163, 13.3777).unwrap();
        let km = alex.haversine_km(&gate);
        assert!((2.3..2.9).contains(&km), "got {km}");
        assert_eq!(alex.haversine_km(&alex), 0.0);
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinate::new(91.0, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::NAN).is_err());
    }

    #[test]
    fn centroid_of_valid_cell() {
        let centroid = cell_centroid("8a1fb46622dffff").expect("valid cell");
        // Resolution-10 cell in the San Francisco Bay Area.
        assert!((37.0..38.5).contains(&centroid.lat));
        assert!((-123.0..-121.5).contains(&centroid.lng));
        assert!(cell_centroid("not-a-cell").is_none());
    }
}
