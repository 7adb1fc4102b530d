//! OSRM `/route` backend.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::{RouteError, RouteProvider, RouteResult};
use crate::spatial::Coordinate;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes via an OSRM HTTP endpoint.
pub struct OsrmRouteProvider {
    client: Option<Client>,
    endpoint: String,
}

impl OsrmRouteProvider {
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build();
        if let Err(err) = &client {
            tracing::warn!(error = %err, "failed to build OSRM client; every route will fail");
        }
        Self {
            client: client.ok(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, from: Coordinate, to: Coordinate) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.endpoint, from.lng, from.lat, to.lng, to.lat,
        )
    }
}

/// Minimal OSRM JSON response structures.
#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64, // metres
    duration: f64, // seconds
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>, // [lng, lat]
}

fn parse_response(resp: OsrmResponse) -> Result<RouteResult, RouteError> {
    match resp.code.as_str() {
        "Ok" => {}
        "NoRoute" | "NoSegment" => return Err(RouteError::Unreachable),
        other => return Err(RouteError::Provider(other.to_string())),
    }
    let route = resp
        .routes
        .and_then(|routes| routes.into_iter().next())
        .ok_or(RouteError::Unreachable)?;

    // OSRM returns [lng, lat]; invalid points are dropped from the geometry.
    let geometry = route
        .geometry
        .coordinates
        .iter()
        .filter_map(|&[lng, lat]| Coordinate::new(lat, lng).ok())
        .collect();

    Ok(RouteResult {
        duration_secs: route.duration,
        distance_m: route.distance,
        geometry,
    })
}

impl RouteProvider for OsrmRouteProvider {
    fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| RouteError::Provider("OSRM client unavailable".into()))?;

        let response = client.get(self.url(from, to)).send().map_err(|err| {
            if err.is_timeout() {
                RouteError::Timeout(REQUEST_TIMEOUT)
            } else {
                RouteError::Provider(err.to_string())
            }
        })?;
        let parsed: OsrmResponse = response
            .json()
            .map_err(|err| RouteError::Provider(format!("invalid OSRM response: {err}")))?;
        parse_response(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<RouteResult, RouteError> {
        parse_response(serde_json::from_str(json).expect("valid json"))
    }

    #[test]
    fn parses_first_route() {
        let route = parse(
            r#"{"code":"Ok","routes":[{"distance":1200.5,"duration":180.0,
               "geometry":{"coordinates":[[-73.98,40.74],[-73.99,40.75]]}}]}"#,
        )
        .expect("route");
        assert_eq!(route.distance_m, 1200.5);
        assert_eq!(route.duration_secs, 180.0);
        assert_eq!(route.geometry[0].lat, 40.74);
    }

    #[test]
    fn no_route_is_unreachable() {
        assert_eq!(parse(r#"{"code":"NoRoute"}"#), Err(RouteError::Unreachable));
        assert_eq!(parse(r#"{"code":"Ok","routes":[]}"#), Err(RouteError::Unreachable));
    }

    #[test]
    fn builds_lng_lat_url() {
        let provider = OsrmRouteProvider::new("http://localhost:5000/");
        let url = provider.url(
            Coordinate::new(40.0, -73.0).unwrap(),
            Coordinate::new(41.0, -74.0).unwrap(),
        );
        assert!(url.starts_with("http://localhost:5000/route/v1/driving/-73,40;-74,41"));
    }
}
