//! Pluggable route providers: the routing oracle the matcher queries.
//!
//! Implementations, selectable via [`RouteProviderKind`]:
//!
//! - **`StraightLineRouteProvider`**: Haversine distance at a fixed average speed.
//!   Zero dependencies, never unreachable.
//! - **`OsrmRouteProvider`** (feature `osrm`): Calls a local/remote OSRM HTTP endpoint.
//! - **`PrecomputedRouteProvider`** (feature `precomputed`): Loads a serialized route table from disk.
//!
//! Two wrappers compose with any of them: [`CachedRouteProvider`] (LRU) and
//! [`DeadlineRouteProvider`], which turns a stalled query into
//! [`RouteError::Timeout`] so one slow pair cannot hold up a matching round.

use std::num::NonZeroUsize;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spatial::Coordinate;

#[cfg(feature = "osrm")]
pub mod osrm;

#[cfg(feature = "precomputed")]
pub mod precomputed;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// Result of a route query between two coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteResult {
    /// Travel time in seconds.
    pub duration_secs: f64,
    /// Road-network distance in meters.
    pub distance_m: f64,
    /// Ordered waypoints along the route (may be just the two endpoints).
    pub geometry: Vec<Coordinate>,
}

/// Why a route query produced no route.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error("no route between the given points")]
    Unreachable,
    #[error("route query timed out after {0:?}")]
    Timeout(Duration),
    #[error("route provider failed: {0}")]
    Provider(String),
}

/// Which routing backend to use.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum RouteProviderKind {
    /// Straight-line distance at 40 km/h with a 1.3 road detour factor.
    #[default]
    StraightLine,
    /// OSRM HTTP endpoint (e.g. `"http://localhost:5000"`).
    #[cfg(feature = "osrm")]
    Osrm { endpoint: String },
    /// Pre-computed route table loaded from a binary file at startup.
    #[cfg(feature = "precomputed")]
    Precomputed { path: String },
}

/// Trait for routing backends. Implementations must be `Send + Sync` so the
/// matcher can query them from its worker pool.
pub trait RouteProvider: Send + Sync {
    /// Compute a route from `from` to `to`.
    fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError>;
}

impl<P: RouteProvider + ?Sized> RouteProvider for Arc<P> {
    fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError> {
        (**self).route(from, to)
    }
}

// ---------------------------------------------------------------------------
// Straight-line provider (always available)
// ---------------------------------------------------------------------------

/// Estimates routes from great-circle distance.
#[derive(Debug, Clone, Copy)]
pub struct StraightLineRouteProvider {
    pub speed_kmh: f64,
    /// Road distance / straight-line distance.
    pub detour_factor: f64,
}

impl Default for StraightLineRouteProvider {
    fn default() -> Self {
        Self {
            speed_kmh: 40.0,
            detour_factor: 1.3,
        }
    }
}

impl RouteProvider for StraightLineRouteProvider {
    fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError> {
        let distance_m = from.distance_m(&to) * self.detour_factor;
        let duration_secs = if distance_m > 0.0 {
            (distance_m / 1000.0) / self.speed_kmh * 3600.0
        } else {
            0.0
        };
        Ok(RouteResult {
            duration_secs,
            distance_m,
            geometry: vec![from, to],
        })
    }
}

// ---------------------------------------------------------------------------
// Caching wrapper
// ---------------------------------------------------------------------------

/// Coordinates quantized to ~0.1 m, usable as a hash key.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoordKey(pub i64, pub i64);

impl From<Coordinate> for CoordKey {
    fn from(c: Coordinate) -> Self {
        Self((c.lat * 1e6).round() as i64, (c.lng * 1e6).round() as i64)
    }
}

/// LRU-cached wrapper around any [`RouteProvider`].
///
/// Cache key is `(from, to)` quantized (directional). Only successful routes
/// are cached; failures are retried on the next query.
pub struct CachedRouteProvider {
    inner: Arc<dyn RouteProvider>,
    cache: Mutex<LruCache<(CoordKey, CoordKey), RouteResult>>,
}

impl CachedRouteProvider {
    pub fn new(inner: Arc<dyn RouteProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteProvider for CachedRouteProvider {
    fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError> {
        let key = (CoordKey::from(from), CoordKey::from(to));

        // Fast path: cache hit
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&key) {
                return Ok(cached.clone());
            }
        }

        let result = self.inner.route(from, to)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, result.clone());
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Deadline wrapper
// ---------------------------------------------------------------------------

/// Reply channel for one deadline-bound query.
type RouteReply = mpsc::SyncSender<Result<RouteResult, RouteError>>;

struct RouteJob {
    from: Coordinate,
    to: Coordinate,
    expires_at: Option<Instant>,
    reply: RouteReply,
}

/// Enforces a wall-clock deadline on each query.
///
/// Queries run on a fixed set of worker threads. A caller that misses its
/// deadline gets [`RouteError::Timeout`], but the worker stays busy until the
/// inner provider really answers, so at most `workers` inner queries are ever
/// in flight. Jobs that expire while still queued are skipped.
pub struct DeadlineRouteProvider {
    jobs: Mutex<mpsc::Sender<RouteJob>>,
    timeout: Duration,
}

impl DeadlineRouteProvider {
    /// Spawn `workers` query threads (at least one) around `inner`.
    pub fn new(
        inner: Arc<dyn RouteProvider>,
        timeout: Duration,
        workers: usize,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<RouteJob>();
        let rx = Arc::new(Mutex::new(rx));
        for idx in 0..workers.max(1) {
            let inner = Arc::clone(&inner);
            let rx = Arc::clone(&rx);
            thread::Builder::new()
                .name(format!("route-query-{idx}"))
                .spawn(move || run_route_worker(inner.as_ref(), &rx))?;
        }
        Ok(Self {
            jobs: Mutex::new(tx),
            timeout,
        })
    }
}

/// Worker loop; exits once the owning provider is dropped.
fn run_route_worker(inner: &dyn RouteProvider, jobs: &Mutex<mpsc::Receiver<RouteJob>>) {
    loop {
        let next = match jobs.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => return,
        };
        let Ok(job) = next else {
            return;
        };
        if job.expires_at.is_some_and(|at| Instant::now() >= at) {
            continue;
        }
        let _ = job.reply.send(inner.route(job.from, job.to));
    }
}

impl RouteProvider for DeadlineRouteProvider {
    fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError> {
        let (reply, rx) = mpsc::sync_channel(1);
        let job = RouteJob {
            from,
            to,
            expires_at: Instant::now().checked_add(self.timeout),
            reply,
        };
        self.jobs
            .lock()
            .map_err(|_| RouteError::Provider("route job queue poisoned".into()))?
            .send(job)
            .map_err(|_| RouteError::Provider("route query workers are gone".into()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(RouteError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(RouteError::Provider("route query worker panicked".into()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Factory: build a provider from RouteProviderKind
// ---------------------------------------------------------------------------

/// Default route cache capacity (used by OSRM and precomputed providers).
#[cfg(any(feature = "osrm", feature = "precomputed"))]
const DEFAULT_ROUTE_CACHE_CAPACITY: usize = 20_000;

/// Construct a shared [`RouteProvider`] from a [`RouteProviderKind`] descriptor.
///
/// - `StraightLine` is returned without caching (it is pure arithmetic).
/// - `Osrm` and `Precomputed` providers are wrapped in a [`CachedRouteProvider`].
/// - A precomputed table that fails to load falls back to `StraightLine`.
pub fn build_route_provider(kind: &RouteProviderKind) -> Arc<dyn RouteProvider> {
    match kind {
        RouteProviderKind::StraightLine => Arc::new(StraightLineRouteProvider::default()),

        #[cfg(feature = "osrm")]
        RouteProviderKind::Osrm { endpoint } => {
            let inner = Arc::new(osrm::OsrmRouteProvider::new(endpoint));
            Arc::new(CachedRouteProvider::new(inner, DEFAULT_ROUTE_CACHE_CAPACITY))
        }

        #[cfg(feature = "precomputed")]
        RouteProviderKind::Precomputed { path } => {
            match precomputed::PrecomputedRouteProvider::from_file(path) {
                Ok(provider) => Arc::new(CachedRouteProvider::new(
                    Arc::new(provider),
                    DEFAULT_ROUTE_CACHE_CAPACITY,
                )),
                Err(err) => {
                    tracing::warn!(
                        path = %path,
                        error = %err,
                        "failed to load pre-computed route table, falling back to straight-line routing"
                    );
                    Arc::new(StraightLineRouteProvider::default())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl RouteProvider for CountingProvider {
        fn route(&self, from: Coordinate, to: Coordinate) -> Result<RouteResult, RouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StraightLineRouteProvider::default().route(from, to)
        }
    }

    struct StalledProvider;

    impl RouteProvider for StalledProvider {
        fn route(&self, _from: Coordinate, _to: Coordinate) -> Result<RouteResult, RouteError> {
            thread::sleep(Duration::from_millis(500));
            Err(RouteError::Unreachable)
        }
    }

    /// Sleeps on every query and records the most queries seen at once.
    #[derive(Default)]
    struct PeakProvider {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RouteProvider for PeakProvider {
        fn route(&self, _from: Coordinate, _to: Coordinate) -> Result<RouteResult, RouteError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(100));
            self.running.fetch_sub(1, Ordering::SeqCst);
            Err(RouteError::Unreachable)
        }
    }

    fn point(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).expect("valid coordinate")
    }

    #[test]
    fn straight_line_scales_with_distance() {
        let provider = StraightLineRouteProvider::default();
        let origin = point(40.74, -73.98);
        let near = provider.route(origin, point(40.75, -73.98)).unwrap();
        let far = provider.route(origin, point(40.80, -73.98)).unwrap();
        assert!(near.duration_secs > 0.0);
        assert!(far.duration_secs > near.duration_secs);
        assert!(far.distance_m > near.distance_m);
        assert_eq!(provider.route(origin, origin).unwrap().duration_secs, 0.0);
    }

    #[test]
    fn cache_hits_skip_inner_provider() {
        let inner = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
        });
        let cached = CachedRouteProvider::new(inner.clone(), 16);
        let (a, b) = (point(40.74, -73.98), point(40.75, -73.99));
        let first = cached.route(a, b).unwrap();
        let second = cached.route(a, b).unwrap();
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        cached.route(b, a).unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2, "cache key is directional");
        assert_eq!(cached.len(), 2);
    }

    #[test]
    fn deadline_converts_stall_into_timeout() {
        let provider =
            DeadlineRouteProvider::new(Arc::new(StalledProvider), Duration::from_millis(20), 1)
                .expect("workers");
        let err = provider
            .route(point(40.74, -73.98), point(40.75, -73.99))
            .unwrap_err();
        assert!(matches!(err, RouteError::Timeout(_)));
    }

    #[test]
    fn timed_out_queries_keep_their_worker() {
        let inner = Arc::new(PeakProvider::default());
        let provider = Arc::new(
            DeadlineRouteProvider::new(inner.clone(), Duration::from_millis(5), 2)
                .expect("workers"),
        );
        let callers: Vec<_> = (0..16u32)
            .map(|i| {
                let provider = Arc::clone(&provider);
                thread::spawn(move || {
                    for _ in 0..4 {
                        let to = point(40.75 + f64::from(i) * 0.001, -73.99);
                        let result = provider.route(point(40.74, -73.98), to);
                        assert_eq!(result, Err(RouteError::Timeout(Duration::from_millis(5))));
                    }
                })
            })
            .collect();
        for caller in callers {
            caller.join().expect("caller thread");
        }
        assert!(inner.peak.load(Ordering::SeqCst) >= 1);
        assert!(inner.peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn deadline_passes_through_fast_answers() {
        let provider = DeadlineRouteProvider::new(
            Arc::new(StraightLineRouteProvider::default()),
            Duration::from_secs(5),
            2,
        )
        .expect("workers");
        assert!(provider
            .route(point(40.74, -73.98), point(40.75, -73.99))
            .is_ok());
    }

    #[test]
    fn route_provider_kind_default_is_straight_line() {
        assert_eq!(RouteProviderKind::default(), RouteProviderKind::StraightLine);
        let provider = build_route_provider(&RouteProviderKind::StraightLine);
        assert!(provider
            .route(point(40.74, -73.98), point(40.75, -73.99))
            .is_ok());
    }
}
