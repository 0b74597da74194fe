//! Driving-route and ETA lookup.
//!
//! Route annotations are optional enrichment for donor notifications. A
//! failed or unavailable lookup degrades to `None`; donors are still ranked
//! and paged on great-circle distance alone.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::geo::Coordinates;

/// Driving route annotation between a donor and a hospital.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub distance_km: f64,
    pub eta_minutes: f64,

    /// Clickable navigation link included in the donor message.
    pub maps_link: String,
}

/// Trait for looking up driving routes.
#[async_trait]
pub trait RouteLookup: Send + Sync {
    /// Route from `origin` to `dest`, or `None` when the routing service
    /// cannot produce one. Bounded by `timeout_ms`.
    async fn route_info(
        &self,
        origin: Coordinates,
        dest: Coordinates,
        timeout_ms: u64,
    ) -> Result<Option<RouteInfo>>;
}

// ============================================================================
// Production Implementation using the public OSRM API
// ============================================================================

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    /// Meters
    distance: f64,
    /// Seconds
    duration: f64,
}

/// Route lookup backed by an OSRM routing server.
pub struct OsrmRouteLookup {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmRouteLookup {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: "https://router.project-osrm.org".to_string(),
        }
    }

    /// Point at a different OSRM server (self-hosted or test).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn maps_link(origin: Coordinates, dest: Coordinates) -> String {
        format!(
            "http://map.project-osrm.org/?z=14&center={},{}&loc={},{}&loc={},{}&hl=en&alt=0",
            origin.latitude,
            origin.longitude,
            origin.latitude,
            origin.longitude,
            dest.latitude,
            dest.longitude,
        )
    }
}

impl Default for OsrmRouteLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteLookup for OsrmRouteLookup {
    #[tracing::instrument(skip(self))]
    async fn route_info(
        &self,
        origin: Coordinates,
        dest: Coordinates,
        timeout_ms: u64,
    ) -> Result<Option<RouteInfo>> {
        // OSRM takes lon,lat pairs
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=false",
            self.base_url, origin.longitude, origin.latitude, dest.longitude, dest.latitude,
        );

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Route lookup failed");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = response.status().as_u16(), "Route lookup rejected");
            return Ok(None);
        }

        let parsed: OsrmResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed routing response");
                return Ok(None);
            }
        };

        if parsed.code != "Ok" {
            tracing::debug!(code = %parsed.code, "No route available");
            return Ok(None);
        }

        Ok(parsed.routes.first().map(|route| RouteInfo {
            distance_km: route.distance / 1000.0,
            eta_minutes: route.duration / 60.0,
            maps_link: Self::maps_link(origin, dest),
        }))
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

/// Mock route lookup for testing.
///
/// Returns a fixed route (or `None` by default) and counts lookups. Can be
/// switched into a failing mode to exercise graceful degradation.
#[derive(Clone, Default)]
pub struct MockRouteLookup {
    route: Arc<Mutex<Option<RouteInfo>>>,
    fail: Arc<Mutex<bool>>,
    lookups: Arc<Mutex<usize>>,
}

impl MockRouteLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this route for every lookup.
    pub fn set_route(&self, route: RouteInfo) {
        *self.route.lock() = Some(route);
    }

    /// Make every lookup return an error.
    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    /// Number of lookups performed.
    pub fn lookup_count(&self) -> usize {
        *self.lookups.lock()
    }
}

#[async_trait]
impl RouteLookup for MockRouteLookup {
    async fn route_info(
        &self,
        _origin: Coordinates,
        _dest: Coordinates,
        _timeout_ms: u64,
    ) -> Result<Option<RouteInfo>> {
        *self.lookups.lock() += 1;
        if *self.fail.lock() {
            return Err(anyhow::anyhow!("mock routing outage").into());
        }
        Ok(self.route.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_route_lookup_defaults_to_none() {
        let mock = MockRouteLookup::new();
        let origin = Coordinates::new(28.70, 77.10);
        let dest = Coordinates::new(28.61, 77.21);

        let route = mock.route_info(origin, dest, 5000).await.unwrap();
        assert!(route.is_none());
        assert_eq!(mock.lookup_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_route_lookup_returns_configured_route() {
        let mock = MockRouteLookup::new();
        mock.set_route(RouteInfo {
            distance_km: 16.0,
            eta_minutes: 25.0,
            maps_link: "http://map.example".to_string(),
        });

        let route = mock
            .route_info(
                Coordinates::new(28.70, 77.10),
                Coordinates::new(28.61, 77.21),
                5000,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(route.eta_minutes, 25.0);
    }

    #[test]
    fn test_osrm_maps_link_contains_both_endpoints() {
        let link = OsrmRouteLookup::maps_link(
            Coordinates::new(28.70, 77.10),
            Coordinates::new(28.61, 77.21),
        );
        assert!(link.contains("loc=28.7,77.1"));
        assert!(link.contains("loc=28.61,77.21"));
    }
}
