//! Configuration for the dispatch engine.

use serde::{Deserialize, Serialize};

/// Configuration shared by the watch loop, the router loop, and dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long to sleep between inventory scans (milliseconds)
    pub watch_interval_ms: u64,

    /// How long to sleep between pending-request sweeps (milliseconds)
    pub router_interval_ms: u64,

    /// Units requested when a shortage is detected:
    /// `units_needed = critical_threshold * threshold_multiplier`
    pub threshold_multiplier: u32,

    /// Donors farther than this from the hospital are never paged (km)
    pub max_distance_km: f64,

    /// Timeout for a single notification send (milliseconds)
    pub notify_timeout_ms: u64,

    /// Timeout for a single route/ETA lookup (milliseconds)
    pub route_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            watch_interval_ms: 60_000,
            router_interval_ms: 10_000,
            threshold_multiplier: 2,
            max_distance_km: 50.0,
            notify_timeout_ms: 10_000,
            route_timeout_ms: 5_000,
        }
    }
}
