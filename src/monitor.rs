//! Inventory watch loop.
//!
//! Periodically scans all inventory records, auto-raises a high-urgency
//! supply request for every critical shortage that is not already backed by
//! an open request, and pages the nearest donors right away instead of
//! waiting for the next router sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::dispatch::dispatch;
use crate::domain::{InventoryRecord, NewRequest, Urgency};
use crate::error::Result;
use crate::notify::Notifier;
use crate::ranker::rank_donors;
use crate::routing::RouteLookup;
use crate::storage::Storage;

/// Background task that watches stock levels and raises demand.
pub struct InventoryMonitor<S, N, R> {
    storage: Arc<S>,
    notifier: Arc<N>,
    routes: Arc<R>,
    config: EngineConfig,
}

impl<S, N, R> InventoryMonitor<S, N, R>
where
    S: Storage + 'static,
    N: Notifier + 'static,
    R: RouteLookup + 'static,
{
    pub fn new(storage: Arc<S>, notifier: Arc<N>, routes: Arc<R>, config: EngineConfig) -> Self {
        Self {
            storage,
            notifier,
            routes,
            config,
        }
    }

    /// One full scan over all inventory records.
    ///
    /// Public so tests can drive the loop without a timer. Per-record
    /// failures are logged and do not abort the rest of the scan.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<()> {
        let inventory = self.storage.list_inventory().await?;

        for record in inventory.iter().filter(|record| record.is_critical()) {
            if let Err(e) = self.process_shortage(record).await {
                tracing::error!(
                    inventory_id = %record.id,
                    hospital_id = %record.hospital_id,
                    error = %e,
                    "Failed to process shortage"
                );
            }
        }

        Ok(())
    }

    async fn process_shortage(&self, record: &InventoryRecord) -> Result<()> {
        tracing::warn!(
            hospital_id = %record.hospital_id,
            resource_type = %record.resource_type,
            units_available = record.units_available,
            critical_threshold = record.critical_threshold,
            "Critical inventory level"
        );

        // At most one unfulfilled request per (hospital, resource type)
        if self
            .storage
            .find_unfulfilled_request(record.hospital_id, &record.resource_type)
            .await?
            .is_some()
        {
            tracing::debug!(
                hospital_id = %record.hospital_id,
                resource_type = %record.resource_type,
                "Open request already covers this shortage"
            );
            return Ok(());
        }

        let units_needed = record.critical_threshold * self.config.threshold_multiplier;
        let request = self
            .storage
            .create_request(NewRequest {
                hospital_id: record.hospital_id,
                resource_type: record.resource_type.clone(),
                units_needed,
                urgency: Urgency::High,
            })
            .await?;
        tracing::info!(
            request_id = %request.id,
            units_needed,
            "Auto-created supply request"
        );

        let Some(hospital) = self.storage.get_hospital(record.hospital_id).await? else {
            tracing::warn!(
                request_id = %request.id,
                hospital_id = %record.hospital_id,
                "Hospital missing, request left unpaged"
            );
            return Ok(());
        };

        let Some(origin) = hospital.coordinates else {
            // The request exists, so the next scan's duplicate check skips
            // this shortage; only the router sweep will ever retry it.
            tracing::warn!(
                request_id = %request.id,
                hospital_id = %hospital.id,
                "Hospital has no coordinates, request left unpaged"
            );
            return Ok(());
        };

        let donors = self
            .storage
            .list_eligible_donors(&record.resource_type)
            .await?;
        let ranked = rank_donors(
            donors,
            &record.resource_type,
            origin,
            self.config.max_distance_km,
            self.routes.as_ref(),
            self.config.route_timeout_ms,
        )
        .await;

        dispatch(
            self.storage.as_ref(),
            self.notifier.as_ref(),
            &hospital,
            &request,
            &ranked,
            self.config.notify_timeout_ms,
        )
        .await?;

        Ok(())
    }

    /// Run the watch loop until the token is cancelled.
    ///
    /// Cancellation is observed between ticks; a scan that is underway when
    /// shutdown is requested completes before the loop exits.
    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            interval_ms = self.config.watch_interval_ms,
            "Inventory watch loop started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "Inventory scan failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.config.watch_interval_ms)) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!("Inventory watch loop stopped");
        Ok(())
    }
}
