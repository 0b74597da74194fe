//! Request router loop.
//!
//! The general-purpose sweeper: every tick it re-evaluates every open
//! request regardless of origin (auto-created by the watch loop or raised
//! manually through the API layer), re-ranking donors from scratch and
//! dispatching until the request is covered. The watch loop's own dispatch
//! is just an optimization to page immediately; this loop is what
//! eventually fulfills requests as donor state changes.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::dispatch::dispatch;
use crate::domain::SupplyRequest;
use crate::error::Result;
use crate::notify::Notifier;
use crate::ranker::rank_donors;
use crate::routing::RouteLookup;
use crate::storage::Storage;

/// Background task that sweeps unfulfilled requests.
pub struct RequestRouter<S, N, R> {
    storage: Arc<S>,
    notifier: Arc<N>,
    routes: Arc<R>,
    config: EngineConfig,
}

impl<S, N, R> RequestRouter<S, N, R>
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

    /// One sweep over all unfulfilled requests.
    ///
    /// Public so tests can drive the loop without a timer. Per-request
    /// failures are logged and do not abort the rest of the sweep.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self) -> Result<()> {
        let pending = self.storage.list_unfulfilled_requests().await?;
        tracing::debug!(pending = pending.len(), "Sweeping unfulfilled requests");

        for request in &pending {
            if let Err(e) = self.process_request(request).await {
                tracing::error!(
                    request_id = %request.id,
                    error = %e,
                    "Failed to process request"
                );
            }
        }

        Ok(())
    }

    async fn process_request(&self, request: &SupplyRequest) -> Result<()> {
        let Some(hospital) = self.storage.get_hospital(request.hospital_id).await? else {
            tracing::warn!(
                request_id = %request.id,
                hospital_id = %request.hospital_id,
                "Hospital missing, cannot dispatch this request now"
            );
            return Ok(());
        };

        let Some(origin) = hospital.coordinates else {
            tracing::debug!(
                request_id = %request.id,
                hospital_id = %hospital.id,
                "Hospital has no coordinates, skipping until one is recorded"
            );
            return Ok(());
        };

        // Fresh distances and fresh availability every sweep
        let donors = self
            .storage
            .list_eligible_donors(&request.resource_type)
            .await?;
        let ranked = rank_donors(
            donors,
            &request.resource_type,
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
            request,
            &ranked,
            self.config.notify_timeout_ms,
        )
        .await?;

        Ok(())
    }

    /// Run the sweep loop until the token is cancelled.
    ///
    /// Cancellation is observed between ticks; a sweep that is underway
    /// when shutdown is requested completes before the loop exits.
    #[tracing::instrument(skip_all)]
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            interval_ms = self.config.router_interval_ms,
            "Request router loop started"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "Request sweep failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.config.router_interval_ms)) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        tracing::info!("Request router loop stopped");
        Ok(())
    }
}
