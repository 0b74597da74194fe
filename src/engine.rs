//! Engine lifecycle and the manual emergency trigger.
//!
//! The engine owns the two background loops. `start` spawns them as
//! independently cancellable tasks; `EngineHandle::shutdown` cancels and
//! joins both, so no tick is left mutating state after shutdown returns.
//! The loops communicate only through storage, never directly: the two can
//! therefore both decide to page donors for the same request in the same
//! wall-clock window. That cross-pass race is a documented property of the
//! design, not an oversight; see DESIGN.md.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::dispatch::dispatch;
use crate::domain::{HospitalId, NewRequest, RequestId, ResourceType, Urgency};
use crate::error::{DispatchError, Result};
use crate::monitor::InventoryMonitor;
use crate::notify::Notifier;
use crate::ranker::rank_donors;
use crate::router::RequestRouter;
use crate::routing::RouteLookup;
use crate::storage::Storage;

/// Result of a manual emergency trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum SosOutcome {
    /// Current stock already covers the demand; nothing was dispatched.
    SufficientStock { units_available: u32 },

    /// Donors were ranked and paged for the (found or created) request.
    Dispatched {
        request_id: RequestId,
        notified: usize,
    },

    /// A request is open but no donor could be paged right now (no
    /// hospital coordinates, or nobody eligible within range).
    NoDonorsInRange { request_id: RequestId },
}

/// Coordinates the inventory watch loop and the request router loop.
pub struct Engine<S, N, R> {
    storage: Arc<S>,
    notifier: Arc<N>,
    routes: Arc<R>,
    config: EngineConfig,
}

/// Handle to the two running loops.
pub struct EngineHandle {
    token: CancellationToken,
    monitor: JoinHandle<Result<()>>,
    router: JoinHandle<Result<()>>,
}

impl EngineHandle {
    /// Signal both loops to stop and wait for their in-flight ticks to
    /// finish. Clean join, not detach.
    pub async fn shutdown(self) -> Result<()> {
        tracing::info!("Engine shutdown requested");
        self.token.cancel();

        for (name, handle) in [("monitor", self.monitor), ("router", self.router)] {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Loop exited with error"),
                Err(e) => tracing::error!(task = name, error = %e, "Loop task panicked"),
            }
        }

        tracing::info!("Engine stopped");
        Ok(())
    }
}

impl<S, N, R> Engine<S, N, R>
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

    /// Spawn both loops on the current runtime.
    ///
    /// Each loop gets its own clone of the storage handle so concurrent
    /// passes never interleave inside one logical session.
    pub fn start(&self) -> EngineHandle {
        let token = CancellationToken::new();

        let monitor = Arc::new(InventoryMonitor::new(
            self.storage.clone(),
            self.notifier.clone(),
            self.routes.clone(),
            self.config.clone(),
        ));
        let router = Arc::new(RequestRouter::new(
            self.storage.clone(),
            self.notifier.clone(),
            self.routes.clone(),
            self.config.clone(),
        ));

        let monitor_handle = tokio::spawn(monitor.run(token.clone()));
        let router_handle = tokio::spawn(router.run(token.clone()));
        tracing::info!("Engine started");

        EngineHandle {
            token,
            monitor: monitor_handle,
            router: router_handle,
        }
    }

    /// Evaluate and dispatch for one hospital and resource right now.
    ///
    /// Backs an emergency-SOS style endpoint: checks whether stock already
    /// covers the demand, finds or creates the open request, and pages the
    /// nearest donors without waiting for either loop's next tick.
    #[tracing::instrument(skip(self), fields(hospital_id = %hospital_id, resource_type = %resource_type))]
    pub async fn trigger_sos(
        &self,
        hospital_id: HospitalId,
        resource_type: ResourceType,
        units_needed: u32,
    ) -> Result<SosOutcome> {
        let hospital = self
            .storage
            .get_hospital(hospital_id)
            .await?
            .ok_or(DispatchError::HospitalNotFound(hospital_id))?;

        let units_available = self
            .storage
            .list_inventory()
            .await?
            .into_iter()
            .find(|inv| inv.hospital_id == hospital_id && inv.resource_type == resource_type)
            .map(|inv| inv.units_available)
            .unwrap_or(0);

        if units_available >= units_needed {
            tracing::info!(units_available, "Sufficient inventory, no SOS required");
            return Ok(SosOutcome::SufficientStock { units_available });
        }

        // Reuse the open request if one exists; never create a duplicate
        let request = match self
            .storage
            .find_unfulfilled_request(hospital_id, &resource_type)
            .await?
        {
            Some(request) => request,
            None => {
                self.storage
                    .create_request(NewRequest {
                        hospital_id,
                        resource_type: resource_type.clone(),
                        units_needed,
                        urgency: Urgency::High,
                    })
                    .await?
            }
        };

        let Some(origin) = hospital.coordinates else {
            tracing::warn!(request_id = %request.id, "Hospital has no coordinates");
            return Ok(SosOutcome::NoDonorsInRange {
                request_id: request.id,
            });
        };

        let donors = self.storage.list_eligible_donors(&resource_type).await?;
        let ranked = rank_donors(
            donors,
            &resource_type,
            origin,
            self.config.max_distance_km,
            self.routes.as_ref(),
            self.config.route_timeout_ms,
        )
        .await;

        if ranked.is_empty() {
            tracing::warn!(request_id = %request.id, "No eligible donors within range");
            return Ok(SosOutcome::NoDonorsInRange {
                request_id: request.id,
            });
        }

        let notified = dispatch(
            self.storage.as_ref(),
            self.notifier.as_ref(),
            &hospital,
            &request,
            &ranked,
            self.config.notify_timeout_ms,
        )
        .await?;

        tracing::info!(request_id = %request.id, notified, "Emergency SOS dispatched");
        Ok(SosOutcome::Dispatched {
            request_id: request.id,
            notified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinates;
    use crate::notify::MockNotifier;
    use crate::routing::MockRouteLookup;
    use crate::storage::MemoryStorage;

    fn engine(
        storage: Arc<MemoryStorage>,
        notifier: Arc<MockNotifier>,
    ) -> Engine<MemoryStorage, MockNotifier, MockRouteLookup> {
        Engine::new(
            storage,
            notifier,
            Arc::new(MockRouteLookup::new()),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_sos_with_sufficient_stock_dispatches_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(MockNotifier::new());
        let o_pos = ResourceType::from("O+");

        let hospital = storage.add_hospital("City General", Some(Coordinates::new(28.61, 77.21)));
        storage.set_inventory(hospital, o_pos.clone(), 12, 5);

        let outcome = engine(storage.clone(), notifier.clone())
            .trigger_sos(hospital, o_pos, 10)
            .await
            .unwrap();

        assert_eq!(outcome, SosOutcome::SufficientStock { units_available: 12 });
        assert_eq!(notifier.send_count(), 0);
        assert!(storage.list_unfulfilled_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sos_creates_request_and_pages_donors() {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(MockNotifier::new());
        let o_pos = ResourceType::from("O+");

        let hospital = storage.add_hospital("City General", Some(Coordinates::new(28.61, 77.21)));
        storage.set_inventory(hospital, o_pos.clone(), 1, 5);
        for i in 0..2 {
            storage.add_donor(
                &format!("d{i}"),
                &format!("+1555010{i}"),
                o_pos.clone(),
                Some(Coordinates::new(28.62, 77.22)),
                true,
                true,
            );
        }

        let outcome = engine(storage.clone(), notifier.clone())
            .trigger_sos(hospital, o_pos.clone(), 2)
            .await
            .unwrap();

        match outcome {
            SosOutcome::Dispatched { request_id, notified } => {
                assert_eq!(notified, 2);
                assert!(storage.get_request(request_id).await.unwrap().fulfilled);
            }
            other => panic!("expected Dispatched, got {other:?}"),
        }
        assert_eq!(notifier.send_count(), 2);
    }

    #[tokio::test]
    async fn test_sos_reuses_existing_open_request() {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(MockNotifier::new());
        let o_pos = ResourceType::from("O+");

        let hospital = storage.add_hospital("City General", Some(Coordinates::new(28.61, 77.21)));
        let existing = storage
            .create_request(NewRequest {
                hospital_id: hospital,
                resource_type: o_pos.clone(),
                units_needed: 4,
                urgency: Urgency::High,
            })
            .await
            .unwrap();
        storage.add_donor(
            "d0",
            "+15550100",
            o_pos.clone(),
            Some(Coordinates::new(28.62, 77.22)),
            true,
            true,
        );

        let outcome = engine(storage.clone(), notifier.clone())
            .trigger_sos(hospital, o_pos, 4)
            .await
            .unwrap();

        match outcome {
            SosOutcome::Dispatched { request_id, .. } => assert_eq!(request_id, existing.id),
            other => panic!("expected Dispatched, got {other:?}"),
        }
        assert_eq!(storage.list_unfulfilled_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sos_reports_no_donors_in_range() {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(MockNotifier::new());
        let o_pos = ResourceType::from("O+");

        let hospital = storage.add_hospital("City General", Some(Coordinates::new(28.61, 77.21)));
        // Only donor is in another city
        storage.add_donor(
            "far",
            "+15550100",
            o_pos.clone(),
            Some(Coordinates::new(19.07, 72.87)),
            true,
            true,
        );

        let outcome = engine(storage.clone(), notifier.clone())
            .trigger_sos(hospital, o_pos, 3)
            .await
            .unwrap();

        assert!(matches!(outcome, SosOutcome::NoDonorsInRange { .. }));
        assert_eq!(notifier.send_count(), 0);
    }

    #[tokio::test]
    async fn test_sos_unknown_hospital_is_an_error() {
        let storage = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(MockNotifier::new());

        let result = engine(storage, notifier)
            .trigger_sos(
                HospitalId::from(uuid::Uuid::new_v4()),
                ResourceType::from("O+"),
                1,
            )
            .await;

        assert!(matches!(result, Err(DispatchError::HospitalNotFound(_))));
    }
}
