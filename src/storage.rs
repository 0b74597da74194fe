//! Storage collaborator for the dispatch engine.
//!
//! This module defines the narrow `Storage` trait the engine consumes.
//! Persistence proper (SQL schema, CRUD handlers) lives outside the engine;
//! every call here is assumed atomic at the single-record level and no
//! multi-record transaction is assumed or required.
//!
//! `MemoryStorage` is an in-process implementation used by tests and by
//! embedders that keep state elsewhere.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::domain::{
    Donor, DonorId, Hospital, HospitalId, InventoryId, InventoryRecord, NewRequest, NotifyMark,
    RequestId, ResourceType, SupplyRequest,
};
use crate::error::{DispatchError, Result};
use crate::geo::Coordinates;

/// Storage operations the engine needs.
///
/// Both loops hold their own clone of the storage handle; implementations
/// must tolerate concurrent calls from independent tasks.
#[async_trait]
pub trait Storage: Send + Sync {
    /// All inventory records, every hospital and resource type.
    async fn list_inventory(&self) -> Result<Vec<InventoryRecord>>;

    /// All requests that have not yet been fulfilled.
    async fn list_unfulfilled_requests(&self) -> Result<Vec<SupplyRequest>>;

    /// The unfulfilled request for a (hospital, resource type) pair, if one
    /// exists. At most one can exist at a time.
    async fn find_unfulfilled_request(
        &self,
        hospital_id: HospitalId,
        resource_type: &ResourceType,
    ) -> Result<Option<SupplyRequest>>;

    /// Create a new supply request in the unfulfilled state.
    async fn create_request(&self, input: NewRequest) -> Result<SupplyRequest>;

    /// Get a request by ID.
    async fn get_request(&self, request_id: RequestId) -> Result<SupplyRequest>;

    /// Mark a request fulfilled.
    ///
    /// Idempotent: marking an already-fulfilled request is a no-op and
    /// leaves the original `fulfilled_at` timestamp unchanged.
    async fn mark_fulfilled(&self, request_id: RequestId) -> Result<SupplyRequest>;

    /// Donors matching the resource type that are available and have given
    /// emergency consent.
    async fn list_eligible_donors(&self, resource_type: &ResourceType) -> Result<Vec<Donor>>;

    /// Record that a donor was paged for a request.
    ///
    /// Appends a notify-mark and stamps the donor's `last_notified_request`
    /// and `last_notified_at`.
    async fn record_notification(&self, donor_id: DonorId, request_id: RequestId) -> Result<()>;

    /// Whether a notify-mark already exists for this (donor, request) pair.
    async fn has_notification(&self, donor_id: DonorId, request_id: RequestId) -> Result<bool>;

    /// Get a hospital by ID. `None` if it no longer exists.
    async fn get_hospital(&self, hospital_id: HospitalId) -> Result<Option<Hospital>>;
}

#[derive(Default)]
struct MemoryState {
    hospitals: HashMap<HospitalId, Hospital>,
    donors: HashMap<DonorId, Donor>,
    inventory: HashMap<InventoryId, InventoryRecord>,
    requests: HashMap<RequestId, SupplyRequest>,
    marks: Vec<NotifyMark>,
}

/// In-memory `Storage` implementation.
///
/// Interior locking is per call, so the two loops' read-decide-write
/// sequences interleave exactly as they would against a real single-record
/// atomic store.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hospital and return its ID.
    pub fn add_hospital(&self, name: &str, coordinates: Option<Coordinates>) -> HospitalId {
        let id = HospitalId::from(Uuid::new_v4());
        self.state.lock().hospitals.insert(
            id,
            Hospital {
                id,
                name: name.to_string(),
                coordinates,
                verified: true,
            },
        );
        id
    }

    /// Register a donor and return their ID.
    #[allow(clippy::too_many_arguments)]
    pub fn add_donor(
        &self,
        name: &str,
        contact: &str,
        resource_type: ResourceType,
        coordinates: Option<Coordinates>,
        available: bool,
        emergency_consent: bool,
    ) -> DonorId {
        let id = DonorId::from(Uuid::new_v4());
        self.state.lock().donors.insert(
            id,
            Donor {
                id,
                name: name.to_string(),
                contact: contact.to_string(),
                resource_type,
                coordinates,
                available,
                emergency_consent,
                last_notified_request: None,
                last_notified_at: None,
            },
        );
        id
    }

    /// Create or update the inventory record for (hospital, resource type).
    pub fn set_inventory(
        &self,
        hospital_id: HospitalId,
        resource_type: ResourceType,
        units_available: u32,
        critical_threshold: u32,
    ) -> InventoryId {
        let mut state = self.state.lock();
        // One active record per (hospital, resource type)
        let existing = state
            .inventory
            .values()
            .find(|inv| inv.hospital_id == hospital_id && inv.resource_type == resource_type)
            .map(|inv| inv.id);

        let id = existing.unwrap_or_else(|| InventoryId::from(Uuid::new_v4()));
        state.inventory.insert(
            id,
            InventoryRecord {
                id,
                hospital_id,
                resource_type,
                units_available,
                critical_threshold,
                updated_at: Utc::now(),
            },
        );
        id
    }

    /// Snapshot of a donor, for assertions on `last_notified_*`.
    pub fn donor(&self, donor_id: DonorId) -> Option<Donor> {
        self.state.lock().donors.get(&donor_id).cloned()
    }

    /// Snapshot of all notify-marks in insertion order.
    pub fn notify_marks(&self) -> Vec<NotifyMark> {
        self.state.lock().marks.clone()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn list_inventory(&self) -> Result<Vec<InventoryRecord>> {
        let mut records: Vec<_> = self.state.lock().inventory.values().cloned().collect();
        records.sort_by_key(|inv| inv.id);
        Ok(records)
    }

    async fn list_unfulfilled_requests(&self) -> Result<Vec<SupplyRequest>> {
        let mut requests: Vec<_> = self
            .state
            .lock()
            .requests
            .values()
            .filter(|req| !req.fulfilled)
            .cloned()
            .collect();
        requests.sort_by_key(|req| req.created_at);
        Ok(requests)
    }

    async fn find_unfulfilled_request(
        &self,
        hospital_id: HospitalId,
        resource_type: &ResourceType,
    ) -> Result<Option<SupplyRequest>> {
        Ok(self
            .state
            .lock()
            .requests
            .values()
            .find(|req| {
                !req.fulfilled
                    && req.hospital_id == hospital_id
                    && req.resource_type == *resource_type
            })
            .cloned())
    }

    async fn create_request(&self, input: NewRequest) -> Result<SupplyRequest> {
        let request = SupplyRequest {
            id: RequestId::from(Uuid::new_v4()),
            hospital_id: input.hospital_id,
            resource_type: input.resource_type,
            units_needed: input.units_needed,
            urgency: input.urgency,
            fulfilled: false,
            created_at: Utc::now(),
            fulfilled_at: None,
        };
        self.state.lock().requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, request_id: RequestId) -> Result<SupplyRequest> {
        self.state
            .lock()
            .requests
            .get(&request_id)
            .cloned()
            .ok_or(DispatchError::RequestNotFound(request_id))
    }

    async fn mark_fulfilled(&self, request_id: RequestId) -> Result<SupplyRequest> {
        let mut state = self.state.lock();
        let request = state
            .requests
            .get_mut(&request_id)
            .ok_or(DispatchError::RequestNotFound(request_id))?;
        if !request.fulfilled {
            request.fulfilled = true;
            request.fulfilled_at = Some(Utc::now());
        }
        Ok(request.clone())
    }

    async fn list_eligible_donors(&self, resource_type: &ResourceType) -> Result<Vec<Donor>> {
        let mut donors: Vec<_> = self
            .state
            .lock()
            .donors
            .values()
            .filter(|donor| donor.is_eligible(resource_type))
            .cloned()
            .collect();
        donors.sort_by_key(|donor| donor.id);
        Ok(donors)
    }

    async fn record_notification(&self, donor_id: DonorId, request_id: RequestId) -> Result<()> {
        let now = Utc::now();
        let mut state = self.state.lock();
        state.marks.push(NotifyMark {
            donor_id,
            request_id,
            notified_at: now,
        });
        if let Some(donor) = state.donors.get_mut(&donor_id) {
            donor.last_notified_request = Some(request_id);
            donor.last_notified_at = Some(now);
        }
        Ok(())
    }

    async fn has_notification(&self, donor_id: DonorId, request_id: RequestId) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .marks
            .iter()
            .any(|mark| mark.donor_id == donor_id && mark.request_id == request_id))
    }

    async fn get_hospital(&self, hospital_id: HospitalId) -> Result<Option<Hospital>> {
        Ok(self.state.lock().hospitals.get(&hospital_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Urgency;

    fn new_request(hospital_id: HospitalId) -> NewRequest {
        NewRequest {
            hospital_id,
            resource_type: ResourceType::from("O+"),
            units_needed: 4,
            urgency: Urgency::High,
        }
    }

    #[tokio::test]
    async fn test_find_unfulfilled_request_matches_pair_only() {
        let storage = MemoryStorage::new();
        let h1 = storage.add_hospital("City General", None);
        let h2 = storage.add_hospital("St. Anne", None);

        let created = storage.create_request(new_request(h1)).await.unwrap();

        let found = storage
            .find_unfulfilled_request(h1, &ResourceType::from("O+"))
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(created.id));

        // Different hospital or resource type: no match
        assert!(storage
            .find_unfulfilled_request(h2, &ResourceType::from("O+"))
            .await
            .unwrap()
            .is_none());
        assert!(storage
            .find_unfulfilled_request(h1, &ResourceType::from("A-"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mark_fulfilled_is_idempotent() {
        let storage = MemoryStorage::new();
        let hospital = storage.add_hospital("City General", None);
        let request = storage.create_request(new_request(hospital)).await.unwrap();

        let first = storage.mark_fulfilled(request.id).await.unwrap();
        assert!(first.fulfilled);
        let stamp = first.fulfilled_at.unwrap();

        let second = storage.mark_fulfilled(request.id).await.unwrap();
        assert_eq!(second.fulfilled_at, Some(stamp));

        // Fulfilled requests drop out of the pending sweep
        assert!(storage.list_unfulfilled_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_eligible_donors_filters_and_sorts() {
        let storage = MemoryStorage::new();
        let o_pos = ResourceType::from("O+");

        let a = storage.add_donor("A", "+10", o_pos.clone(), None, true, true);
        storage.add_donor("B", "+11", o_pos.clone(), None, false, true);
        storage.add_donor("C", "+12", o_pos.clone(), None, true, false);
        storage.add_donor("D", "+13", ResourceType::from("AB-"), None, true, true);

        let eligible = storage.list_eligible_donors(&o_pos).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, a);
    }

    #[tokio::test]
    async fn test_record_notification_stamps_donor_and_mark() {
        let storage = MemoryStorage::new();
        let hospital = storage.add_hospital("City General", None);
        let donor = storage.add_donor("A", "+10", ResourceType::from("O+"), None, true, true);
        let request = storage.create_request(new_request(hospital)).await.unwrap();

        assert!(!storage.has_notification(donor, request.id).await.unwrap());
        storage.record_notification(donor, request.id).await.unwrap();
        assert!(storage.has_notification(donor, request.id).await.unwrap());

        let snapshot = storage.donor(donor).unwrap();
        assert_eq!(snapshot.last_notified_request, Some(request.id));
        assert!(snapshot.last_notified_at.is_some());
        assert_eq!(storage.notify_marks().len(), 1);
    }

    #[tokio::test]
    async fn test_set_inventory_upserts_single_record_per_pair() {
        let storage = MemoryStorage::new();
        let hospital = storage.add_hospital("City General", None);
        let o_pos = ResourceType::from("O+");

        let first = storage.set_inventory(hospital, o_pos.clone(), 3, 5);
        let second = storage.set_inventory(hospital, o_pos.clone(), 9, 5);
        assert_eq!(first, second);

        let records = storage.list_inventory().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].units_available, 9);
        assert!(!records[0].is_critical());
    }
}
