//! Supply requests and donor notification marks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DonorId, HospitalId, ResourceType};

/// Unique identifier for a supply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}

/// Urgency of a supply request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// An outstanding or fulfilled demand for units of one resource at one
/// hospital.
///
/// At most one unfulfilled request may exist per (hospital, resource type);
/// the watch loop checks this before creating a new one. The request
/// transitions unfulfilled -> fulfilled exactly once and never back.
#[derive(Debug, Clone, Serialize)]
pub struct SupplyRequest {
    pub id: RequestId,
    pub hospital_id: HospitalId,
    pub resource_type: ResourceType,
    pub units_needed: u32,
    pub urgency: Urgency,
    pub fulfilled: bool,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

/// Input for creating a new supply request.
#[derive(Debug, Clone, Serialize)]
pub struct NewRequest {
    pub hospital_id: HospitalId,
    pub resource_type: ResourceType,
    pub units_needed: u32,
    pub urgency: Urgency,
}

/// Append-only record that a donor was paged for a request.
///
/// Dispatch checks these marks before sending, so one pass never pages the
/// same donor twice for the same request.
#[derive(Debug, Clone, Serialize)]
pub struct NotifyMark {
    pub donor_id: DonorId,
    pub request_id: RequestId,
    pub notified_at: DateTime<Utc>,
}
