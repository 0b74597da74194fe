//! Donor profile as seen by the dispatch engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{RequestId, ResourceType};
use crate::geo::Coordinates;

/// Unique identifier for a donor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DonorId(pub Uuid);

impl std::fmt::Display for DonorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for DonorId {
    fn from(uuid: Uuid) -> Self {
        DonorId(uuid)
    }
}

/// A registered donor.
///
/// The engine mutates only the `last_notified_*` fields (through
/// `Storage::record_notification`); everything else is maintained by the
/// user-facing CRUD layer.
#[derive(Debug, Clone, Serialize)]
pub struct Donor {
    pub id: DonorId,
    pub name: String,

    /// Contact the notifier delivers to (phone number in production).
    pub contact: String,

    /// Blood group or organ the donor can supply.
    pub resource_type: ResourceType,

    /// Last known location; donors without one are unreachable for ranking.
    pub coordinates: Option<Coordinates>,

    /// Donor has marked themselves available to donate.
    pub available: bool,

    /// Donor consented to being paged for emergencies.
    pub emergency_consent: bool,

    /// Most recent request this donor was paged for, if any.
    pub last_notified_request: Option<RequestId>,
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl Donor {
    /// Whether this donor may be paged for the given resource at all.
    pub fn is_eligible(&self, resource_type: &ResourceType) -> bool {
        self.resource_type == *resource_type && self.available && self.emergency_consent
    }
}
