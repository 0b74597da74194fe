//! Domain entities for the dispatch engine.
//!
//! The engine never owns these records: it borrows snapshots for the
//! duration of a scan pass and commits mutations back through the
//! [`Storage`](crate::storage::Storage) collaborator.

mod donor;
mod hospital;
mod inventory;
mod request;

pub use donor::{Donor, DonorId};
pub use hospital::{Hospital, HospitalId};
pub use inventory::{InventoryId, InventoryRecord};
pub use request::{NewRequest, NotifyMark, RequestId, SupplyRequest, Urgency};

use serde::{Deserialize, Serialize};

/// The kind of resource a donor can supply and a hospital can run short of.
///
/// Covers both blood groups ("O+", "AB-") and organ labels; the engine only
/// ever compares these for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(pub String);

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        ResourceType(s.to_string())
    }
}
