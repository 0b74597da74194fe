//! Per-hospital stock levels for a single resource type.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{HospitalId, ResourceType};

/// Unique identifier for an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct InventoryId(pub Uuid);

impl std::fmt::Display for InventoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for InventoryId {
    fn from(uuid: Uuid) -> Self {
        InventoryId(uuid)
    }
}

/// Current stock of one resource type at one hospital.
///
/// There is one active record per (hospital, resource type) pair. Stock
/// updates arrive through the CRUD layer; the watch loop only reads.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryRecord {
    pub id: InventoryId,
    pub hospital_id: HospitalId,
    pub resource_type: ResourceType,
    pub units_available: u32,

    /// Stock level below which the watch loop auto-raises a request.
    pub critical_threshold: u32,

    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// Whether stock has dropped below the critical threshold.
    pub fn is_critical(&self) -> bool {
        self.units_available < self.critical_threshold
    }
}
