//! Hospital profile, read-only from the engine's perspective.

use serde::Serialize;
use uuid::Uuid;

use crate::geo::Coordinates;

/// Unique identifier for a hospital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HospitalId(pub Uuid);

impl std::fmt::Display for HospitalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display only first 8 characters for readability in logs
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

impl From<Uuid> for HospitalId {
    fn from(uuid: Uuid) -> Self {
        HospitalId(uuid)
    }
}

/// A hospital that holds inventory and raises supply requests.
///
/// A hospital without coordinates can still accumulate requests, but those
/// requests cannot be dispatched until a location is recorded.
#[derive(Debug, Clone, Serialize)]
pub struct Hospital {
    pub id: HospitalId,
    pub name: String,
    pub coordinates: Option<Coordinates>,
    pub verified: bool,
}
