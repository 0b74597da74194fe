//! Inventory watch and donor dispatch engine for emergency blood/organ
//! resupply.
//!
//! Two cooperating background loops share one matching pipeline: the
//! inventory watch loop scans hospital stock and auto-raises a supply
//! request for every critical shortage, while the request router loop
//! sweeps all open requests and re-dispatches them until covered. Both
//! rank eligible donors by great-circle distance from the hospital and
//! page them nearest-first until the demand is saturated.
//!
//! Storage, message transport, and route lookup are consumed through
//! narrow traits; an in-memory storage and mock collaborators ship with
//! the crate so the whole pipeline can be exercised without external
//! services.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod error;
pub mod geo;
pub mod monitor;
pub mod notify;
pub mod ranker;
pub mod router;
pub mod routing;
pub mod storage;

// Re-export commonly used types
pub use config::EngineConfig;
pub use dispatch::dispatch;
pub use domain::{
    Donor, DonorId, Hospital, HospitalId, InventoryId, InventoryRecord, NewRequest, NotifyMark,
    RequestId, ResourceType, SupplyRequest, Urgency,
};
pub use engine::{Engine, EngineHandle, SosOutcome};
pub use error::{DispatchError, Result};
pub use geo::{distance, Coordinates};
pub use monitor::InventoryMonitor;
pub use notify::{format_emergency_message, MockNotifier, Notifier, TwilioNotifier};
pub use ranker::{rank_donors, RankedDonor};
pub use router::RequestRouter;
pub use routing::{MockRouteLookup, OsrmRouteLookup, RouteInfo, RouteLookup};
pub use storage::{MemoryStorage, Storage};
