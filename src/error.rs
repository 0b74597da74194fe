//! Error types for the dispatch engine.

use thiserror::Error;

use crate::domain::{HospitalId, RequestId};

/// Result type alias using the hemodispatch error type.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Main error type for the dispatch engine.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Supply request not found
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// Hospital referenced by a request or inventory record does not exist
    #[error("Hospital not found: {0}")]
    HospitalNotFound(HospitalId),

    /// Validation error (e.g., malformed coordinates, empty contact)
    #[error("Validation error: {0}")]
    Validation(String),

    /// HTTP client error from the notifier or route lookup
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
