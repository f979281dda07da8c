use campus_core::CampusError;
use thiserror::Error;

/// Errors raised by the crowd-level estimator.
#[derive(Debug, Error)]
pub enum CrowdError {
    /// The query text did not resolve to a venue, or no resolution strategy
    /// produced a signal for it.
    #[error("Venue not found: {0}")]
    VenueNotFound(String),

    /// The venue catalog is malformed.
    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for CrowdError {
    fn from(err: serde_json::Error) -> Self {
        CrowdError::Catalog(err.to_string())
    }
}

impl From<CrowdError> for CampusError {
    fn from(err: CrowdError) -> Self {
        match err {
            CrowdError::Io(e) => CampusError::Io(e),
            other => CampusError::Catalog(other.to_string()),
        }
    }
}
