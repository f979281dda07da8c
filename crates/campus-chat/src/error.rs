//! Error types for the query orchestration core.

use std::time::Duration;

use campus_core::{CampusError, Category};
use campus_crowd::CrowdError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced to callers of the assistant.
///
/// Per-source failures never appear here; they are recorded in context
/// slots as [`SourceError`].
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat is disabled")]
    Disabled,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),
    #[error("session store error: {0}")]
    SessionStore(String),
    #[error("generative error: {0}")]
    Generative(#[from] GenerativeError),
    #[error("response stream ended without a terminal event")]
    IncompleteStream,
}

impl From<ChatError> for CampusError {
    fn from(err: ChatError) -> Self {
        CampusError::Api(err.to_string())
    }
}

/// Why a data-source slot has no payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("no venue matched '{query}'")]
    VenueNotFound { query: String },
    #[error("{category} source timed out after {}ms", .after.as_millis())]
    UpstreamTimeout { category: Category, after: Duration },
    #[error("{category} source unavailable: {reason}")]
    UpstreamUnavailable { category: Category, reason: String },
    #[error("{category} data source is not configured")]
    DataSourceNotConfigured { category: Category },
}

impl SourceError {
    /// Map a crowd estimator failure onto the slot taxonomy.
    pub fn from_crowd(category: Category, err: CrowdError) -> Self {
        match err {
            CrowdError::VenueNotFound(query) => SourceError::VenueNotFound { query },
            other => SourceError::UpstreamUnavailable {
                category,
                reason: other.to_string(),
            },
        }
    }

    /// Map a structured-data adapter failure onto the slot taxonomy.
    pub fn from_structured(category: Category, err: StructuredDataError) -> Self {
        match err {
            StructuredDataError::NotConfigured => SourceError::DataSourceNotConfigured { category },
            StructuredDataError::QueryError(reason) => {
                SourceError::UpstreamUnavailable { category, reason }
            }
        }
    }
}

/// Errors from a structured-record adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuredDataError {
    #[error("structured data source is not configured")]
    NotConfigured,
    #[error("query failed: {0}")]
    QueryError(String),
}

/// Errors from the generative service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerativeError {
    #[error("generative service not configured: {0}")]
    NotConfigured(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("stream failed: {0}")]
    Stream(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors from an intent classifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::Disabled.to_string(), "chat is disabled");
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::IncompleteStream.to_string(),
            "response stream ended without a terminal event"
        );

        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(
            ChatError::SessionNotFound(id).to_string(),
            "session not found: 550e8400-e29b-41d4-a716-446655440000"
        );
    }

    #[test]
    fn test_generative_error_converts() {
        let err: ChatError = GenerativeError::Request("connection refused".to_string()).into();
        assert!(matches!(err, ChatError::Generative(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_source_error_display() {
        let err = SourceError::UpstreamTimeout {
            category: Category::CrowdLevel,
            after: Duration::from_millis(3000),
        };
        assert_eq!(err.to_string(), "crowd_level source timed out after 3000ms");

        let err = SourceError::DataSourceNotConfigured {
            category: Category::DiningMenu,
        };
        assert_eq!(err.to_string(), "dining_menu data source is not configured");
    }

    #[test]
    fn test_from_crowd_maps_not_found() {
        let err = SourceError::from_crowd(
            Category::CrowdLevel,
            CrowdError::VenueNotFound("moon".to_string()),
        );
        assert_eq!(
            err,
            SourceError::VenueNotFound {
                query: "moon".to_string()
            }
        );

        let err = SourceError::from_crowd(
            Category::CrowdLevel,
            CrowdError::Catalog("broken".to_string()),
        );
        assert!(matches!(err, SourceError::UpstreamUnavailable { .. }));
    }

    #[test]
    fn test_from_structured() {
        let err = SourceError::from_structured(Category::Events, StructuredDataError::NotConfigured);
        assert_eq!(
            err,
            SourceError::DataSourceNotConfigured {
                category: Category::Events
            }
        );

        let err = SourceError::from_structured(
            Category::GymHours,
            StructuredDataError::QueryError("syntax".to_string()),
        );
        assert_eq!(
            err,
            SourceError::UpstreamUnavailable {
                category: Category::GymHours,
                reason: "syntax".to_string()
            }
        );
    }

    #[test]
    fn test_chat_error_into_campus_error() {
        let campus: CampusError = ChatError::EmptyMessage.into();
        assert!(matches!(campus, CampusError::Api(_)));
    }
}
