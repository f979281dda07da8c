//! API error type and its JSON response body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campus_chat::ChatError;
use campus_core::CampusError;
use campus_crowd::CrowdError;
use serde::Serialize;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code ("bad_request", "not_found", ...).
    pub error: String,
    pub message: String,
}

/// Errors returned by handlers, one HTTP status each.
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 404
    NotFound(String),
    /// 429
    TooManyRequests,
    /// 500
    Internal(String),
    /// 502: the generative service failed.
    Upstream(String),
    /// 503
    ServiceUnavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "too_many_requests",
                "Rate limit exceeded".to_string(),
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::MessageTooLong(_) => {
                ApiError::BadRequest(err.to_string())
            }
            ChatError::Disabled => ApiError::ServiceUnavailable(err.to_string()),
            ChatError::SessionNotFound(_) => ApiError::NotFound(err.to_string()),
            ChatError::Generative(_) | ChatError::IncompleteStream => {
                ApiError::Upstream(err.to_string())
            }
            ChatError::SessionStore(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CrowdError> for ApiError {
    fn from(err: CrowdError) -> Self {
        match err {
            CrowdError::VenueNotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<CampusError> for ApiError {
    fn from(err: CampusError) -> Self {
        match err {
            CampusError::Config(msg) => ApiError::BadRequest(msg),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
