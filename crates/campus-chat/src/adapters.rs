//! Collaborator interfaces the orchestration core depends on.
//!
//! Each backend sits behind a trait so the dispatcher and assistant can be
//! driven by real services in production and by fixed-latency fakes in
//! tests.

use std::pin::Pin;

use async_trait::async_trait;
use campus_core::{Category, Intent};
use campus_crowd::{CrowdError, CrowdEstimator, PeakProfile, Target, VenueEstimate};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::error::{ClassifierError, GenerativeError, StructuredDataError};

// =============================================================================
// Shared types
// =============================================================================

/// Successful result of one data-source call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SourcePayload {
    Crowd(VenueEstimate),
    Peak(PeakProfile),
    Records(Vec<serde_json::Value>),
}

/// One completed exchange in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// What the user typed or said.
    pub user: String,
    /// The rendered prompt actually sent to the generative service.
    pub prompt: String,
    pub assistant: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(user: impl Into<String>, prompt: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            prompt: prompt.into(),
            assistant: assistant.into(),
            at: Utc::now(),
        }
    }
}

/// Incremental answer text from the generative service.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenerativeError>> + Send>>;

// =============================================================================
// Traits
// =============================================================================

/// Labels a user turn with the data categories it needs.
pub trait Classifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Intent, ClassifierError>;
}

/// Structured record lookups (menus, hours, events).
#[async_trait]
pub trait StructuredDataAdapter: Send + Sync {
    async fn query(
        &self,
        intent: &Intent,
        category: Category,
        text: &str,
    ) -> Result<Vec<serde_json::Value>, StructuredDataError>;
}

/// Venue crowd levels.
#[async_trait]
pub trait CrowdLevelProvider: Send + Sync {
    /// Estimate for the venue named in `venue_text`, now or at `at`.
    async fn estimate(
        &self,
        venue_text: &str,
        at: Option<NaiveDateTime>,
    ) -> Result<VenueEstimate, CrowdError>;

    /// Typical busy hours of the venue on `day`.
    async fn peak_profile(&self, venue_text: &str, day: NaiveDate)
        -> Result<PeakProfile, CrowdError>;
}

/// Factory for per-session generative conversations.
pub trait GenerativeAdapter: Send + Sync {
    fn name(&self) -> &str;

    fn open_conversation(&self) -> Box<dyn Conversation>;
}

/// A stateful conversation holding every prior turn of one session.
#[async_trait]
pub trait Conversation: Send {
    /// Start generating the answer for `context`, with full history.
    async fn stream(&mut self, context: &Context) -> Result<TextStream, GenerativeError>;

    /// Remember a completed exchange.
    fn record(&mut self, turn: Turn);

    fn turns(&self) -> &[Turn];
}

// =============================================================================
// Crowd estimator binding
// =============================================================================

#[async_trait]
impl CrowdLevelProvider for CrowdEstimator {
    async fn estimate(
        &self,
        venue_text: &str,
        at: Option<NaiveDateTime>,
    ) -> Result<VenueEstimate, CrowdError> {
        self.resolve(venue_text, Target::from(at))
    }

    async fn peak_profile(
        &self,
        venue_text: &str,
        day: NaiveDate,
    ) -> Result<PeakProfile, CrowdError> {
        CrowdEstimator::peak_profile(self, venue_text, day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use campus_core::FixedClock;
    use campus_crowd::{EstimatorSettings, VenueCatalog};

    fn estimator() -> CrowdEstimator {
        let json = r#"{"venues": [{"id": "busch-sc", "name": "Busch Student Center", "live": 52}]}"#;
        let catalog = VenueCatalog::from_json(json).unwrap();
        let clock = FixedClock::at(2025, 3, 4, 12, 0).unwrap();
        CrowdEstimator::new(Arc::new(catalog), Arc::new(clock), EstimatorSettings::default())
    }

    #[tokio::test]
    async fn test_estimator_as_provider() {
        let provider: Arc<dyn CrowdLevelProvider> = Arc::new(estimator());
        let estimate = provider.estimate("how busy is busch", None).await.unwrap();
        assert_eq!(estimate.venue_id, "busch-sc");

        let err = provider.estimate("atlantis", None).await.unwrap_err();
        assert!(matches!(err, CrowdError::VenueNotFound(_)));
    }

    #[tokio::test]
    async fn test_peak_profile_through_provider() {
        let provider: Arc<dyn CrowdLevelProvider> = Arc::new(estimator());
        let day = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let profile = provider.peak_profile("busch", day).await.unwrap();
        assert_eq!(profile.name, "Busch Student Center");
        assert!(profile.top.is_empty());
    }

    #[test]
    fn test_payload_serialization_tag() {
        let payload = SourcePayload::Records(vec![serde_json::json!({"hall": "Busch"})]);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "records");
        assert_eq!(json["data"][0]["hall"], "Busch");
    }
}
