//! Units of concurrent source work and the sources that run them.

use std::sync::Arc;
use std::time::Duration;

use campus_core::{Category, Intent, SourceKind};
use campus_crowd::{CrowdQuery, CrowdQueryKind, Target};
use chrono::NaiveDateTime;
use tracing::debug;

use crate::adapters::{CrowdLevelProvider, SourcePayload, StructuredDataAdapter};
use crate::context::SlotResult;
use crate::error::SourceError;

/// One data-source call planned for a turn.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTask {
    pub category: Category,
    pub kind: SourceKind,
    pub text: String,
    /// Parsed crowd parameters; `None` for structured queries.
    pub crowd: Option<CrowdQuery>,
    pub deadline: Duration,
}

impl SourceTask {
    /// Plan the call for `category`, reading crowd parameters out of `text`.
    pub fn new(category: Category, text: &str, now: NaiveDateTime, deadline: Duration) -> Self {
        let kind = category.source_kind();
        let crowd = match kind {
            SourceKind::CrowdLevel => Some(CrowdQuery::parse(text, now)),
            SourceKind::StructuredQuery => None,
        };
        Self {
            category,
            kind,
            text: text.to_string(),
            crowd,
            deadline,
        }
    }
}

/// The backends a dispatcher can call.
#[derive(Clone)]
pub struct Sources {
    pub crowd: Arc<dyn CrowdLevelProvider>,
    pub structured: Arc<dyn StructuredDataAdapter>,
}

impl Sources {
    pub fn new(
        crowd: Arc<dyn CrowdLevelProvider>,
        structured: Arc<dyn StructuredDataAdapter>,
    ) -> Self {
        Self { crowd, structured }
    }

    /// Run one task to completion. Deadlines are enforced by the caller.
    pub async fn run(&self, task: SourceTask, intent: Intent) -> SlotResult {
        let category = task.category;
        let result = match (task.kind, task.crowd) {
            (SourceKind::CrowdLevel, Some(query)) => self.run_crowd(category, &task.text, query).await,
            (SourceKind::CrowdLevel, None) => self
                .crowd
                .estimate(&task.text, None)
                .await
                .map(SourcePayload::Crowd)
                .map_err(|e| SourceError::from_crowd(category, e)),
            (SourceKind::StructuredQuery, _) => self
                .structured
                .query(&intent, category, &task.text)
                .await
                .map(SourcePayload::Records)
                .map_err(|e| SourceError::from_structured(category, e)),
        };
        debug!(category = %category, ok = result.is_ok(), "Source task finished");
        result
    }

    async fn run_crowd(&self, category: Category, text: &str, query: CrowdQuery) -> SlotResult {
        let outcome = match query.kind {
            CrowdQueryKind::PeakTime => self
                .crowd
                .peak_profile(text, query.day)
                .await
                .map(SourcePayload::Peak),
            CrowdQueryKind::Current => self.crowd.estimate(text, None).await.map(SourcePayload::Crowd),
            CrowdQueryKind::SpecificTime => {
                let at = match query.target {
                    Target::Now => None,
                    Target::At(at) => Some(at),
                };
                self.crowd.estimate(text, at).await.map(SourcePayload::Crowd)
            }
        };
        outcome.map_err(|e| SourceError::from_crowd(category, e))
    }
}

impl std::fmt::Debug for Sources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sources").finish_non_exhaustive()
    }
}
