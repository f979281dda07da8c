//! Structured-record adapters.

use async_trait::async_trait;
use campus_core::{Category, Intent};
use tracing::debug;

use crate::adapters::StructuredDataAdapter;
use crate::error::StructuredDataError;

/// Stand-in used until a records database is wired up. Every query reports
/// [`StructuredDataError::NotConfigured`].
#[derive(Debug, Default, Clone)]
pub struct UnconfiguredDataSource;

#[async_trait]
impl StructuredDataAdapter for UnconfiguredDataSource {
    async fn query(
        &self,
        _intent: &Intent,
        category: Category,
        _text: &str,
    ) -> Result<Vec<serde_json::Value>, StructuredDataError> {
        debug!(category = %category, "Structured data source not configured");
        Err(StructuredDataError::NotConfigured)
    }
}
