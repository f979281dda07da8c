//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use campus_chat::{
    Assistant, Dispatcher, GenerativeAdapter, KeywordClassifier, SessionStore, Sources,
    StructuredDataAdapter, UnconfiguredDataSource, WorkerPool,
};
use campus_core::{CampusConfig, Clock};
use campus_crowd::CrowdEstimator;

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<CampusConfig>,
    /// Turn handler for the chat endpoints.
    pub assistant: Arc<Assistant>,
    /// Direct crowd lookups for the busyness endpoints.
    pub crowd: Arc<CrowdEstimator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: CampusConfig, assistant: Assistant, crowd: Arc<CrowdEstimator>) -> Self {
        Self {
            config: Arc::new(config),
            assistant: Arc::new(assistant),
            crowd,
            start_time: Instant::now(),
        }
    }

    /// Wire the orchestration core from its backends.
    ///
    /// One worker pool is created here and shared by every request.
    pub fn from_parts(
        config: CampusConfig,
        crowd: Arc<CrowdEstimator>,
        structured: Arc<dyn StructuredDataAdapter>,
        generator: Arc<dyn GenerativeAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pool = Arc::new(WorkerPool::new(config.dispatcher.worker_pool_size));
        let dispatcher = Dispatcher::new(
            Sources::new(crowd.clone(), structured),
            pool,
            clock,
            Duration::from_millis(config.dispatcher.source_deadline_ms),
        );
        let assistant = Assistant::new(
            Arc::new(KeywordClassifier::new()),
            dispatcher,
            Arc::new(SessionStore::new(generator)),
            config.chat.clone(),
        );
        Self::new(config, assistant, crowd)
    }

    /// [`from_parts`](Self::from_parts) with no records database.
    pub fn without_records(
        config: CampusConfig,
        crowd: Arc<CrowdEstimator>,
        generator: Arc<dyn GenerativeAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::from_parts(
            config,
            crowd,
            Arc::new(UnconfiguredDataSource),
            generator,
            clock,
        )
    }
}
