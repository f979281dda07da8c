//! Query orchestration for the campus assistant.
//!
//! A turn flows classifier → dispatcher → context → per-session generative
//! conversation → response stream. Data-source failures stay inside the
//! context; only a generative failure reaches the caller.

pub mod adapters;
pub mod assistant;
pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod generative;
pub mod pool;
pub mod session;
pub mod streamer;
pub mod structured;
pub mod task;

pub use adapters::{
    Classifier, Conversation, CrowdLevelProvider, GenerativeAdapter, SourcePayload,
    StructuredDataAdapter, TextStream, Turn,
};
pub use assistant::Assistant;
pub use classifier::KeywordClassifier;
pub use context::{Context, SlotResult};
pub use dispatcher::{Dispatcher, Plan};
pub use error::{ChatError, ClassifierError, GenerativeError, SourceError, StructuredDataError};
pub use generative::{build_generator, GeminiGenerator, OfflineGenerator};
pub use pool::WorkerPool;
pub use session::{Session, SessionGuard, SessionStore, SessionSummary};
pub use streamer::{collect_response, EventKind, StreamEvent, TurnStream};
pub use structured::UnconfiguredDataSource;
pub use task::{SourceTask, Sources};
