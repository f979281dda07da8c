//! HTTP surface of the campus assistant.
//!
//! Chat turns (JSON and server-sent events), session listings, direct
//! venue busyness lookups, and a health check.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
