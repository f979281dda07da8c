//! Router setup with all API routes and middleware.

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use campus_core::CampusError;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::state::AppState;

/// Requests per second admitted on the chat and busyness routes.
const REQUESTS_PER_SECOND: u32 = 100;

/// Request bodies above this size are rejected.
const BODY_LIMIT: usize = 64 * 1024;

/// Build the router with every route and middleware layer.
pub fn create_router(state: AppState) -> Router {
    let port = state.config.general.port;
    let dev_port = port.saturating_add(1);
    let origins: Vec<HeaderValue> = [port, dev_port]
        .iter()
        .flat_map(|p| [format!("http://127.0.0.1:{p}"), format!("http://localhost:{p}")])
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let public_routes = Router::new().route("/health", get(handlers::health));

    let limited_routes = Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route("/api/sessions", get(handlers::sessions))
        .route("/api/sessions/{id}/history", get(handlers::history))
        .route("/busyness", get(handlers::busyness))
        .route("/busyness/peak", get(handlers::busyness_peak))
        .layer(axum::middleware::from_fn(rate_limit_middleware))
        .layer(axum::Extension(RateLimiter::new(REQUESTS_PER_SECOND)));

    public_routes
        .merge(limited_routes)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve on the configured bind address and port until the process stops.
pub async fn start_server(state: AppState) -> Result<(), CampusError> {
    let addr = format!(
        "{}:{}",
        state.config.general.bind_address, state.config.general.port
    );
    let router = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CampusError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| CampusError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
