//! Route handler functions for all API endpoints.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use campus_chat::{SessionSummary, StreamEvent, Turn};
use campus_crowd::{PeakProfile, Target, VenueEstimate};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    /// Ask for a short answer suitable for speech.
    #[serde(default)]
    pub voice: bool,
}

#[derive(Debug, Deserialize)]
pub struct BusynessParams {
    pub q: Option<String>,
    /// "HH:MM" today, or "YYYY-MM-DDTHH:MM". Absent means now.
    pub at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PeakParams {
    pub q: Option<String>,
    /// "YYYY-MM-DD"; defaults to today.
    pub day: Option<String>,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub active_sessions: usize,
    pub generator: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub turns: Vec<Turn>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BusynessResponse {
    pub query: String,
    pub result: VenueEstimate,
    /// Level bucket label ("light", "medium", "high", "very high", "unknown").
    pub level: String,
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeakResponse {
    pub query: String,
    pub result: PeakProfile,
    pub summary: String,
}

// =============================================================================
// Health
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state.assistant.sessions();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: sessions.len(),
        generator: sessions.generator_name().to_string(),
    })
}

// =============================================================================
// Chat
// =============================================================================

/// POST /api/chat - full answer in one response.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (response, session_id) = state
        .assistant
        .respond(&request.message, request.session_id, request.voice)
        .await?;
    Ok(Json(ChatResponse {
        response,
        session_id,
    }))
}

/// POST /api/chat/stream - answer as server-sent events.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let turn = state
        .assistant
        .handle_turn(&request.message, request.session_id, request.voice)
        .await?;
    debug!(session_id = %turn.session_id(), "Streaming turn");

    let events = turn.map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn to_sse(event: &StreamEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.name()).data(data)
}

/// GET /api/sessions
pub async fn sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.assistant.sessions().list())
}

/// GET /api/sessions/{id}/history
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let turns = state.assistant.sessions().history(id).await?;
    Ok(Json(HistoryResponse {
        session_id: id,
        turns,
    }))
}

// =============================================================================
// Busyness
// =============================================================================

/// GET /busyness?q=&at=
pub async fn busyness(
    State(state): State<AppState>,
    Query(params): Query<BusynessParams>,
) -> Result<Json<BusynessResponse>, ApiError> {
    let query = required_query(params.q)?;
    let target = match params.at.as_deref() {
        None | Some("") | Some("now") => Target::Now,
        Some(raw) => Target::At(parse_at(raw, state.crowd.now())?),
    };

    let estimate = state.crowd.resolve(&query, target)?;
    Ok(Json(BusynessResponse {
        query,
        level: estimate.level().label().to_string(),
        summary: estimate.summary(),
        result: estimate,
    }))
}

/// GET /busyness/peak?q=&day=
pub async fn busyness_peak(
    State(state): State<AppState>,
    Query(params): Query<PeakParams>,
) -> Result<Json<PeakResponse>, ApiError> {
    let query = required_query(params.q)?;
    let day = match params.day.as_deref() {
        None | Some("") => state.crowd.now().date(),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("invalid day '{raw}', expected YYYY-MM-DD")))?,
    };

    let profile = state.crowd.peak_profile(&query, day)?;
    Ok(Json(PeakResponse {
        query,
        summary: profile.summary(),
        result: profile,
    }))
}

fn required_query(q: Option<String>) -> Result<String, ApiError> {
    q.map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter 'q' is required".to_string()))
}

/// Parse "HH:MM" (on `now`'s date) or a full local timestamp.
fn parse_at(raw: &str, now: NaiveDateTime) -> Result<NaiveDateTime, ApiError> {
    if let Ok(time) = NaiveTime::parse_from_str(raw, "%H:%M") {
        return Ok(now.date().and_time(time));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "invalid time '{raw}', expected HH:MM or YYYY-MM-DDTHH:MM"
            ))
        })
}
