//! Integration tests for the campus API.
//!
//! Every test builds its own router over a small in-memory venue catalog,
//! the offline generator, and a clock fixed at Tuesday 2025-03-04 14:10.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use campus_api::create_router;
use campus_api::handlers::{ChatResponse, HealthResponse, HistoryResponse};
use campus_api::state::AppState;
use campus_chat::OfflineGenerator;
use campus_core::{CampusConfig, Clock, FixedClock};
use campus_crowd::{CrowdEstimator, EstimatorSettings, VenueCatalog};

// =============================================================================
// Helpers
// =============================================================================

const CATALOG: &str = r#"{
    "venues": [
        {
            "id": "busch-sc",
            "name": "Busch Student Center",
            "aliases": ["bsc"],
            "kinds": ["student_center"],
            "location": {"lat": 40.5234, "lng": -74.4584},
            "live": 45
        },
        {
            "id": "busch-dining",
            "name": "Busch Dining Hall",
            "aliases": ["busch dining"],
            "kinds": ["dining"],
            "parent": "busch-sc",
            "visit_share": 0.6,
            "weekly": {
                "tuesday": [null,null,null,null,null,null,null,10,20,30,40,50,78,74,50,40,30,30,55,40,30,20,10,null]
            }
        }
    ]
}"#;

fn make_state() -> AppState {
    let clock: Arc<dyn Clock> = Arc::new(FixedClock::at(2025, 3, 4, 14, 10).unwrap());
    let catalog = VenueCatalog::from_json(CATALOG).unwrap();
    let crowd = Arc::new(CrowdEstimator::new(
        Arc::new(catalog),
        clock.clone(),
        EstimatorSettings::default(),
    ));
    AppState::without_records(
        CampusConfig::default(),
        crowd,
        Arc::new(OfflineGenerator::new()),
        clock,
    )
}

fn make_app() -> axum::Router {
    create_router(make_state())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health() {
    let resp = make_app().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.active_sessions, 0);
    assert_eq!(health.generator, "offline");
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_chat_crowd_question() {
    let resp = make_app()
        .oneshot(post_json(
            "/api/chat",
            r#"{"message": "How busy is Busch Student Center right now?"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let chat: ChatResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(chat.response.contains("45% busy"), "got: {}", chat.response);
}

#[tokio::test]
async fn test_chat_general_question() {
    let resp = make_app()
        .oneshot(post_json("/api/chat", r#"{"message": "hello there"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert!(json["response"].as_str().unwrap().starts_with("I can help"));
    assert!(json["session_id"].as_str().unwrap().parse::<Uuid>().is_ok());
}

#[tokio::test]
async fn test_chat_empty_message_is_400() {
    let resp = make_app()
        .oneshot(post_json("/api/chat", r#"{"message": "   "}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"], "bad_request");
}

#[tokio::test]
async fn test_chat_missing_message_is_rejected() {
    let resp = make_app()
        .oneshot(post_json("/api/chat", r#"{"voice": true}"#))
        .await
        .unwrap();
    assert!(resp.status().is_client_error());
}

#[tokio::test]
async fn test_chat_reuses_session_and_records_history() {
    let app = make_app();

    let resp = app
        .clone()
        .oneshot(post_json("/api/chat", r#"{"message": "when is busch dining busiest"}"#))
        .await
        .unwrap();
    let first: ChatResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert!(first.response.contains("typically busiest"), "got: {}", first.response);

    let body = format!(
        r#"{{"message": "and how busy is bsc right now", "session_id": "{}"}}"#,
        first.session_id
    );
    let resp = app.clone().oneshot(post_json("/api/chat", &body)).await.unwrap();
    let second: ChatResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(second.session_id, first.session_id);

    let uri = format!("/api/sessions/{}/history", first.session_id);
    let resp = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let history: HistoryResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(history.turns.len(), 2);
    assert_eq!(history.turns[0].user, "when is busch dining busiest");
    assert_eq!(history.turns[1].assistant, second.response);

    let resp = app.oneshot(get("/api/sessions")).await.unwrap();
    let sessions = body_json(resp).await;
    assert_eq!(sessions.as_array().unwrap().len(), 1);
    assert_eq!(sessions[0]["turn_count"], 2);
}

#[tokio::test]
async fn test_chat_voice_limits_sentences() {
    let resp = make_app()
        .oneshot(post_json("/api/chat", r#"{"message": "hi", "voice": true}"#))
        .await
        .unwrap();
    let chat: ChatResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    // Default spoken limit is three sentences.
    let sentences = chat.response.matches(['.', '?', '!']).count();
    assert!(sentences <= 3, "got: {}", chat.response);
}

#[tokio::test]
async fn test_chat_stream_emits_deltas_then_done() {
    let resp = make_app()
        .oneshot(post_json(
            "/api/chat/stream",
            r#"{"message": "How busy is Busch Student Center right now?"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    let first_delta = body.find("event: delta").expect("no delta events");
    let done = body.find("event: done").expect("no done event");
    assert!(first_delta < done);
    assert!(!body.contains("event: error"));
}

#[tokio::test]
async fn test_chat_stream_empty_message_is_400() {
    let resp = make_app()
        .oneshot(post_json("/api/chat/stream", r#"{"message": ""}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_sessions_empty() {
    let resp = make_app().oneshot(get("/api/sessions")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, serde_json::json!([]));
}

#[tokio::test]
async fn test_history_unknown_session_is_404() {
    let uri = format!("/api/sessions/{}/history", Uuid::new_v4());
    let resp = make_app().oneshot(get(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "not_found");
}

#[tokio::test]
async fn test_history_bad_id_is_400() {
    let resp = make_app()
        .oneshot(get("/api/sessions/not-a-uuid/history"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Busyness
// =============================================================================

#[tokio::test]
async fn test_busyness_now() {
    let resp = make_app()
        .oneshot(get("/busyness?q=Busch%20Student%20Center"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["query"], "Busch Student Center");
    assert_eq!(json["result"]["venue_id"], "busch-sc");
    assert_eq!(json["result"]["method"], "direct");
    assert_eq!(json["result"]["current"], true);
    assert!(json["summary"].as_str().unwrap().contains("right now"));
}

#[tokio::test]
async fn test_busyness_at_clock_time() {
    let resp = make_app()
        .oneshot(get("/busyness?q=busch%20dining&at=12:00"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["result"]["venue_id"], "busch-dining");
    assert_eq!(json["result"]["current"], false);
    assert_eq!(json["result"]["target"], "2025-03-04T12:00:00");
}

#[tokio::test]
async fn test_busyness_unknown_venue_is_404() {
    let resp = make_app()
        .oneshot(get("/busyness?q=the%20moon"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"], "not_found");
}

#[tokio::test]
async fn test_busyness_requires_query() {
    let resp = make_app().oneshot(get("/busyness")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_busyness_bad_time_is_400() {
    let resp = make_app()
        .oneshot(get("/busyness?q=bsc&at=noonish"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_busyness_peak() {
    let resp = make_app()
        .oneshot(get("/busyness/peak?q=busch%20dining"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["result"]["day"], "2025-03-04");
    assert_eq!(json["result"]["top"][0]["hour"], 12);
    assert!(json["summary"].as_str().unwrap().contains("typically busiest"));
}

#[tokio::test]
async fn test_busyness_peak_bad_day_is_400() {
    let resp = make_app()
        .oneshot(get("/busyness/peak?q=bsc&day=tuesday"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_cors_allows_localhost_origin() {
    let req = Request::get("/health")
        .header("origin", "http://localhost:3030")
        .body(Body::empty())
        .unwrap();
    let resp = make_app().oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers()["access-control-allow-origin"],
        "http://localhost:3030"
    );
}

#[tokio::test]
async fn test_cors_rejects_foreign_origin() {
    let req = Request::get("/health")
        .header("origin", "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let resp = make_app().oneshot(req).await.unwrap();
    assert!(resp.headers().get("access-control-allow-origin").is_none());
}
