//! HTTP ingestion/query boundary.
//!
//! - `GET /api/events` — latest N buffered events, newest-first, each
//!   annotated with a verdict computed against the current trust policy.
//! - `POST /api/device-events` (alias `/api/browser-events`) — batch
//!   ingestion from remote agents, tagged with a source identifier.
//! - `GET /health` — liveness probe.
//!
//! Ingestion never classifies; verdicts are always computed at query time
//! so policy edits apply retroactively to buffered history.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use egress_core::{classify, ConnectionEvent, Verdict};

use crate::policy_cache::PolicyCache;
use crate::store::EventStore;

/// Shared state for the events API.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<EventStore>,
    pub policy: Arc<PolicyCache>,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub n: Option<usize>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// A stored record plus its query-time verdict.
#[derive(Debug, Serialize)]
struct AnnotatedEvent {
    #[serde(flatten)]
    event: ConnectionEvent,
    verdict: Verdict,
}

/// GET /api/events - latest events with verdicts, newest-first
async fn get_events(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    let n = query.n.unwrap_or(50);
    let source = query.device_id.as_deref().or(query.session_id.as_deref());

    let events = state.store.latest(source, n);

    // Classification happens out here, never under the store lock.
    let policy = state.policy.current();
    let annotated: Vec<AnnotatedEvent> = events
        .into_iter()
        .map(|event| {
            let verdict = classify(&event, &policy);
            AnnotatedEvent { event, verdict }
        })
        .collect();

    Json(serde_json::json!({
        "events": annotated,
        "count": annotated.len(),
    }))
}

/// POST /api/device-events - ingest a batch from a remote agent
async fn ingest_events(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Some(raw_events) = body.get("events").and_then(|v| v.as_array()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "status": "error",
                "message": "payload must carry an events list",
            })),
        )
            .into_response();
    };

    let source_id = body
        .get("device_id")
        .or_else(|| body.get("session_id"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown-device")
        .to_string();

    let received_at = chrono::Utc::now().timestamp_micros() as f64 / 1e6;

    let mut accepted: Vec<ConnectionEvent> = Vec::with_capacity(raw_events.len());
    for raw in raw_events {
        match serde_json::from_value::<ConnectionEvent>(raw.clone()) {
            Ok(mut event) => {
                event.source_id = Some(source_id.clone());
                event.received_at = Some(received_at);
                accepted.push(event);
            }
            Err(e) => {
                // A single bad data point is dropped, not allowed to fail
                // the batch.
                tracing::debug!("dropping malformed event from {}: {}", source_id, e);
            }
        }
    }

    let received = accepted.len();
    state.store.append(&source_id, accepted);
    tracing::debug!("ingested {} events from {}", received, source_id);

    Json(serde_json::json!({
        "status": "success",
        "received": received,
    }))
    .into_response()
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the events API router.
pub fn events_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/events", get(get_events))
        .route("/api/device-events", post(ingest_events))
        .route("/api/browser-events", post(ingest_events))
        .route("/health", get(health))
        .with_state(state)
}
