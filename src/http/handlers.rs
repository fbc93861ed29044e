//! C7 — HTTP Handlers.
//!
//! Thin adapters. `create_payment` does not validate the payload; `summary`
//! parses timestamps only; `health` aggregates counters and the snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use crate::core::health::Route;
use crate::core::payload::Payload;
use crate::error::{InvalidRequest, StoreError};
use crate::http::state::AppState;

pub async fn create_payment(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    // The payload is opaque: a body that isn't valid JSON is still admitted
    // as an empty object rather than rejected (the handler does not
    // validate the payload).
    let value: Value = serde_json::from_slice(&body).unwrap_or(Value::Object(Default::default()));
    let payload = Payload::new(value);

    match state.buffer.enqueue(payload) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(_queue_full) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "queue_full"})),
        )
            .into_response(),
    }
}

pub async fn payments_summary(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let (from, to) = match parse_window(&params) {
        Ok(window) => window,
        Err(e) => {
            tracing::debug!(error = %e, "payments_summary: rejecting request");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid_request"})),
            )
                .into_response();
        }
    };

    match state.recorder.summary(from, to).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(StoreError::Unavailable(reason)) => {
            tracing::warn!(reason, "payments_summary: store unavailable, serving fallback body");
            (StatusCode::OK, Json(fallback_summary())).into_response()
        }
    }
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.health_cache.snapshot();
    let slow_threshold_ms = state.slow_threshold_ms;

    let route_body = |route: Route| {
        let record = snapshot.record(route);
        json!({
            "failing": record.failing,
            "healthy": record.is_healthy(slow_threshold_ms),
            "minResponseTimeMs": record.min_response_time_ms,
            "checkedAt": record.checked_at.to_rfc3339(),
        })
    };

    Json(json!({
        "status": "ok",
        "queue": {
            "queue_size": state.buffer.size(),
            "in_flight": state.buffer.in_flight(),
        },
        "routes": {
            "default": route_body(Route::Default),
            "fallback": route_body(Route::Fallback),
        },
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"})))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_window(
    params: &HashMap<String, String>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), InvalidRequest> {
    let from = params
        .get("from")
        .ok_or_else(|| InvalidRequest::Malformed("missing \"from\"".to_string()))?;
    let to = params
        .get("to")
        .ok_or_else(|| InvalidRequest::Malformed("missing \"to\"".to_string()))?;
    let from = parse_timestamp(from)
        .ok_or_else(|| InvalidRequest::Malformed(format!("\"from\"={from:?} is not ISO-8601")))?;
    let to = parse_timestamp(to)
        .ok_or_else(|| InvalidRequest::Malformed(format!("\"to\"={to:?} is not ISO-8601")))?;
    Ok((from, to))
}

fn fallback_summary() -> Value {
    json!({
        "default": {"totalRequests": 0, "totalAmount": 0.0},
        "fallback": {"totalRequests": 0, "totalAmount": 0.0},
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_accepts_rfc3339_and_rejects_garbage() {
        assert!(parse_timestamp("2024-01-01T10:00:00Z").is_some());
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn fallback_summary_has_both_routes_zeroed() {
        let body = fallback_summary();
        assert_eq!(body["default"]["totalRequests"], 0);
        assert_eq!(body["fallback"]["totalAmount"], 0.0);
    }

    #[test]
    fn parse_window_rejects_missing_params() {
        let params = HashMap::new();
        assert!(parse_window(&params).is_err());
    }

    #[test]
    fn parse_window_rejects_malformed_timestamp() {
        let mut params = HashMap::new();
        params.insert("from".to_string(), "2024-01-01T09:00:00Z".to_string());
        params.insert("to".to_string(), "not-a-date".to_string());
        assert!(parse_window(&params).is_err());
    }

    #[test]
    fn parse_window_accepts_both_params() {
        let mut params = HashMap::new();
        params.insert("from".to_string(), "2024-01-01T09:00:00Z".to_string());
        params.insert("to".to_string(), "2024-01-01T10:30:00Z".to_string());
        assert!(parse_window(&params).is_ok());
    }
}
