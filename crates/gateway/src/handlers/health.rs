//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use std::time::Instant;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub vector_store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - fixed payload while the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "active".to_string(),
    })
}

/// Readiness probe - checks the vector store
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = Instant::now();
    let backend = state.store.backend().to_string();

    let store_check = match state.store.count().await {
        Ok(records) => CheckResult {
            status: "up".to_string(),
            backend,
            records: Some(records),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            backend,
            records: None,
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let all_healthy = store_check.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks {
            vector_store: store_check,
        },
    })
}
