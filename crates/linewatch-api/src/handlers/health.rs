//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub models_loaded: bool,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
///
/// The server only starts serving once its capabilities are constructed,
/// so reaching this handler means they are loaded.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        models_loaded: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: Vec<CheckStatus>,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub role: String,
    pub provider: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Readiness check endpoint (readiness probe).
/// Probes the detection and segmentation capabilities.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let start = Instant::now();
    let results = state.pipeline.capabilities_ready().await;
    let all_ok = results.iter().all(|check| check.is_ok());

    tracing::debug!(
        latency_ms = start.elapsed().as_millis() as u64,
        all_ok,
        "Readiness probe"
    );

    let checks = results
        .into_iter()
        .map(|check| CheckStatus {
            role: check.role.to_string(),
            provider: check.name.to_string(),
            status: if check.error.is_none() { "ok" } else { "error" }.to_string(),
            error: check.error,
        })
        .collect();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks,
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
