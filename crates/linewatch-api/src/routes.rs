//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    get_results, get_segmentation_status, get_session_file, get_session_mask, get_status, health,
    list_session_files, list_session_masks, ready, start_analysis, start_segmentation,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, redact_internal_errors, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Stage triggers
    let pipeline_routes = Router::new()
        .route("/analyze/:session_id", post(start_analysis))
        .route("/segment/:session_id", post(start_segmentation));

    // Polling and results
    let status_routes = Router::new()
        .route("/status/:session_id", get(get_status))
        .route("/segmentation-status/:session_id", get(get_segmentation_status))
        .route("/results/:session_id", get(get_results));

    let session_routes = Router::new()
        .route("/sessions/:session_id/files", get(list_session_files))
        .route("/sessions/:session_id/files/:filename", get(get_session_file))
        .route("/sessions/:session_id/masks", get(list_session_masks))
        .route("/sessions/:session_id/masks/:mask_name", get(get_session_mask));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(pipeline_routes)
        .merge(status_routes)
        .merge(session_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::map_response_with_state(
            state.clone(),
            redact_internal_errors,
        ))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
