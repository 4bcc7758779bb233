//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle to render it.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "linewatch_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "linewatch_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "linewatch_http_requests_in_flight";
    pub const STAGE_TRIGGERS_TOTAL: &str = "linewatch_stage_triggers_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a stage trigger and whether it started a new run.
pub fn record_stage_trigger(stage: &str, accepted: bool) {
    let labels = [
        ("stage", stage.to_string()),
        ("accepted", accepted.to_string()),
    ];
    counter!(names::STAGE_TRIGGERS_TOTAL, &labels).increment(1);
}

/// Route prefixes whose next segment is a session id.
const SESSION_ROUTES: &[&str] = &[
    "analyze",
    "segment",
    "status",
    "segmentation-status",
    "results",
    "sessions",
];

/// Collapse session ids and file names so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut out = Vec::with_capacity(segments.len());
    let mut iter = segments.iter().enumerate();

    while let Some((i, segment)) = iter.next() {
        out.push(*segment);
        if i == 1 && SESSION_ROUTES.contains(segment) && segments.len() > 2 {
            iter.next();
            out.push(":session_id");
            if let Some((_, kind)) = iter.next() {
                out.push(kind);
                if iter.next().is_some() {
                    out.push(":file");
                }
            }
        }
    }
    out.join("/")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/analyze/abc-123"), "/analyze/:session_id");
        assert_eq!(sanitize_path("/status/42"), "/status/:session_id");
        assert_eq!(sanitize_path("/sessions/42/files"), "/sessions/:session_id/files");
        assert_eq!(
            sanitize_path("/sessions/42/masks/a_mask.png"),
            "/sessions/:session_id/masks/:file"
        );
        assert_eq!(sanitize_path("/health"), "/health");
        assert_eq!(sanitize_path("/metrics"), "/metrics");
    }
}
