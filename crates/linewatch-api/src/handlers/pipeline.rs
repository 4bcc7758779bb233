//! Stage trigger handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use linewatch_models::{DetectionAccepted, SegmentationAccepted};
use tracing::info;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

/// Start detection for a session. Segmentation is chained automatically.
pub async fn start_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<(StatusCode, Json<DetectionAccepted>)> {
    let accepted = state.pipeline.start_detection(&session_id).await?;
    metrics::record_stage_trigger("detection", true);

    info!(
        session_id = %session_id,
        total_images = accepted.total_images,
        "Detection accepted"
    );
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// Start segmentation over already persisted results.
///
/// Returns 202 when a run was started and 200 when an existing job was
/// reused.
pub async fn start_segmentation(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<(StatusCode, Json<SegmentationAccepted>)> {
    let accepted = state.pipeline.start_segmentation(&session_id).await?;
    metrics::record_stage_trigger("segmentation", accepted.accepted);

    let status = if accepted.accepted {
        info!(session_id = %session_id, "Segmentation accepted");
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(accepted)))
}
