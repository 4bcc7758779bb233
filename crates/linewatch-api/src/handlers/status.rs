//! Status and results handlers.

use axum::extract::{Path, State};
use axum::Json;
use linewatch_models::{ResultsDocument, StatusReport};

use crate::error::ApiResult;
use crate::state::AppState;

/// Detection job state, or a recovered status after a restart.
pub async fn get_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<StatusReport>> {
    Ok(Json(state.pipeline.get_status(&session_id).await?))
}

/// Segmentation job state, or a recovered status after a restart.
pub async fn get_segmentation_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<StatusReport>> {
    Ok(Json(state.pipeline.get_segmentation_status(&session_id).await?))
}

pub async fn get_results(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<ResultsDocument>> {
    Ok(Json(state.pipeline.get_results(&session_id).await?))
}
