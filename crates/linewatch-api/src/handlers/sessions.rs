//! Session file and mask handlers.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use linewatch_models::SessionFile;

use crate::error::ApiResult;
use crate::state::AppState;

/// Source images in a session with their sizes.
pub async fn list_session_files(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<SessionFile>>> {
    Ok(Json(state.pipeline.list_files(&session_id).await?))
}

/// One source image, so viewers can lay the mask overlay on top.
pub async fn get_session_file(
    State(state): State<AppState>,
    Path((session_id, filename)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.pipeline.read_image(&session_id, &filename).await?;
    Ok(([(header::CONTENT_TYPE, image_content_type(&filename))], bytes))
}

/// Names of the mask overlays written for a session.
pub async fn list_session_masks(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.pipeline.list_masks(&session_id).await?))
}

/// One mask overlay as `image/png`.
pub async fn get_session_mask(
    State(state): State<AppState>,
    Path((session_id, mask_name)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.pipeline.read_mask(&session_id, &mask_name).await?;
    Ok(([(header::CONTENT_TYPE, "image/png")], bytes))
}

fn image_content_type(filename: &str) -> &'static str {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}
