use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};
use uuid::Uuid;

use super::router::AppState;
use crate::error::AppError;
use crate::storage::Video;

/// Fetch a video record by id
pub async fn get_video(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Video>, AppError> {
    let Path(video_id) =
        path.map_err(|e| AppError::BadRequest(format!("Invalid video ID: {}", e.body_text())))?;

    let video = state
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    Ok(Json(video))
}
