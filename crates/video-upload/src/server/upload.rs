use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        rejection::PathRejection,
        Multipart, Path, State,
    },
    http::HeaderMap,
    Json,
};
use futures_util::future::join;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::router::AppState;
use crate::error::AppError;
use crate::media::{faststart::processed_path, AspectRatio};
use crate::storage::Video;

/// Multipart field carrying the file
const UPLOAD_FIELD: &str = "video";

const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Accept an mp4 for a video the caller owns, remux it for fast start,
/// store it and point the record at the stored object.
#[instrument(skip_all, fields(video_id, user_id))]
pub async fn upload_video(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let Path(video_id) =
        path.map_err(|e| AppError::BadRequest(format!("Invalid video ID: {}", e.body_text())))?;
    tracing::Span::current().record("video_id", tracing::field::display(video_id));

    let user_id = state.auth.authenticate(&headers)?;
    tracing::Span::current().record("user_id", tracing::field::display(user_id));

    let video = state
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Video {} not found", video_id)))?;

    if video.user_id != user_id {
        return Err(AppError::Forbidden(
            "You are not the owner of this video".to_string(),
        ));
    }

    let mut multipart = multipart
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e.body_text())))?;

    let original = original_path(&state.config.temp_dir, video_id);
    let size = receive_upload(
        &mut multipart,
        &state.config.temp_dir,
        &original,
        state.config.max_upload_bytes,
    )
    .await?;
    let temp = TempFiles::new(original);
    info!(bytes = size, "Upload received");

    let result = process_upload(&state, video_id, &temp.original).await;
    temp.cleanup().await;

    let video = result?;
    info!(url = video.video_url.as_deref().unwrap_or_default(), "Video stored");

    Ok(Json(video))
}

/// Probe, remux, store, then record the URL. The record is only touched
/// after the object is stored.
async fn process_upload(
    state: &AppState,
    video_id: Uuid,
    original: &FsPath,
) -> Result<Video, AppError> {
    let aspect = state.media.aspect_ratio(original).await?;
    let processed = state.media.fast_start(original).await?;

    let key = storage_key(aspect, video_id);
    state
        .storage
        .put_file(&key, &processed, VIDEO_CONTENT_TYPE)
        .await?;

    let video = state
        .videos
        .set_video_url(video_id, state.config.public_url(&key))
        .await?;

    Ok(video)
}

pub fn storage_key(aspect: AspectRatio, video_id: Uuid) -> String {
    format!("{}/{}.mp4", aspect, video_id)
}

fn original_path(temp_dir: &FsPath, video_id: Uuid) -> PathBuf {
    temp_dir.join(format!("{}.mp4", video_id))
}

/// Stream the `video` part into a staging file under `temp_dir`, enforcing
/// type and size limits, then move it onto `dest`. Nothing at `dest` is
/// touched unless the whole part was accepted.
async fn receive_upload(
    multipart: &mut Multipart,
    temp_dir: &FsPath,
    dest: &FsPath,
    max_bytes: u64,
) -> Result<u64, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        if field.file_name().is_none() {
            return Err(AppError::BadRequest(format!(
                "Field \"{}\" must be a file",
                UPLOAD_FIELD
            )));
        }

        if !is_mp4(field.content_type()) {
            return Err(AppError::BadRequest(format!(
                "Invalid file type {:?}, only {} is allowed",
                field.content_type().unwrap_or_default(),
                VIDEO_CONTENT_TYPE
            )));
        }

        // The staging file is deleted when `staging` drops without being persisted
        let (file, staging) = NamedTempFile::new_in(temp_dir)
            .map_err(|e| write_error(temp_dir, e))?
            .into_parts();
        let file = tokio::fs::File::from_std(file);
        let written = write_field(field, file, &staging, max_bytes).await?;

        staging
            .persist(dest)
            .map_err(|e| write_error(dest, e.error))?;
        return Ok(written);
    }

    Err(AppError::BadRequest(format!(
        "Missing \"{}\" file field",
        UPLOAD_FIELD
    )))
}

async fn write_field(
    mut field: Field<'_>,
    mut file: tokio::fs::File,
    path: &FsPath,
    max_bytes: u64,
) -> Result<u64, AppError> {
    let mut written = 0u64;

    while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
        written += chunk.len() as u64;
        if written > max_bytes {
            return Err(AppError::BadRequest(format!(
                "File exceeds the maximum upload size of {} bytes",
                max_bytes
            )));
        }
        file.write_all(&chunk).await.map_err(|e| write_error(path, e))?;
    }

    file.flush().await.map_err(|e| write_error(path, e))?;
    Ok(written)
}

fn write_error(path: &FsPath, e: std::io::Error) -> AppError {
    AppError::Internal(format!("failed to write {}: {}", path.display(), e))
}

/// Compares the media type essence, ignoring parameters
fn is_mp4(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .is_some_and(|m| m.essence_str().eq_ignore_ascii_case(VIDEO_CONTENT_TYPE))
}

fn bad_multipart(e: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
}

/// The two per-request temp files: the raw upload and its remuxed copy.
/// If the request is dropped before `cleanup` finishes, both are removed on drop.
struct TempFiles {
    original: PathBuf,
    processed: PathBuf,
    armed: bool,
}

impl TempFiles {
    fn new(original: PathBuf) -> Self {
        let processed = processed_path(&original);
        Self {
            original,
            processed,
            armed: true,
        }
    }

    /// Best-effort; both removals are attempted
    async fn cleanup(mut self) {
        join(
            remove_quietly(&self.original),
            remove_quietly(&self.processed),
        )
        .await;
        self.armed = false;
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        for path in [&self.original, &self.processed] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed abandoned temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
            }
        }
    }
}

async fn remove_quietly(path: &FsPath) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed temp file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}
