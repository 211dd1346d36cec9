use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::JwtAuth;
use crate::config::Config;
use crate::media::{MediaTools, SystemRunner};
use crate::storage::{MemoryVideoStore, ObjectStorage, VideoStore};

/// Headroom over the file limit for multipart boundaries and part headers
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub auth: Arc<JwtAuth>,
    pub videos: Arc<dyn VideoStore>,
    pub storage: Arc<ObjectStorage>,
    pub media: Arc<MediaTools>,
}

impl AppState {
    /// Wire up collaborators from a validated configuration
    pub async fn from_config(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.temp_dir)
            .await
            .context("Failed to create temp directory")?;

        let videos: Arc<dyn VideoStore> = match &config.videos_file {
            Some(path) => Arc::new(
                MemoryVideoStore::open(path)
                    .await
                    .context("Failed to load video records")?,
            ),
            None => {
                warn!("No videos file configured, records will not survive a restart");
                Arc::new(MemoryVideoStore::new())
            }
        };

        let runner = Arc::new(SystemRunner::new(Duration::from_secs(
            config.process_timeout_secs,
        )));
        let media = MediaTools::new(
            runner,
            config.ffprobe_path.clone(),
            config.ffmpeg_path.clone(),
        );

        Ok(Self {
            auth: Arc::new(JwtAuth::new(&config.jwt_secret)),
            storage: Arc::new(ObjectStorage::from_config(&config)?),
            media: Arc::new(media),
            videos,
            config: Arc::new(config),
        })
    }
}

/// Create the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let body_limit = usize::try_from(state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/videos/:video_id", get(super::videos::get_video))
        .route(
            "/api/video_upload/:video_id",
            post(super::upload::upload_video),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}


#[cfg(test)]
mod tests {
    use super::testing::TestApp;
    use super::*;
    use crate::media::testing::FakeRunner;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_check() {
        let app = TestApp::new(FakeRunner::with_dimensions(1920, 1080));
        let router = create_router(app.state.clone());

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = TestApp::new(FakeRunner::with_dimensions(1920, 1080));
        let router = create_router(app.state.clone());

        let response = router
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_state_from_config_creates_dirs() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            s3_bucket: "tubes".to_string(),
            jwt_secret: "secret".to_string(),
            local_path: dir.path().join("bucket").to_str().unwrap().to_string(),
            temp_dir: dir.path().join("tmp"),
            videos_file: Some(dir.path().join("videos.json")),
            ..Config::default()
        };

        let state = AppState::from_config(config).await.unwrap();
        assert!(dir.path().join("tmp").is_dir());
        assert!(dir.path().join("bucket").is_dir());
        assert!(state
            .videos
            .get(uuid::Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}
