use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// A video's metadata record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub video_url: Option<String>,
}

impl Video {
    pub fn new(user_id: Uuid, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            video_url: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("video {0} not found")]
    NotFound(Uuid),

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid video records file: {0}")]
    Format(#[from] serde_json::Error),
}

/// Record store for videos, keyed by id
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Video>, StoreError>;

    /// Replace an existing record
    async fn update(&self, video: &Video) -> Result<(), StoreError>;

    /// Point the current record at `url` and bump `updated_at`, leaving
    /// every other field as stored
    async fn set_video_url(&self, id: Uuid, url: String) -> Result<Video, StoreError>;
}

/// Map-backed store, optionally mirrored to a JSON file
#[derive(Default)]
pub struct MemoryVideoStore {
    videos: RwLock<HashMap<Uuid, Video>>,
    file: Option<PathBuf>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records from `path` (a JSON array); a missing file starts empty
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let videos: Vec<Video> = match tokio::fs::read(path).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        info!(count = videos.len(), path = %path.display(), "Loaded video records");

        Ok(Self {
            videos: RwLock::new(videos.into_iter().map(|v| (v.id, v)).collect()),
            file: Some(path.to_path_buf()),
        })
    }

    pub async fn insert(&self, video: Video) {
        self.videos.write().await.insert(video.id, video);
    }

    /// Rewrite the backing file via a temp file and rename
    async fn persist(&self, videos: &HashMap<Uuid, Video>) -> Result<(), StoreError> {
        let Some(path) = &self.file else {
            return Ok(());
        };

        let mut records: Vec<&Video> = videos.values().collect();
        records.sort_by_key(|v| v.created_at);
        let data = serde_json::to_vec_pretty(&records)?;

        let staging = path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        tokio::fs::write(&staging, data).await.map_err(io_err)?;
        tokio::fs::rename(&staging, path).await.map_err(io_err)?;

        debug!(count = records.len(), "Persisted video records");
        Ok(())
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn get(&self, id: Uuid) -> Result<Option<Video>, StoreError> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update(&self, video: &Video) -> Result<(), StoreError> {
        let mut videos = self.videos.write().await;

        let entry = videos.get_mut(&video.id).ok_or(StoreError::NotFound(video.id))?;
        *entry = video.clone();

        self.persist(&videos).await
    }

    async fn set_video_url(&self, id: Uuid, url: String) -> Result<Video, StoreError> {
        let mut videos = self.videos.write().await;

        let entry = videos.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        entry.video_url = Some(url);
        entry.updated_at = Utc::now();
        let video = entry.clone();

        self.persist(&videos).await?;
        Ok(video)
    }
}
