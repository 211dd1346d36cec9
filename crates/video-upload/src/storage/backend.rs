use std::path::Path as FsPath;
use std::sync::Arc;

use anyhow::{Context, Result};
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, path::Path, Attribute, Attributes,
    MultipartUpload, ObjectStore, PutMultipartOpts,
};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::config::{Config, StorageBackend};

/// Bytes per uploaded part; every part but the last is exactly this size
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Parts allowed in flight at once
const UPLOAD_CONCURRENCY: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("upload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Create an ObjectStore instance based on configuration
pub fn create_store(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    match config.storage_backend {
        StorageBackend::Local => {
            std::fs::create_dir_all(&config.local_path)
                .context("Failed to create local storage directory")?;
            let store = LocalFileSystem::new_with_prefix(&config.local_path)
                .context("Failed to create local filesystem store")?;
            Ok(Arc::new(store))
        }
        StorageBackend::S3 => {
            let mut builder = AmazonS3Builder::new()
                .with_bucket_name(&config.s3_bucket)
                .with_region(&config.s3_region)
                .with_access_key_id(&config.s3_access_key)
                .with_secret_access_key(&config.s3_secret_key);

            if let Some(endpoint) = &config.s3_endpoint {
                builder = builder.with_endpoint(endpoint);
                // For MinIO and other S3-compatible services
                builder = builder.with_allow_http(true);
            }

            let store = builder.build().context("Failed to create S3 store")?;
            Ok(Arc::new(store))
        }
    }
}

/// Write-once blob storage for processed videos
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    /// The local filesystem store rejects object attributes
    attributes_supported: bool,
}

impl ObjectStorage {
    pub fn new(store: Arc<dyn ObjectStore>, backend: StorageBackend) -> Self {
        Self {
            store,
            attributes_supported: backend == StorageBackend::S3,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(create_store(config)?, config.storage_backend))
    }

    /// Stream the file at `local_path` into the store under `key`
    ///
    /// Returns once the upload has completed. A failed upload is aborted.
    #[instrument(skip(self, local_path), fields(local_path = %local_path.display()))]
    pub async fn put_file(
        &self,
        key: &str,
        local_path: &FsPath,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let mut file = tokio::fs::File::open(local_path)
            .await
            .map_err(|source| read_error(local_path, source))?;

        let mut opts = PutMultipartOpts::default();
        if self.attributes_supported {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            opts.attributes = attributes;
        }

        let upload = self
            .store
            .put_multipart_opts(&Path::from(key), opts)
            .await?;
        let total = upload_parts(upload, &mut file, local_path).await?;
        debug!(key, bytes = total, "Object stored");

        Ok(total)
    }

    #[cfg(test)]
    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Send `reader` as fixed-size parts and complete the upload, aborting it on
/// any read, part or completion failure
async fn upload_parts<R: AsyncRead + Unpin>(
    mut upload: Box<dyn MultipartUpload>,
    reader: &mut R,
    local_path: &FsPath,
) -> Result<u64, StorageError> {
    let result = match send_parts(upload.as_mut(), reader, local_path).await {
        Ok(total) => upload.complete().await.map(|_| total).map_err(StorageError::from),
        Err(e) => Err(e),
    };

    if result.is_err() {
        if let Err(e) = upload.abort().await {
            warn!(error = %e, "Failed to abort multipart upload");
        }
    }

    result
}

async fn send_parts<R: AsyncRead + Unpin>(
    upload: &mut dyn MultipartUpload,
    reader: &mut R,
    local_path: &FsPath,
) -> Result<u64, StorageError> {
    // Dropping the set on an early return cancels parts still in flight
    let mut tasks = JoinSet::new();
    let mut total = 0u64;

    loop {
        let mut chunk = Vec::with_capacity(UPLOAD_CHUNK_SIZE);
        (&mut *reader)
            .take(UPLOAD_CHUNK_SIZE as u64)
            .read_to_end(&mut chunk)
            .await
            .map_err(|source| read_error(local_path, source))?;
        if chunk.is_empty() {
            break;
        }

        while tasks.len() >= UPLOAD_CONCURRENCY {
            join_part(&mut tasks).await?;
        }

        total += chunk.len() as u64;
        tasks.spawn(upload.put_part(chunk.into()));
    }

    while !tasks.is_empty() {
        join_part(&mut tasks).await?;
    }

    Ok(total)
}

async fn join_part(tasks: &mut JoinSet<object_store::Result<()>>) -> Result<(), StorageError> {
    if let Some(result) = tasks.join_next().await {
        result??;
    }
    Ok(())
}

fn read_error(path: &FsPath, source: std::io::Error) -> StorageError {
    StorageError::Read {
        path: path.display().to_string(),
        source,
    }
}
