use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

/// Largest accepted upload, inclusive (1 GiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1 << 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "video-upload")]
#[command(about = "Video upload and fast-start processing server")]
#[command(version)]
pub struct Config {
    /// Server listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8091")]
    pub listen_addr: String,

    /// Storage backend: "local" or "s3"
    #[arg(long, env = "STORAGE_BACKEND", default_value = "local")]
    pub storage_backend: StorageBackend,

    /// Local storage path (when using local backend)
    #[arg(long, env = "LOCAL_PATH", default_value = "./data")]
    pub local_path: String,

    /// S3 bucket name, also used to build public video URLs
    #[arg(long, env = "S3_BUCKET", default_value = "")]
    pub s3_bucket: String,

    /// S3 region, also used to build public video URLs
    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// S3 endpoint URL (for MinIO or custom S3)
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// S3 access key (for MinIO or explicit credentials)
    #[arg(long, env = "S3_ACCESS_KEY", default_value = "minioadmin")]
    pub s3_access_key: String,

    /// S3 secret key (for MinIO or explicit credentials)
    #[serde(skip_serializing)]
    #[arg(long, env = "S3_SECRET_KEY", default_value = "minioadmin")]
    pub s3_secret_key: String,

    /// Base URL that replaces the S3 virtual-host URL for stored videos
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// HMAC secret used to validate bearer tokens
    #[serde(skip_serializing)]
    #[arg(long, env = "JWT_SECRET", default_value = "", hide_env_values = true)]
    pub jwt_secret: String,

    /// Directory for in-flight upload files
    #[arg(long, env = "TEMP_DIR", default_value_os_t = std::env::temp_dir())]
    pub temp_dir: PathBuf,

    /// ffprobe executable
    #[arg(long, env = "FFPROBE_PATH", default_value = "ffprobe")]
    pub ffprobe_path: String,

    /// ffmpeg executable
    #[arg(long, env = "FFMPEG_PATH", default_value = "ffmpeg")]
    pub ffmpeg_path: String,

    /// Upper bound on a single ffprobe/ffmpeg run, in seconds
    #[arg(long, env = "PROCESS_TIMEOUT_SECS", default_value = "600")]
    pub process_timeout_secs: u64,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: u64,

    /// JSON file holding video records (loaded at start, rewritten on update)
    #[arg(long, env = "VIDEOS_FILE")]
    pub videos_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Parse from CLI args and environment
    pub fn parse_args() -> Self {
        Config::parse()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_backend == StorageBackend::S3 && self.s3_bucket.is_empty() {
            return Err(ConfigError::MissingS3Bucket);
        }

        if self.public_base_url.is_none() && self.s3_bucket.is_empty() {
            return Err(ConfigError::MissingPublicUrl);
        }

        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingJwtSecret);
        }

        if self.process_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }

        Ok(())
    }

    /// Public URL under which an object stored at `key` is served
    pub fn public_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.s3_bucket, self.s3_region, key
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8091".to_string(),
            storage_backend: StorageBackend::Local,
            local_path: "./data".to_string(),
            s3_bucket: "".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_endpoint: None,
            s3_access_key: "minioadmin".to_string(),
            s3_secret_key: "minioadmin".to_string(),
            public_base_url: None,
            jwt_secret: "".to_string(),
            temp_dir: std::env::temp_dir(),
            ffprobe_path: "ffprobe".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            process_timeout_secs: 600,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            videos_file: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("S3 bucket name required when using s3 backend")]
    MissingS3Bucket,

    #[error("S3 bucket or PUBLIC_BASE_URL required to build video URLs")]
    MissingPublicUrl,

    #[error("JWT secret must not be empty")]
    MissingJwtSecret,

    #[error("process timeout must be at least one second")]
    InvalidTimeout,

    #[error("maximum upload size must be greater than zero")]
    InvalidUploadLimit,
}
