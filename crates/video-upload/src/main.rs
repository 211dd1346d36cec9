use anyhow::Result;
use tracing_subscriber::EnvFilter;

use video_upload::config::Config;
use video_upload::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse_args();

    // Initialize tracing with configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    config.validate()?;

    tracing::info!("Starting video-upload");
    tracing::debug!(
        listen_addr = %config.listen_addr,
        storage_backend = ?config.storage_backend,
        temp_dir = %config.temp_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        "Configuration loaded"
    );

    let state = AppState::from_config(config).await?;
    server::serve(state).await
}
