//! External media tooling: ffprobe for dimensions, ffmpeg for fast-start remuxing.

pub mod faststart;
pub mod probe;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use probe::AspectRatio;
pub use process::{CommandOutput, CommandRunner, SystemRunner};

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} {}: {stderr}", describe_exit(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} did not finish within {secs}s")]
    TimedOut { program: String, secs: u64 },

    #[error("invalid ffprobe output: {0}")]
    MalformedOutput(#[from] serde_json::Error),

    #[error("no video streams found")]
    NoVideoStreams,

    #[error("video stream has no usable dimensions")]
    MissingDimensions,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

/// ffprobe/ffmpeg invocations bound to configured executables
pub struct MediaTools {
    runner: Arc<dyn CommandRunner>,
    ffprobe: String,
    ffmpeg: String,
}

impl MediaTools {
    pub fn new(runner: Arc<dyn CommandRunner>, ffprobe: String, ffmpeg: String) -> Self {
        Self {
            runner,
            ffprobe,
            ffmpeg,
        }
    }

    /// Classify the first video stream of `path` by its width:height ratio
    pub async fn aspect_ratio(&self, path: &Path) -> Result<AspectRatio, MediaError> {
        probe::aspect_ratio(self.runner.as_ref(), &self.ffprobe, path).await
    }

    /// Remux `path` for progressive playback, returning the new file's path
    pub async fn fast_start(&self, path: &Path) -> Result<PathBuf, MediaError> {
        faststart::fast_start(self.runner.as_ref(), &self.ffmpeg, path).await
    }
}

/// Turn a non-zero exit into `MediaError::Failed`
fn check_exit(program: &str, output: &CommandOutput) -> Result<(), MediaError> {
    if output.success() {
        return Ok(());
    }

    Err(MediaError::Failed {
        program: program.to_string(),
        code: output.code,
        stderr: output.stderr_text(),
    })
}
