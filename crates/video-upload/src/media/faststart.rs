use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::{check_exit, CommandRunner, MediaError};

/// Sibling of `input` that the remuxed file is written to
pub fn processed_path(input: &Path) -> PathBuf {
    input.with_extension("processed.mp4")
}

fn faststart_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.as_os_str().to_owned()];
    args.extend(
        [
            "-c",
            "copy",
            "-map_metadata",
            "0",
            "-movflags",
            "faststart",
            "-f",
            "mp4",
        ]
        .iter()
        .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}

/// Move the moov atom to the front without re-encoding
#[instrument(skip(runner, input), fields(path = %input.display()))]
pub async fn fast_start(
    runner: &dyn CommandRunner,
    ffmpeg: &str,
    input: &Path,
) -> Result<PathBuf, MediaError> {
    let output_path = processed_path(input);

    let output = runner.run(ffmpeg, &faststart_args(input, &output_path)).await?;
    check_exit(ffmpeg, &output)?;

    debug!(output = %output_path.display(), "Remuxed for fast start");
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::{failed, ok, FakeRunner};
    use tempfile::TempDir;

    #[test]
    fn test_processed_path_is_sibling() {
        assert_eq!(
            processed_path(Path::new("/tmp/uploads/abc.mp4")),
            PathBuf::from("/tmp/uploads/abc.processed.mp4")
        );
    }

    #[test]
    fn test_stream_copy_args() {
        let args = faststart_args(Path::new("in.mp4"), Path::new("out.mp4"));
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            args,
            [
                "-y", "-i", "in.mp4", "-c", "copy", "-map_metadata", "0", "-movflags",
                "faststart", "-f", "mp4", "out.mp4"
            ]
        );
    }

    #[tokio::test]
    async fn test_fast_start_writes_output() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("clip.mp4");
        std::fs::write(&input, b"fake mp4").unwrap();

        let runner = FakeRunner::with_dimensions(1920, 1080);
        let output = fast_start(&runner, "ffmpeg", &input).await.unwrap();

        assert_eq!(output, temp.path().join("clip.processed.mp4"));
        assert_eq!(std::fs::read(&output).unwrap(), b"fake mp4");
    }

    #[tokio::test]
    async fn test_fast_start_failure_carries_stderr() {
        let runner = FakeRunner::new(ok(String::new()), failed(1, "moov atom not found"));
        let err = fast_start(&runner, "ffmpeg", Path::new("/tmp/missing.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Failed { code: Some(1), .. }));
        assert!(err.to_string().contains("moov atom not found"));
    }
}
