use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument};

use super::{check_exit, CommandRunner, MediaError};

/// Orientation bucket derived from a video's width:height ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    /// Roughly 16:9
    Landscape,
    /// Roughly 9:16
    Portrait,
    Other,
}

impl AspectRatio {
    /// Bounds are exclusive on both sides
    pub fn classify(width: u32, height: u32) -> Self {
        let ratio = f64::from(width) / f64::from(height);

        if ratio > 1.7 && ratio < 1.8 {
            AspectRatio::Landscape
        } else if ratio > 0.5 && ratio < 0.6 {
            AspectRatio::Portrait
        } else {
            AspectRatio::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "other",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
}

fn probe_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "json",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_owned());
    args
}

#[instrument(skip(runner, path), fields(path = %path.display()))]
pub async fn aspect_ratio(
    runner: &dyn CommandRunner,
    ffprobe: &str,
    path: &Path,
) -> Result<AspectRatio, MediaError> {
    let output = runner.run(ffprobe, &probe_args(path)).await?;
    check_exit(ffprobe, &output)?;

    let probe: ProbeOutput = serde_json::from_slice(&output.stdout)?;
    let stream = probe.streams.first().ok_or(MediaError::NoVideoStreams)?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(MediaError::MissingDimensions),
    };

    let aspect = AspectRatio::classify(width, height);
    debug!(width, height, %aspect, "Probed video dimensions");

    Ok(aspect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::testing::{failed, ok, FakeRunner};

    #[test]
    fn test_classify_common_resolutions() {
        assert_eq!(AspectRatio::classify(1920, 1080), AspectRatio::Landscape);
        assert_eq!(AspectRatio::classify(1280, 720), AspectRatio::Landscape);
        assert_eq!(AspectRatio::classify(1080, 1920), AspectRatio::Portrait);
        assert_eq!(AspectRatio::classify(1000, 1000), AspectRatio::Other);
        assert_eq!(AspectRatio::classify(640, 480), AspectRatio::Other);
    }

    #[test]
    fn test_classify_bounds_exclusive() {
        // 1.7 and 1.8 exactly
        assert_eq!(AspectRatio::classify(17, 10), AspectRatio::Other);
        assert_eq!(AspectRatio::classify(18, 10), AspectRatio::Other);
        // 0.5 and 0.6 exactly
        assert_eq!(AspectRatio::classify(1, 2), AspectRatio::Other);
        assert_eq!(AspectRatio::classify(3, 5), AspectRatio::Other);
    }

    #[test]
    fn test_display_matches_key_prefix() {
        assert_eq!(AspectRatio::Landscape.to_string(), "landscape");
        assert_eq!(AspectRatio::Portrait.to_string(), "portrait");
        assert_eq!(AspectRatio::Other.to_string(), "other");
    }

    #[tokio::test]
    async fn test_probe_landscape() {
        let runner = FakeRunner::with_dimensions(1920, 1080);
        let aspect = aspect_ratio(&runner, "ffprobe", Path::new("/tmp/x.mp4"))
            .await
            .unwrap();
        assert_eq!(aspect, AspectRatio::Landscape);

        let calls = runner.calls.lock().unwrap();
        let (_, args) = &calls[0];
        assert!(args.iter().any(|a| a == "v:0"));
        assert_eq!(args.last().unwrap(), "/tmp/x.mp4");
    }

    #[tokio::test]
    async fn test_probe_failure_carries_stderr() {
        let runner = FakeRunner::new(failed(2, "bad file"), ok(String::new()));
        let err = aspect_ratio(&runner, "ffprobe", Path::new("/tmp/x.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::Failed { code: Some(2), .. }));
        assert!(err.to_string().contains("bad file"));
    }

    #[tokio::test]
    async fn test_probe_no_streams() {
        let runner = FakeRunner::new(ok(r#"{"streams":[]}"#.to_string()), ok(String::new()));
        let err = aspect_ratio(&runner, "ffprobe", Path::new("/tmp/x.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::NoVideoStreams));
        assert_eq!(err.to_string(), "no video streams found");
    }

    #[tokio::test]
    async fn test_probe_garbage_output() {
        let runner = FakeRunner::new(ok("not json".to_string()), ok(String::new()));
        let err = aspect_ratio(&runner, "ffprobe", Path::new("/tmp/x.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::MalformedOutput(_)));
    }

    #[tokio::test]
    async fn test_probe_zero_height() {
        let runner = FakeRunner::with_dimensions(1920, 0);
        let err = aspect_ratio(&runner, "ffprobe", Path::new("/tmp/x.mp4"))
            .await
            .unwrap_err();

        assert!(matches!(err, MediaError::MissingDimensions));
    }
}
