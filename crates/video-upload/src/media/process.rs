use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::MediaError;

/// Captured result of an external process run to completion
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Spawns a program, waits for it to exit and hands back its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, MediaError>;
}

/// Runs programs with tokio, killing any run that exceeds `timeout`
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, MediaError> {
        debug!(program, ?args, "Spawning process");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| MediaError::TimedOut {
                program: program.to_string(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|source| MediaError::Spawn {
                program: program.to_string(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_output_and_exit_code() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let args: Vec<OsString> = vec!["-c".into(), "echo out; echo err >&2; exit 3".into()];

        let output = runner.run("sh", &args).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(output.stderr_text(), "err");
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let result = runner.run("definitely-not-a-real-binary-3f9a", &[]).await;
        assert!(matches!(result, Err(MediaError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let runner = SystemRunner::new(Duration::from_millis(100));
        let args: Vec<OsString> = vec!["5".into()];

        let result = runner.run("sleep", &args).await;
        assert!(matches!(result, Err(MediaError::TimedOut { .. })));
    }
}
