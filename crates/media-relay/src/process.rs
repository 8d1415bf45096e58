//! External process capability (ffmpeg / ffprobe).

use async_trait::async_trait;
use process_utils::{run_captured, tail_lines, tokio_command};
use tracing::debug;

/// Captured result of one external process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Short diagnostic for error messages: exit code plus the stderr tail.
    pub fn describe_failure(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let tail = tail_lines(&self.stderr, 3);
        if tail.is_empty() {
            format!("exit code {code}")
        } else {
            format!("exit code {code}: {tail}")
        }
    }
}

/// Runs external programs to completion.
///
/// Implementations must kill the child when the returned future is dropped.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ProcessOutput>;
}

/// [`ProcessRunner`] that spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRunner;

#[async_trait]
impl ProcessRunner for CommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<ProcessOutput> {
        debug!(program, ?args, "spawning");

        let mut cmd = tokio_command(program);
        cmd.args(args).env("LC_ALL", "C"); // Force consistent output
        let output = run_captured(&mut cmd).await?;

        debug!(
            program,
            code = ?output.status.code(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "process finished"
        );
        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
