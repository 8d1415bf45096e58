//! Small process-related helpers shared across the workspace.
//!
//! Every external tool invocation (ffmpeg, ffprobe) goes through these
//! helpers so that:
//! - no console window flashes up on Windows,
//! - the child is killed when the owning future is dropped (cancellation),
//! - stdout/stderr are captured for diagnostics.

use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` suitable for running media tools.
///
/// The command has no window on Windows, a null stdin and is killed when the
/// handle is dropped, so cancelling the awaiting future also stops the child.
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd.stdin(Stdio::null()).kill_on_drop(true);
    cmd
}

/// Output of a finished child process.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CapturedOutput {
    /// Last `max_lines` non-empty lines of stderr, joined with `" | "`.
    pub fn stderr_tail(&self, max_lines: usize) -> String {
        tail_lines(&self.stderr, max_lines)
    }
}

/// Run `cmd` to completion with piped stdout/stderr and collect both.
///
/// Dropping the returned future kills the child (see [`tokio_command`]).
pub async fn run_captured(cmd: &mut tokio::process::Command) -> std::io::Result<CapturedOutput> {
    let start = Instant::now();
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let output = cmd.spawn()?.wait_with_output().await?;

    Ok(CapturedOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        elapsed: start.elapsed(),
    })
}

/// Last `max_lines` non-empty lines of `text`, joined with `" | "`.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_lines_keeps_last_non_empty() {
        let text = "first\n\nsecond\n  third  \n\n";
        assert_eq!(tail_lines(text, 2), "second | third");
        assert_eq!(tail_lines(text, 10), "first | second | third");
        assert_eq!(tail_lines("", 3), "");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captured_collects_streams() {
        let mut cmd = tokio_command("sh");
        cmd.args(["-c", "echo out; echo err 1>&2; exit 3"]);
        let output = run_captured(&mut cmd).await.unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr_tail(1), "err");
    }
}
