//! Blocking child-process execution with a deadline and bounded output capture.
//!
//! Used for rsync. Pipeline launches go through [`crate::io::launcher`]
//! instead and are never waited on.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured output of a finished (or killed) child.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes drained from stdout/stderr but not kept.
    pub dropped_bytes: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Short human-readable failure description for logs and outcomes.
    pub fn failure_summary(&self, label: &str) -> String {
        if self.timed_out {
            return format!("{label} timed out");
        }
        let stderr = String::from_utf8_lossy(&self.stderr);
        let last = stderr.lines().rev().find(|line| !line.trim().is_empty());
        match (self.status.code(), last) {
            (Some(code), Some(line)) => format!("{label} exited with {code}: {}", line.trim()),
            (Some(code), None) => format!("{label} exited with {code}"),
            (None, _) => format!("{label} terminated by signal"),
        }
    }
}

/// Run `cmd` to completion or until `timeout`, killing it on expiry.
///
/// stdout and stderr are drained on separate threads so a chatty child cannot
/// block on a full pipe; at most `output_limit_bytes` of each are kept.
#[instrument(
    skip_all,
    fields(timeout_secs = timeout.as_secs(), output_limit_bytes = output_limit_bytes)
)]
pub fn run_command_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!(program = ?cmd.get_program(), "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, program = ?cmd.get_program(), "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {:?}", cmd.get_program()));
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_handle).context("join stderr")?;
    let dropped_bytes = stdout_dropped + stderr_dropped;
    if dropped_bytes > 0 {
        warn!(dropped_bytes, "command output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        dropped_bytes,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .unwrap_or_else(|_| Err(anyhow!("output reader thread panicked")))
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
    Ok((kept, dropped))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_output_and_status() {
        let out = run_command_with_timeout(
            sh("echo hi; echo oops >&2; exit 3"),
            Duration::from_secs(10),
            1000,
        )
        .expect("run");
        assert!(!out.success());
        assert_eq!(out.stdout_lossy(), "hi\n");
        assert_eq!(out.failure_summary("rsync"), "rsync exited with 3: oops");
    }

    #[test]
    fn bounds_captured_output() {
        let out = run_command_with_timeout(sh("printf 'abcdefghij'"), Duration::from_secs(10), 4)
            .expect("run");
        assert!(out.success());
        assert_eq!(out.stdout, b"abcd");
        assert_eq!(out.dropped_bytes, 6);
    }

    #[test]
    fn kills_on_timeout() {
        let out = run_command_with_timeout(sh("sleep 5"), Duration::from_millis(100), 100)
            .expect("run");
        assert!(out.timed_out);
        assert_eq!(out.failure_summary("rsync"), "rsync timed out");
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_command_with_timeout(
            Command::new("/nonexistent/seqrun-test-binary"),
            Duration::from_secs(1),
            100,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn"));
    }
}
