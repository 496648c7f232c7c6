//! Bounded shell command execution
//!
//! Runs a command through the configured shell with its working directory
//! fixed to an already-validated path, a hard wall-clock timeout, and
//! captured, size-limited stdout/stderr. Sandboxing here is directory and
//! timeout scoping only; the child inherits the caller's OS permissions.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::error::{ToolError, ToolResult};

// Killing the direct child does not reap grandchildren the shell forked,
// and a survivor that inherited a pipe write-end keeps it open with no
// EOF. The drain is bounded by this grace so run() still returns promptly.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// One command to execute: what, where, and for how long
///
/// `workdir` must already be validated by `PathGuard`; the sandbox never
/// sees raw user input for the working directory.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub command: String,
    pub workdir: PathBuf,
    pub timeout: Duration,
}

/// Outcome of one sandboxed execution
///
/// A non-zero exit status is a successful result carrying failure
/// information, not an error. On timeout, `timed_out` is set and the
/// capture holds whatever the child wrote before it was killed.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timed_out: bool,
    pub truncated: bool,
}

/// Shell command executor with timeout and output bounds
#[derive(Debug, Clone)]
pub struct CommandSandbox {
    shell: String,
    max_output_bytes: usize,
}

impl CommandSandbox {
    pub fn new(shell: impl Into<String>, max_output_bytes: usize) -> Self {
        Self {
            shell: shell.into(),
            max_output_bytes,
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Execute one command, returning promptly after the timeout even if
    /// the child ignores the kill briefly or left descendants behind
    pub async fn run(&self, invocation: &CommandInvocation) -> ToolResult<CommandResult> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&invocation.command)
            .current_dir(&invocation.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::ExecutionFailure(format!("{}: {}", self.shell, e)))?;

        // Drain both pipes concurrently so a chatty child cannot deadlock
        // on a full pipe buffer while we wait for exit. The readers write
        // into shared buffers so partial output survives an abandoned drain.
        let stdout_buf: Arc<Mutex<Vec<u8>>> = Arc::default();
        let stderr_buf: Arc<Mutex<Vec<u8>>> = Arc::default();
        let stdout_task = tokio::spawn(drain(child.stdout.take(), Arc::clone(&stdout_buf)));
        let stderr_task = tokio::spawn(drain(child.stderr.take(), Arc::clone(&stderr_buf)));

        let (exit_code, timed_out) =
            match tokio::time::timeout(invocation.timeout, child.wait()).await {
                Ok(Ok(status)) => (status.code(), false),
                Ok(Err(e)) => return Err(ToolError::internal(format!("wait failed: {}", e))),
                Err(_elapsed) => {
                    // Hard stop: kill and reap so run() returns promptly.
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    (None, true)
                }
            };

        // The pipes normally hit EOF the moment the child dies; a surviving
        // grandchild holding a write-end would stall the drain forever, so
        // give it a short grace and then take whatever was captured.
        let drains = async {
            let _ = stdout_task.await;
            let _ = stderr_task.await;
        };
        if tokio::time::timeout(DRAIN_GRACE, drains).await.is_err() {
            tracing::debug!(
                command = %invocation.command,
                "pipe drain abandoned after grace; descendant still holds the pipe"
            );
        }

        let stdout_raw = take_buf(&stdout_buf);
        let stderr_raw = take_buf(&stderr_buf);

        let (stdout, stdout_truncated) = truncate_output(&stdout_raw, self.max_output_bytes);
        let (stderr, stderr_truncated) = truncate_output(&stderr_raw, self.max_output_bytes);

        Ok(CommandResult {
            exit_code,
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
            timed_out,
            truncated: stdout_truncated || stderr_truncated,
        })
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>, buf: Arc<Mutex<Vec<u8>>>) {
    let Some(mut reader) = pipe else { return };
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buf = buf.lock().unwrap_or_else(|e| e.into_inner());
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

fn take_buf(buf: &Arc<Mutex<Vec<u8>>>) -> Vec<u8> {
    let mut buf = buf.lock().unwrap_or_else(|e| e.into_inner());
    std::mem::take(&mut *buf)
}

/// Truncate output to max bytes on a UTF-8 boundary
fn truncate_output(output: &[u8], max_bytes: usize) -> (String, bool) {
    if output.len() <= max_bytes {
        (String::from_utf8_lossy(output).to_string(), false)
    } else {
        (String::from_utf8_lossy(&output[..max_bytes]).to_string(), true)
    }
}
