//! Runs approved commands through the user's shell.

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::parser::ParsedCommand;

/// Per-stream cap on captured output.
const MAX_OUTPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to start {shell}: {source}")]
    Spawn {
        shell: String,
        source: std::io::Error,
    },
    #[error("I/O error while running command: {0}")]
    Io(#[from] std::io::Error),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub command: String,
    pub success: bool,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, Clone)]
pub struct Executor {
    shell: String,
    timeout: Duration,
}

impl Executor {
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    pub async fn execute(
        &self,
        parsed: &ParsedCommand,
        sandbox: bool,
    ) -> Result<ExecutionResult, ExecError> {
        let command = parsed.raw_command.as_str();
        if sandbox {
            // isolation is not enforced; the marker is recorded only
            tracing::info!(command, "sandbox requested, running unisolated");
        }
        tracing::info!(command, shell = %self.shell, "executing");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command).stdin(Stdio::null()).kill_on_drop(true);
        // a backgrounded job would hold captured pipes open after the shell exits
        if parsed.background {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        } else {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            shell: self.shell.clone(),
            source,
        })?;

        let start = Instant::now();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let run = async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_capped(stdout), read_capped(stderr));
            Ok::<_, std::io::Error>((status?, stdout?, stderr?))
        };
        let (status, stdout, stderr) = match tokio::time::timeout(self.timeout, run).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(command, timeout = ?self.timeout, "command timed out, killed");
                return Err(ExecError::Timeout(self.timeout));
            }
        };
        let duration = start.elapsed();

        let result = ExecutionResult {
            command: command.to_string(),
            success: status.success(),
            exit_code: status.code(),
            stdout: stdout.render(),
            stderr: stderr.render(),
            duration,
        };
        tracing::debug!(
            command,
            exit_code = ?result.exit_code,
            duration_ms = duration.as_millis() as u64,
            "command finished"
        );
        Ok(result)
    }
}

/// Output of one stream, keeping at most [`MAX_OUTPUT_BYTES`].
#[derive(Debug, Default)]
struct Captured {
    kept: Vec<u8>,
    total: usize,
}

impl Captured {
    fn push(&mut self, chunk: &[u8]) {
        self.total += chunk.len();
        let room = MAX_OUTPUT_BYTES.saturating_sub(self.kept.len());
        self.kept.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn render(mut self) -> String {
        if self.total <= self.kept.len() {
            return String::from_utf8_lossy(&self.kept).into_owned();
        }
        // drop a multi-byte sequence split by the cap
        if let Err(e) = std::str::from_utf8(&self.kept) {
            if e.error_len().is_none() {
                self.kept.truncate(e.valid_up_to());
            }
        }
        let mut text = String::from_utf8_lossy(&self.kept).into_owned();
        text.push_str(&format!("\n[truncated, {} bytes total]", self.total));
        text
    }
}

/// Drain a stream to EOF so the child never blocks on a full pipe, keeping
/// only the head of it.
async fn read_capped<R: AsyncRead + Unpin>(stream: Option<R>) -> std::io::Result<Captured> {
    let mut captured = Captured::default();
    let Some(mut stream) = stream else {
        return Ok(captured);
    };
    let mut buf = [0u8; 8192];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(captured);
        }
        captured.push(&buf[..n]);
    }
}
