//! Production runner backed by `tokio::process`.

use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::{DeployError, DeployResult};

/// Bytes kept per stream (10 MiB). Output past the limit is still read
/// from the pipe and discarded, so the child neither blocks on a full
/// pipe nor dies of SIGPIPE.
const CAPTURE_LIMIT_BYTES: u64 = 10 * 1024 * 1024;

/// Spawns each command as a child process and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> DeployResult<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the child on timeout kills the process.
            .kill_on_drop(true);

        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if let Some(dir) = &spec.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(command = %spec.display(), "Spawning command");
        let start = Instant::now();

        let mut child = cmd.spawn().map_err(|source| DeployError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();
        let stdout_task = tokio::spawn(capture(stdout_handle));
        let stderr_task = tokio::spawn(capture(stderr_handle));

        match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                let stdout_bytes = stdout_task.await.unwrap_or_default();
                let stderr_bytes = stderr_task.await.unwrap_or_default();
                Ok(CommandOutput {
                    stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                    exit_code: status.code().unwrap_or(-1),
                    duration_ms,
                })
            }
            Ok(Err(source)) => Err(DeployError::Spawn {
                program: spec.program.clone(),
                source,
            }),
            Err(_elapsed) => Err(DeployError::Timeout {
                command: spec.display(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}

/// Keep the first [`CAPTURE_LIMIT_BYTES`] of `stream`, drain the rest.
async fn capture<R: AsyncRead + Unpin>(stream: Option<R>) -> Vec<u8> {
    let Some(stream) = stream else {
        return Vec::new();
    };
    let mut kept = Vec::new();
    let mut head = stream.take(CAPTURE_LIMIT_BYTES);
    if head.read_to_end(&mut kept).await.is_ok() {
        let mut rest = head.into_inner();
        let _ = tokio::io::copy(&mut rest, &mut tokio::io::sink()).await;
    }
    kept
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
