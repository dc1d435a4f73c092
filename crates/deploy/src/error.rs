//! Error type shared by every deploy operation.
//!
//! Each variant maps to one failure class of the pipeline. Errors are
//! never recovered locally: they abort the running operation and reach
//! the CLI unchanged.

use std::path::PathBuf;

use honestman_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Invalid target, unknown host group, or bad configuration value
    /// rejected by the domain layer before any command ran.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A local build step (compiler, asset embedder, compressor) exited
    /// non-zero.
    #[error("Local command `{command}` failed (exit code {exit_code}): {stderr}")]
    LocalCommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// `ssh` could not reach or authenticate against the host.
    #[error("Connection to {host} failed: {message}")]
    RemoteConnectionFailed { host: String, message: String },

    /// The remote command ran and exited non-zero.
    #[error("Remote command `{command}` failed on {host} (exit code {exit_code}): {stderr}")]
    RemoteCommandFailed {
        host: String,
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// `scp` failed while copying a file to the host.
    #[error("Transfer of {} to {host}:{remote} failed: {message}", .local.display())]
    TransferFailed {
        host: String,
        local: PathBuf,
        remote: String,
        message: String,
    },

    /// `upload` was asked to send an artifact that was never built.
    #[error("Artifact {} does not exist; run `build` first", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("Command `{command}` timed out after {elapsed_ms}ms")]
    Timeout { command: String, elapsed_ms: u64 },

    /// The program could not be started at all (not installed, not on PATH).
    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type DeployResult<T> = Result<T, DeployError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
