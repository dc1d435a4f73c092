//! Command execution seam.
//!
//! Every external program the deploy pipeline touches (the Go toolchain,
//! `upx`, `ssh`, `scp`) is started through a [`CommandRunner`]. Production
//! code uses [`process::ProcessRunner`]; `--dry-run` swaps in
//! [`dry_run::DryRunRunner`], and tests drive the pipeline with
//! [`recording::RecordingRunner`].
//!
//! A non-zero exit status is reported in [`CommandOutput`], not as an
//! error: only the caller knows whether it means a failed build, a failed
//! remote command, or a lost connection.

pub mod dry_run;
pub mod process;
pub mod recording;

use std::path::PathBuf;
use std::time::Duration;

use honestman_core::shell::shell_escape;

use crate::error::DeployResult;

/// Default wall-clock limit for a single command. Go builds and `upx` on
/// a cold cache are the slow steps.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// A fully described program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables layered over the inherited environment.
    pub env: Vec<(String, String)>,
    /// Working directory (current dir if `None`).
    pub working_dir: Option<PathBuf>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            working_dir: None,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-like rendering used in logs and error messages, e.g.
    /// `GOOS=linux GOARCH=amd64 go build -o /tmp/api`.
    pub fn display(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{k}={}", shell_escape(v)))
            .collect();
        parts.push(shell_escape(&self.program));
        parts.extend(self.args.iter().map(|a| shell_escape(a)));
        parts.join(" ")
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl CommandOutput {
    /// An output with the given exit code and nothing captured.
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Trimmed stderr, falling back to stdout when stderr is empty; used
    /// as the human-readable reason in failure errors.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Executes [`CommandSpec`]s. Implementations must run the command to
/// completion (or timeout) before resolving.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        spec: &CommandSpec,
    ) -> impl std::future::Future<Output = DeployResult<CommandOutput>> + Send;

    /// `true` when commands are only reported, never executed. Callers
    /// skip checks on local files a real run would have produced.
    fn is_dry_run(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_env_program_and_quoted_args() {
        let spec = CommandSpec::new("go")
            .args(["build", "-o", "/tmp/api"])
            .env("GOOS", "linux")
            .env("GOARCH", "amd64");
        assert_eq!(spec.display(), "GOOS=linux GOARCH=amd64 go build -o /tmp/api");

        let ssh = CommandSpec::new("ssh").args(["web-1", "sudo sh -c uptime"]);
        assert_eq!(ssh.display(), "ssh web-1 'sudo sh -c uptime'");
    }

    #[test]
    fn builder_defaults() {
        let spec = CommandSpec::new("upx");
        assert!(spec.args.is_empty());
        assert!(spec.working_dir.is_none());
        assert_eq!(spec.timeout, DEFAULT_COMMAND_TIMEOUT);
    }

    #[test]
    fn failure_message_prefers_stderr() {
        let out = CommandOutput {
            stdout: "partial\n".into(),
            stderr: "  boom \n".into(),
            exit_code: 2,
            duration_ms: 1,
        };
        assert_eq!(out.failure_message(), "boom");

        let out = CommandOutput {
            stdout: "only stdout\n".into(),
            ..CommandOutput::exited(1)
        };
        assert_eq!(out.failure_message(), "only stdout");
        assert!(!out.success());
        assert!(CommandOutput::exited(0).success());
    }
}
