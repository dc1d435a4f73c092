//! File transfer to remote hosts over `scp`.
//!
//! Directory creation and stale-file removal are idempotent: both probe
//! the remote filesystem first and only act when needed, so re-running an
//! upload against a half-provisioned host is safe.

use std::path::Path;

use honestman_core::deployable::BINARY_MODE;
use honestman_core::shell::{privileged, shell_escape};

use crate::builder::Artifact;
use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::remote::RemoteExecutor;
use crate::runner::{CommandRunner, CommandSpec};

/// Remote directory `scp` writes to before a privileged install moves the
/// file into place. `scp` itself never runs as root.
pub const REMOTE_UPLOAD_STAGING_DIR: &str = "/tmp";

pub struct Transport<'a, R> {
    ctx: &'a DeployContext,
    runner: &'a R,
    remote: RemoteExecutor<'a, R>,
}

impl<'a, R: CommandRunner> Transport<'a, R> {
    pub fn new(ctx: &'a DeployContext, runner: &'a R) -> Self {
        Self {
            ctx,
            runner,
            remote: RemoteExecutor::new(ctx, runner),
        }
    }

    /// Create `dir` (and parents) on `host` unless it already exists.
    /// Returns `true` when the directory had to be created.
    pub async fn ensure_dir(&self, host: &str, dir: &str) -> DeployResult<bool> {
        let escaped = shell_escape(dir);
        if self.remote.probe(host, &format!("test -d {escaped}")).await? {
            tracing::debug!(host, dir, "Remote directory already exists");
            return Ok(false);
        }
        self.remote
            .run_on(host, &privileged(&format!("mkdir -p {escaped}")))
            .await?;
        tracing::info!(host, dir, "Created remote directory");
        Ok(true)
    }

    /// Delete `path` on `host` if present. Returns `true` when a file was
    /// removed.
    pub async fn remove_if_exists(&self, host: &str, path: &str) -> DeployResult<bool> {
        let escaped = shell_escape(path);
        if !self.remote.probe(host, &format!("test -e {escaped}")).await? {
            return Ok(false);
        }
        self.remote
            .run_on(host, &privileged(&format!("rm -f {escaped}")))
            .await?;
        tracing::info!(host, path, "Removed stale remote file");
        Ok(true)
    }

    /// Copy `local` to `remote_path` on `host` and set `mode` on it.
    ///
    /// With `use_sudo` the file is first copied to
    /// [`REMOTE_UPLOAD_STAGING_DIR`] and then installed with elevated
    /// privileges, so the destination may be owned by root.
    pub async fn put(
        &self,
        host: &str,
        local: &Path,
        remote_path: &str,
        mode: &str,
        use_sudo: bool,
    ) -> DeployResult<()> {
        if !use_sudo {
            self.copy(host, local, remote_path).await?;
            self.remote
                .run_on(host, &format!("chmod {mode} {}", shell_escape(remote_path)))
                .await?;
            return Ok(());
        }

        let staged = staged_upload_path(remote_path);
        self.copy(host, local, &staged).await?;
        let install = format!(
            "install -m {mode} {staged} {dest} && rm -f {staged}",
            staged = shell_escape(&staged),
            dest = shell_escape(remote_path),
        );
        self.remote.run_on(host, &privileged(&install)).await?;
        Ok(())
    }

    async fn copy(&self, host: &str, local: &Path, remote_path: &str) -> DeployResult<()> {
        let spec = CommandSpec::new("scp")
            .args(self.ctx.ssh.scp_args(host, local, remote_path))
            .timeout(self.ctx.command_timeout);
        let output = self.runner.run(&spec).await?;
        if !output.success() {
            tracing::error!(
                host,
                local = %local.display(),
                remote = remote_path,
                exit_code = output.exit_code,
                "Transfer failed",
            );
            return Err(DeployError::TransferFailed {
                host: host.to_string(),
                local: local.to_path_buf(),
                remote: remote_path.to_string(),
                message: output.failure_message(),
            });
        }
        tracing::debug!(host, remote = remote_path, elapsed_ms = output.duration_ms, "Copied");
        Ok(())
    }

    /// Install `artifact` on every host of the group: ensure its remote
    /// directories, then put the binary in place as root with mode 0755.
    pub async fn upload_artifact(&self, artifact: &Artifact) -> DeployResult<()> {
        let deployable = artifact.deployable;
        let dest = deployable.remote_binary_path();
        for host in &self.ctx.hosts {
            for dir in deployable.remote_dirs() {
                self.ensure_dir(host, &dir).await?;
            }
            self.put(host, &artifact.path, &dest, BINARY_MODE, true).await?;
            tracing::info!(host = %host, %deployable, remote = %dest, "Uploaded");
        }
        Ok(())
    }
}

/// `/usr/src/app/api/goapp` stages as `/tmp/honestman-upload_usr_src_app_api_goapp`.
fn staged_upload_path(remote_path: &str) -> String {
    format!(
        "{REMOTE_UPLOAD_STAGING_DIR}/honestman-upload{}",
        remote_path.replace('/', "_")
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
