//! Remote command execution over `ssh`.
//!
//! Commands run on every host of the context's group, one host at a time,
//! in inventory order. The first host that fails aborts the operation and
//! later hosts are not contacted.

use honestman_core::shell::privileged;
use honestman_core::ssh::SSH_CONNECTION_FAILURE_EXIT;
use honestman_core::target::Target;

use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// Output of a command on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutput {
    pub host: String,
    pub output: CommandOutput,
}

/// Receives each host's output as soon as its command finishes, before
/// the exit status is classified. A failing host is reported too.
pub trait OutputSink: Send + Sync {
    fn host_output(&self, host: &str, output: &CommandOutput);
}

pub struct RemoteExecutor<'a, R> {
    ctx: &'a DeployContext,
    runner: &'a R,
    sink: Option<&'a dyn OutputSink>,
}

impl<'a, R: CommandRunner> RemoteExecutor<'a, R> {
    pub fn new(ctx: &'a DeployContext, runner: &'a R) -> Self {
        Self {
            ctx,
            runner,
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Option<&'a dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    fn ssh_spec(&self, host: &str, command: &str) -> CommandSpec {
        CommandSpec::new("ssh")
            .args(self.ctx.ssh.ssh_args(host, command))
            .timeout(self.ctx.command_timeout)
    }

    /// Run `command` on a single host. Exit status 255 is reported as a
    /// connection failure, any other non-zero status as a command failure.
    pub async fn run_on(&self, host: &str, command: &str) -> DeployResult<CommandOutput> {
        tracing::debug!(host, command, "Running remote command");
        let output = self.runner.run(&self.ssh_spec(host, command)).await?;
        if let Some(sink) = self.sink {
            sink.host_output(host, &output);
        }
        match output.exit_code {
            0 => Ok(output),
            SSH_CONNECTION_FAILURE_EXIT => {
                tracing::error!(host, "SSH connection failed");
                Err(DeployError::RemoteConnectionFailed {
                    host: host.to_string(),
                    message: output.failure_message(),
                })
            }
            exit_code => {
                tracing::error!(host, command, exit_code, "Remote command failed");
                Err(DeployError::RemoteCommandFailed {
                    host: host.to_string(),
                    command: command.to_string(),
                    exit_code,
                    stderr: output.failure_message(),
                })
            }
        }
    }

    /// Evaluate a test command (e.g. `test -d /x`) on a host: `Ok(true)` on
    /// exit 0, `Ok(false)` on any other exit except a lost connection.
    pub async fn probe(&self, host: &str, command: &str) -> DeployResult<bool> {
        let output = self.runner.run(&self.ssh_spec(host, command)).await?;
        match output.exit_code {
            0 => Ok(true),
            SSH_CONNECTION_FAILURE_EXIT => Err(DeployError::RemoteConnectionFailed {
                host: host.to_string(),
                message: output.failure_message(),
            }),
            _ => Ok(false),
        }
    }

    /// Run `command` unprivileged on every host of the group.
    pub async fn run(&self, command: &str) -> DeployResult<Vec<HostOutput>> {
        self.run_everywhere(command).await
    }

    /// Run `command` through `sudo` on every host of the group.
    pub async fn run_privileged(&self, command: &str) -> DeployResult<Vec<HostOutput>> {
        self.run_everywhere(&privileged(command)).await
    }

    async fn run_everywhere(&self, command: &str) -> DeployResult<Vec<HostOutput>> {
        let mut outputs = Vec::with_capacity(self.ctx.hosts.len());
        for host in &self.ctx.hosts {
            let output = self.run_on(host, command).await?;
            tracing::info!(
                host = %host,
                group = %self.ctx.group,
                elapsed_ms = output.duration_ms,
                "Remote command succeeded",
            );
            outputs.push(HostOutput {
                host: host.clone(),
                output,
            });
        }
        Ok(outputs)
    }

    /// `docker <subcommand>` with elevated privileges on every host.
    pub async fn container_command(&self, subcommand: &str) -> DeployResult<Vec<HostOutput>> {
        self.run_privileged(&format!("docker {subcommand}")).await
    }

    /// Restart the containers of `target` (see [`Target::restart_containers`]).
    pub async fn restart(&self, target: Target) -> DeployResult<Vec<HostOutput>> {
        let mut outputs = Vec::new();
        for deployable in target.restart_containers() {
            let name = deployable.container_name();
            tracing::info!(container = name, "Restarting container");
            outputs.extend(self.container_command(&format!("restart {name}")).await?);
        }
        Ok(outputs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
