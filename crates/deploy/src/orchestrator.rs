//! Named deploy operations.
//!
//! Every operation is a strictly ordered pipeline
//! `Resolve -> Build* -> Upload* -> [Restart]`. Each step runs at most once;
//! the first failure ends the operation and is returned unchanged. Nothing
//! is rolled back: deployables uploaded before the failure keep their new
//! binary, and running containers keep the old one until restarted.

use std::path::Path;

use honestman_core::shell::privileged;
use honestman_core::target::Target;

use crate::builder::{Artifact, Builder};
use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::remote::{HostOutput, OutputSink, RemoteExecutor};
use crate::runner::CommandRunner;
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Image provisioning constants
// ---------------------------------------------------------------------------

/// Remote directory the image is built in.
pub const IMAGE_BUILD_DIR: &str = "/tmp/";

/// Remote location of the uploaded Dockerfile.
pub const REMOTE_DOCKERFILE: &str = "/tmp/Dockerfile";

/// Mode applied to the uploaded Dockerfile.
pub const DOCKERFILE_MODE: &str = "0644";

/// Tag of the image every deployable's container runs.
pub const IMAGE_TAG: &str = "goapp";

/// One resolved invocation, with its target already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Build(Target),
    Upload(Target),
    Deploy(Target),
    RestartCycle(Target),
    Uptime,
    Docker(String),
    Run(String),
    ProvisionImage,
}

/// Drives the builder, transport and remote executor for one invocation.
pub struct Orchestrator<'a, R> {
    ctx: &'a DeployContext,
    runner: &'a R,
    sink: Option<&'a dyn OutputSink>,
}

impl<'a, R: CommandRunner> Orchestrator<'a, R> {
    pub fn new(ctx: &'a DeployContext, runner: &'a R) -> Self {
        Self {
            ctx,
            runner,
            sink: None,
        }
    }

    /// Stream the output of user-facing remote commands (`run`, `docker`,
    /// `uptime`, restarts, image builds) to `sink` as each host finishes.
    pub fn with_sink(mut self, sink: &'a dyn OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    fn remote(&self) -> RemoteExecutor<'a, R> {
        RemoteExecutor::new(self.ctx, self.runner).with_sink(self.sink)
    }

    /// Run `operation`, returning the remote output of each host it
    /// produced (empty for build, upload and deploy).
    pub async fn execute(&self, operation: &Operation) -> DeployResult<Vec<HostOutput>> {
        match operation {
            Operation::Build(target) => self.build(*target).await.map(|_| Vec::new()),
            Operation::Upload(target) => self.upload(*target).await.map(|()| Vec::new()),
            Operation::Deploy(target) => self.deploy(*target).await.map(|()| Vec::new()),
            Operation::RestartCycle(target) => self.restart_cycle(*target).await,
            Operation::Uptime => self.uptime().await,
            Operation::Docker(command) => self.docker(command).await,
            Operation::Run(command) => self.run(command).await,
            Operation::ProvisionImage => self.provision_image().await,
        }
    }

    /// Build every deployable of `target`, in order.
    pub async fn build(&self, target: Target) -> DeployResult<Vec<Artifact>> {
        let builder = Builder::new(self.ctx, self.runner);
        let mut artifacts = Vec::with_capacity(target.deployables().len());
        for &deployable in target.deployables() {
            artifacts.push(builder.build(deployable).await?);
        }
        Ok(artifacts)
    }

    /// Upload the last build of every deployable of `target`.
    ///
    /// All artifacts are checked before the first transfer, so a missing
    /// build leaves every host untouched.
    pub async fn upload(&self, target: Target) -> DeployResult<()> {
        let artifacts: Vec<Artifact> = target
            .deployables()
            .iter()
            .map(|&d| Artifact::staged(d, &self.ctx.build))
            .collect();
        for artifact in &artifacts {
            self.check_artifact(&artifact.path).await?;
        }
        self.upload_artifacts(&artifacts).await
    }

    async fn check_artifact(&self, path: &Path) -> DeployResult<()> {
        if self.runner.is_dry_run() {
            return Ok(());
        }
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(DeployError::ArtifactMissing(path.to_path_buf())),
        }
    }

    async fn upload_artifacts(&self, artifacts: &[Artifact]) -> DeployResult<()> {
        let transport = Transport::new(self.ctx, self.runner);
        for artifact in artifacts {
            transport.upload_artifact(artifact).await?;
        }
        Ok(())
    }

    /// Build then upload `target`. No transfer starts unless every build
    /// succeeded.
    pub async fn deploy(&self, target: Target) -> DeployResult<()> {
        tracing::info!(deploy_target = %target, group = %self.ctx.group, "Deploying");
        let artifacts = self.build(target).await?;
        self.upload_artifacts(&artifacts).await?;
        tracing::info!(deploy_target = %target, hosts = self.ctx.hosts.len(), "Deploy complete");
        Ok(())
    }

    /// Deploy `target` and restart its containers.
    pub async fn restart_cycle(&self, target: Target) -> DeployResult<Vec<HostOutput>> {
        self.deploy(target).await?;
        self.remote().restart(target).await
    }

    pub async fn uptime(&self) -> DeployResult<Vec<HostOutput>> {
        self.remote().run("uptime").await
    }

    /// `sudo docker <command>` on every host.
    pub async fn docker(&self, command: &str) -> DeployResult<Vec<HostOutput>> {
        self.remote().container_command(command).await
    }

    /// Arbitrary privileged command on every host.
    pub async fn run(&self, command: &str) -> DeployResult<Vec<HostOutput>> {
        self.remote().run_privileged(command).await
    }

    /// Stage the local Dockerfile on every host and build [`IMAGE_TAG`]
    /// from it.
    pub async fn provision_image(&self) -> DeployResult<Vec<HostOutput>> {
        self.check_artifact(&self.ctx.dockerfile).await?;
        let transport = Transport::new(self.ctx, self.runner);
        let remote = self.remote();
        let build = privileged(&format!(
            "cd {IMAGE_BUILD_DIR} && docker build -t {IMAGE_TAG} ."
        ));

        let mut outputs = Vec::with_capacity(self.ctx.hosts.len());
        for host in &self.ctx.hosts {
            transport.remove_if_exists(host, REMOTE_DOCKERFILE).await?;
            transport
                .put(host, &self.ctx.dockerfile, REMOTE_DOCKERFILE, DOCKERFILE_MODE, true)
                .await?;
            tracing::info!(host = %host, tag = IMAGE_TAG, "Building image");
            let output = remote.run_on(host, &build).await?;
            outputs.push(HostOutput {
                host: host.clone(),
                output,
            });
        }
        Ok(outputs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use honestman_core::host_group::{HostGroup, HostInventory};

    use super::*;
    use crate::config::DeployConfig;
    use crate::runner::recording::RecordingRunner;
    use crate::runner::CommandOutput;

    fn ctx(staging: &Path) -> DeployContext {
        let mut config = DeployConfig {
            inventory: HostInventory::new(vec!["web-1".into()], vec!["uat-1".into()], None)
                .unwrap(),
            ..DeployConfig::default()
        };
        config.build.staging_dir = staging.to_path_buf();
        config.dockerfile = staging.join("Dockerfile");
        DeployContext::new(&config, Some(HostGroup::Web))
    }

    #[tokio::test]
    async fn upload_without_build_is_rejected_before_any_transfer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("crawler"), b"bin").unwrap();
        let ctx = ctx(dir.path());
        let runner = RecordingRunner::new();

        let result = Orchestrator::new(&ctx, &runner).upload(Target::All).await;
        assert_matches!(result, Err(DeployError::ArtifactMissing(ref p)) if p.ends_with("api"));
        assert!(runner.commands().is_empty());
    }

    #[tokio::test]
    async fn upload_resends_existing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("api"), b"bin").unwrap();
        let ctx = ctx(dir.path());
        let runner = RecordingRunner::new();

        Orchestrator::new(&ctx, &runner)
            .upload(Target::Api)
            .await
            .expect("upload");
        assert_eq!(runner.count_matching("go build"), 0);
        assert_eq!(runner.count_matching("scp "), 1);
    }

    #[tokio::test]
    async fn provision_image_replaces_stale_dockerfile_then_builds() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), b"FROM scratch\n").unwrap();
        let ctx = ctx(dir.path());
        let runner = RecordingRunner::new();

        let outputs = Orchestrator::new(&ctx, &runner)
            .provision_image()
            .await
            .expect("provision");
        assert_eq!(outputs.len(), 1);

        let removed = runner.position("rm -f /tmp/Dockerfile").unwrap();
        let copied = runner.position("scp ").unwrap();
        let installed = runner.position("install -m 0644").unwrap();
        let built = runner.position("docker build -t goapp .").unwrap();
        assert!(removed < copied && copied < installed && installed < built);
        assert_eq!(runner.commands()[built].matches("cd /tmp/ &&").count(), 1);
    }

    #[tokio::test]
    async fn provision_image_skips_removal_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), b"FROM scratch\n").unwrap();
        let ctx = ctx(dir.path());
        let runner =
            RecordingRunner::new().respond_once("test -e /tmp/Dockerfile", CommandOutput::exited(1));

        Orchestrator::new(&ctx, &runner)
            .provision_image()
            .await
            .expect("provision");
        assert_eq!(runner.count_matching("rm -f /tmp/Dockerfile'"), 0);
        assert_eq!(runner.count_matching("docker build"), 1);
    }

    #[tokio::test]
    async fn image_build_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), b"FROM scratch\n").unwrap();
        let ctx = ctx(dir.path());
        let runner = RecordingRunner::new().fail_when("docker build", 1, "no space left");

        let result = Orchestrator::new(&ctx, &runner).provision_image().await;
        assert_matches!(result, Err(DeployError::RemoteCommandFailed { exit_code: 1, .. }));
    }

    #[tokio::test]
    async fn uptime_is_unprivileged() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let runner = RecordingRunner::new();
        Orchestrator::new(&ctx, &runner).uptime().await.expect("uptime");
        let spec = &runner.specs()[0];
        assert_eq!(spec.args.last().unwrap(), "uptime");
    }
}
