//! Local build of deployable binaries.
//!
//! A build is a fixed sequence of local commands, run in order, each of
//! which must succeed before the next starts:
//!
//! 1. asset embedding (`esc`), api only,
//! 2. cross-compilation (`go build`) for linux/amd64,
//! 3. in-place compression (`upx`).
//!
//! The result is an [`Artifact`] at the deployable's staging path.

use std::path::PathBuf;

use honestman_core::deployable::{Deployable, LOCAL_STAGING_DIR, TARGET_ARCH, TARGET_OS};

use crate::context::DeployContext;
use crate::error::{DeployError, DeployResult};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec};

/// Where the sources live and which toolchain binaries to call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Directory containing the `crawler/` and `api/` Go packages.
    pub source_root: PathBuf,
    /// Local directory the compressed binaries are written to.
    pub staging_dir: PathBuf,
    pub go_bin: String,
    pub esc_bin: String,
    pub upx_bin: String,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from(".."),
            staging_dir: PathBuf::from(LOCAL_STAGING_DIR),
            go_bin: "go".to_string(),
            esc_bin: "esc".to_string(),
            upx_bin: "upx".to_string(),
        }
    }
}

/// A compressed binary ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub deployable: Deployable,
    pub path: PathBuf,
}

impl Artifact {
    /// The artifact a build leaves in the staging directory.
    pub fn staged(deployable: Deployable, settings: &BuildSettings) -> Self {
        Self {
            deployable,
            path: deployable.staging_path_in(&settings.staging_dir),
        }
    }
}

pub struct Builder<'a, R> {
    ctx: &'a DeployContext,
    runner: &'a R,
}

impl<'a, R: CommandRunner> Builder<'a, R> {
    pub fn new(ctx: &'a DeployContext, runner: &'a R) -> Self {
        Self { ctx, runner }
    }

    /// The commands `build` runs for `deployable`, in order.
    pub fn steps(&self, deployable: Deployable) -> Vec<CommandSpec> {
        let settings = &self.ctx.build;
        let source_dir = settings.source_root.join(deployable.source_dir());
        let staging = Artifact::staged(deployable, settings)
            .path
            .to_string_lossy()
            .into_owned();
        let mut steps = Vec::with_capacity(3);

        if let Some(embed) = deployable.asset_embed() {
            steps.push(
                CommandSpec::new(&settings.esc_bin)
                    .args(["-o", embed.output_file, embed.asset_dir])
                    .current_dir(&source_dir)
                    .timeout(self.ctx.command_timeout),
            );
        }

        steps.push(
            CommandSpec::new(&settings.go_bin)
                .args(["build", "-o", staging.as_str()])
                .env("GOOS", TARGET_OS)
                .env("GOARCH", TARGET_ARCH)
                .current_dir(&source_dir)
                .timeout(self.ctx.command_timeout),
        );

        steps.push(
            CommandSpec::new(&settings.upx_bin)
                .arg(staging)
                .timeout(self.ctx.command_timeout),
        );

        steps
    }

    /// Build one deployable. The first failing step aborts the build.
    pub async fn build(&self, deployable: Deployable) -> DeployResult<Artifact> {
        tracing::info!(%deployable, os = TARGET_OS, arch = TARGET_ARCH, "Building");
        for spec in self.steps(deployable) {
            run_local(self.runner, &spec).await?;
        }
        let artifact = Artifact::staged(deployable, &self.ctx.build);
        tracing::info!(%deployable, path = %artifact.path.display(), "Build complete");
        Ok(artifact)
    }
}

/// Run a local command, turning a non-zero exit into `LocalCommandFailed`.
async fn run_local<R: CommandRunner>(runner: &R, spec: &CommandSpec) -> DeployResult<CommandOutput> {
    let output = runner.run(spec).await?;
    if !output.success() {
        tracing::error!(
            command = %spec.display(),
            exit_code = output.exit_code,
            "Local command failed",
        );
        return Err(DeployError::LocalCommandFailed {
            command: spec.display(),
            exit_code: output.exit_code,
            stderr: output.failure_message(),
        });
    }
    tracing::debug!(
        command = %spec.display(),
        elapsed_ms = output.duration_ms,
        "Local command finished",
    );
    Ok(output)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::DeployConfig;
    use crate::runner::recording::RecordingRunner;

    fn ctx() -> DeployContext {
        DeployContext::new(&DeployConfig::default(), None)
    }

    #[test]
    fn api_steps_embed_then_compile_then_compress() {
        let ctx = ctx();
        let runner = RecordingRunner::new();
        let steps = Builder::new(&ctx, &runner).steps(Deployable::Api);
        let rendered: Vec<String> = steps.iter().map(CommandSpec::display).collect();
        assert_eq!(
            rendered,
            vec![
                "esc -o static.go static",
                "GOOS=linux GOARCH=amd64 go build -o /tmp/api",
                "upx /tmp/api",
            ]
        );
        assert_eq!(steps[0].working_dir, Some(PathBuf::from("../api")));
        assert_eq!(steps[1].working_dir, Some(PathBuf::from("../api")));
    }

    #[test]
    fn crawler_steps_skip_embedding() {
        let ctx = ctx();
        let runner = RecordingRunner::new();
        let steps = Builder::new(&ctx, &runner).steps(Deployable::Crawler);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].program, "go");
        assert_eq!(steps[0].working_dir, Some(PathBuf::from("../crawler")));
        assert_eq!(steps[1].display(), "upx /tmp/crawler");
    }

    #[tokio::test]
    async fn failed_compile_skips_compression() {
        let ctx = ctx();
        let runner = RecordingRunner::new().fail_when("go build", 2, "undefined: Foo");
        let result = Builder::new(&ctx, &runner).build(Deployable::Crawler).await;
        assert_matches!(
            result,
            Err(DeployError::LocalCommandFailed { exit_code: 2, ref stderr, .. }) if stderr == "undefined: Foo"
        );
        assert_eq!(runner.count_matching("upx"), 0);
    }

    #[tokio::test]
    async fn failed_embedding_skips_compile() {
        let ctx = ctx();
        let runner = RecordingRunner::new().missing_program("esc");
        let result = Builder::new(&ctx, &runner).build(Deployable::Api).await;
        assert_matches!(result, Err(DeployError::Spawn { .. }));
        assert_eq!(runner.commands().len(), 1);
    }

    #[tokio::test]
    async fn successful_build_returns_staged_artifact() {
        let ctx = ctx();
        let runner = RecordingRunner::new();
        let artifact = Builder::new(&ctx, &runner)
            .build(Deployable::Api)
            .await
            .expect("build");
        assert_eq!(artifact, Artifact::staged(Deployable::Api, &ctx.build));
        assert_eq!(artifact.path, PathBuf::from("/tmp/api"));
    }
}
