//! Runner for `--dry-run`: logs each command instead of running it.

use super::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::DeployResult;

/// Reports every command as a success without spawning anything.
///
/// Existence probes (`test -d`) therefore always succeed, so a dry run
/// never shows the `mkdir` a real run might need.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    async fn run(&self, spec: &CommandSpec) -> DeployResult<CommandOutput> {
        tracing::info!(command = %spec.display(), "[dry-run] would run");
        Ok(CommandOutput::exited(0))
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_succeeds() {
        let spec = CommandSpec::new("false");
        let out = DryRunRunner.run(&spec).await.expect("run");
        assert!(out.success());
        assert!(out.stdout.is_empty());
        assert!(DryRunRunner.is_dry_run());
    }
}
