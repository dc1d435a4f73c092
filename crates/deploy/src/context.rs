//! Per-invocation deploy context.
//!
//! The host group is chosen once, when the context is built, and every
//! operation receives the context by reference. Nothing downstream can
//! switch hosts half way through an invocation.

use std::path::PathBuf;
use std::time::Duration;

use honestman_core::host_group::HostGroup;
use honestman_core::ssh::SshSettings;

use crate::builder::BuildSettings;
use crate::config::DeployConfig;

#[derive(Debug, Clone)]
pub struct DeployContext {
    pub group: HostGroup,
    /// Addresses of `group`, in the order operations visit them.
    pub hosts: Vec<String>,
    pub ssh: SshSettings,
    pub build: BuildSettings,
    pub dockerfile: PathBuf,
    pub command_timeout: Duration,
}

impl DeployContext {
    /// Resolve `group` (or the configured default) against the inventory.
    pub fn new(config: &DeployConfig, group: Option<HostGroup>) -> Self {
        let group = group.unwrap_or(config.default_group);
        Self {
            group,
            hosts: config.inventory.hosts(group).to_vec(),
            ssh: config.ssh.clone(),
            build: config.build.clone(),
            dockerfile: config.dockerfile.clone(),
            command_timeout: config.command_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use honestman_core::host_group::HostInventory;

    use super::*;

    #[test]
    fn explicit_group_overrides_default() {
        let config = DeployConfig {
            inventory: HostInventory::new(
                vec!["web-1".into()],
                vec!["uat-1".into(), "uat-2".into()],
                None,
            )
            .unwrap(),
            ..DeployConfig::default()
        };

        let ctx = DeployContext::new(&config, None);
        assert_eq!(ctx.group, HostGroup::Web);
        assert_eq!(ctx.hosts, vec!["web-1".to_string()]);

        let ctx = DeployContext::new(&config, Some(HostGroup::Uat));
        assert_eq!(ctx.group, HostGroup::Uat);
        assert_eq!(ctx.hosts, vec!["uat-1".to_string(), "uat-2".to_string()]);
    }
}
