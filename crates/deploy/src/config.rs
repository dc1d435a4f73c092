use std::path::PathBuf;
use std::time::Duration;

use honestman_core::host_group::{parse_host_list, HostGroup, HostInventory, DEFAULT_HOST};
use honestman_core::ssh::{
    expand_tilde, SshSettings, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_KEY_FILE, DEFAULT_SSH_CONFIG,
};

use crate::builder::BuildSettings;
use crate::error::{DeployError, DeployResult};
use crate::runner::DEFAULT_COMMAND_TIMEOUT;

/// Local image definition uploaded by `buildimage`.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";

/// Deploy configuration loaded from environment variables.
///
/// All fields have defaults matching the production setup, so a bare
/// checkout deploys to the production web host with the shared key.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub inventory: HostInventory,
    /// Group used when the invocation does not select one.
    pub default_group: HostGroup,
    pub ssh: SshSettings,
    pub build: BuildSettings,
    /// Local Dockerfile uploaded by `buildimage`.
    pub dockerfile: PathBuf,
    /// Wall-clock limit for every local or remote command.
    pub command_timeout: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            inventory: HostInventory::default(),
            default_group: HostGroup::default(),
            ssh: SshSettings::default(),
            build: BuildSettings::default(),
            dockerfile: PathBuf::from(DEFAULT_DOCKERFILE),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

impl DeployConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                           | Default                        |
    /// |-----------------------------------|--------------------------------|
    /// | `DEPLOY_HOSTS_WEB`                | `35.203.148.19`                |
    /// | `DEPLOY_HOSTS_UAT`                | `35.203.148.19`                |
    /// | `DEPLOY_HOSTS_ALL`                | web list                       |
    /// | `DEPLOY_DEFAULT_GROUP`            | `web`                          |
    /// | `DEPLOY_SSH_CONFIG`               | `./ssh.config`                 |
    /// | `DEPLOY_SSH_KEY`                  | `~/.ssh/google_compute_engine` |
    /// | `DEPLOY_SSH_USER`                 | unset                          |
    /// | `DEPLOY_FORWARD_AGENT`            | `true`                         |
    /// | `DEPLOY_SSH_CONNECT_TIMEOUT_SECS` | `10`                           |
    /// | `DEPLOY_SOURCE_ROOT`              | `..`                           |
    /// | `DEPLOY_STAGING_DIR`              | `/tmp`                         |
    /// | `DEPLOY_DOCKERFILE`               | `Dockerfile`                   |
    /// | `DEPLOY_COMMAND_TIMEOUT_SECS`     | `600`                          |
    /// | `DEPLOY_GO_BIN`                   | `go`                           |
    /// | `DEPLOY_ESC_BIN`                  | `esc`                          |
    /// | `DEPLOY_UPX_BIN`                  | `upx`                          |
    pub fn from_env() -> DeployResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> DeployResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let web = parse_host_list(&get("DEPLOY_HOSTS_WEB").unwrap_or_else(|| DEFAULT_HOST.into()));
        let uat = parse_host_list(&get("DEPLOY_HOSTS_UAT").unwrap_or_else(|| DEFAULT_HOST.into()));
        let all = get("DEPLOY_HOSTS_ALL").map(|v| parse_host_list(&v));
        let inventory = HostInventory::new(web, uat, all)?;

        let default_group = match get("DEPLOY_DEFAULT_GROUP") {
            Some(v) => v.trim().parse()?,
            None => HostGroup::default(),
        };

        let home = std::env::var("HOME").ok();
        let ssh = SshSettings {
            config_path: Some(PathBuf::from(
                get("DEPLOY_SSH_CONFIG").unwrap_or_else(|| DEFAULT_SSH_CONFIG.into()),
            )),
            key_file: Some(expand_tilde(
                &get("DEPLOY_SSH_KEY").unwrap_or_else(|| DEFAULT_KEY_FILE.into()),
                home.as_deref(),
            )),
            forward_agent: parse_bool("DEPLOY_FORWARD_AGENT", get("DEPLOY_FORWARD_AGENT"), true)?,
            user: get("DEPLOY_SSH_USER"),
            connect_timeout_secs: parse_u64(
                "DEPLOY_SSH_CONNECT_TIMEOUT_SECS",
                get("DEPLOY_SSH_CONNECT_TIMEOUT_SECS"),
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )?,
        };

        let defaults = BuildSettings::default();
        let build = BuildSettings {
            source_root: get("DEPLOY_SOURCE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.source_root),
            staging_dir: get("DEPLOY_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            go_bin: get("DEPLOY_GO_BIN").unwrap_or(defaults.go_bin),
            esc_bin: get("DEPLOY_ESC_BIN").unwrap_or(defaults.esc_bin),
            upx_bin: get("DEPLOY_UPX_BIN").unwrap_or(defaults.upx_bin),
        };

        let dockerfile = get("DEPLOY_DOCKERFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOCKERFILE));

        let timeout_secs = parse_u64(
            "DEPLOY_COMMAND_TIMEOUT_SECS",
            get("DEPLOY_COMMAND_TIMEOUT_SECS"),
            DEFAULT_COMMAND_TIMEOUT.as_secs(),
        )?;
        if timeout_secs == 0 {
            return Err(DeployError::Config(
                "DEPLOY_COMMAND_TIMEOUT_SECS must be greater than zero".into(),
            ));
        }

        Ok(Self {
            inventory,
            default_group,
            ssh,
            build,
            dockerfile,
            command_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_u64(key: &str, value: Option<String>, default: u64) -> DeployResult<u64> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| DeployError::Config(format!("{key} must be a valid u64, got '{v}'"))),
    }
}

fn parse_bool(key: &str, value: Option<String>, default: bool) -> DeployResult<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(DeployError::Config(format!(
                "{key} must be a boolean, got '{v}'"
            ))),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;
    use honestman_core::error::CoreError;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> DeployResult<DeployConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DeployConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).expect("defaults load");
        assert_eq!(config.default_group, HostGroup::Web);
        assert_eq!(
            config.inventory.hosts(HostGroup::Web),
            &[DEFAULT_HOST.to_string()]
        );
        assert!(config.ssh.forward_agent);
        assert_eq!(
            config.ssh.config_path,
            Some(PathBuf::from("./ssh.config"))
        );
        assert_eq!(config.build.source_root, PathBuf::from(".."));
        assert_eq!(config.build.staging_dir, PathBuf::from("/tmp"));
        assert_eq!(config.dockerfile, PathBuf::from("Dockerfile"));
        assert_eq!(config.command_timeout, DEFAULT_COMMAND_TIMEOUT);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("DEPLOY_HOSTS_WEB", "web-1, web-2"),
            ("DEPLOY_HOSTS_UAT", "uat-1"),
            ("DEPLOY_DEFAULT_GROUP", "uat"),
            ("DEPLOY_FORWARD_AGENT", "no"),
            ("DEPLOY_SSH_USER", "deploy"),
            ("DEPLOY_SSH_KEY", "/keys/id"),
            ("DEPLOY_GO_BIN", "/usr/local/go/bin/go"),
            ("DEPLOY_COMMAND_TIMEOUT_SECS", "30"),
        ])
        .expect("config loads");
        assert_eq!(config.inventory.hosts(HostGroup::All).len(), 2);
        assert_eq!(config.default_group, HostGroup::Uat);
        assert!(!config.ssh.forward_agent);
        assert_eq!(config.ssh.user.as_deref(), Some("deploy"));
        assert_eq!(config.ssh.key_file, Some(PathBuf::from("/keys/id")));
        assert_eq!(config.build.go_bin, "/usr/local/go/bin/go");
        assert_eq!(config.command_timeout, Duration::from_secs(30));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[("DEPLOY_HOSTS_WEB", "  "), ("DEPLOY_UPX_BIN", "")])
            .expect("config loads");
        assert_eq!(
            config.inventory.hosts(HostGroup::Web),
            &[DEFAULT_HOST.to_string()]
        );
        assert_eq!(config.build.upx_bin, "upx");
    }

    #[test]
    fn invalid_values_are_config_errors() {
        assert_matches!(
            load(&[("DEPLOY_COMMAND_TIMEOUT_SECS", "soon")]),
            Err(DeployError::Config(_))
        );
        assert_matches!(
            load(&[("DEPLOY_COMMAND_TIMEOUT_SECS", "0")]),
            Err(DeployError::Config(_))
        );
        assert_matches!(
            load(&[("DEPLOY_FORWARD_AGENT", "maybe")]),
            Err(DeployError::Config(_))
        );
        assert_matches!(
            load(&[("DEPLOY_DEFAULT_GROUP", "staging")]),
            Err(DeployError::Core(CoreError::UnknownHostGroup(_)))
        );
        assert_matches!(
            load(&[("DEPLOY_HOSTS_UAT", "uat-1;reboot")]),
            Err(DeployError::Core(CoreError::Validation(_)))
        );
    }
}
