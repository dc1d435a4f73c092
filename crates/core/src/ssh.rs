//! SSH connection settings and `ssh`/`scp` argument building.
//!
//! [`SshSettings`] is read once at start-up and shared by every remote
//! operation of an invocation. It only builds argument vectors; spawning
//! the client is the caller's job.

use std::path::{Path, PathBuf};

/// Exit status `ssh` reports when the connection itself failed
/// (unreachable host, authentication failure), as opposed to the remote
/// command exiting non-zero.
pub const SSH_CONNECTION_FAILURE_EXIT: i32 = 255;

/// Default client config, relative to the working directory.
pub const DEFAULT_SSH_CONFIG: &str = "./ssh.config";

/// Default private key.
pub const DEFAULT_KEY_FILE: &str = "~/.ssh/google_compute_engine";

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Process-wide connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    /// Client configuration file passed with `-F`.
    pub config_path: Option<PathBuf>,
    /// Private key passed with `-i`.
    pub key_file: Option<PathBuf>,
    /// Forward the local agent so hosts can reach private repositories.
    pub forward_agent: bool,
    /// Login user, prepended to hosts that do not carry one already.
    pub user: Option<String>,
    pub connect_timeout_secs: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            config_path: Some(PathBuf::from(DEFAULT_SSH_CONFIG)),
            key_file: Some(PathBuf::from(DEFAULT_KEY_FILE)),
            forward_agent: true,
            user: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl SshSettings {
    /// `user@host`, or the host unchanged when no user is configured or
    /// the host already names one.
    pub fn destination(&self, host: &str) -> String {
        match &self.user {
            Some(user) if !host.contains('@') => format!("{user}@{host}"),
            _ => host.to_string(),
        }
    }

    /// Options shared by `ssh` and `scp`.
    fn common_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(config) = &self.config_path {
            args.push("-F".to_string());
            args.push(config.to_string_lossy().into_owned());
        }
        if let Some(key) = &self.key_file {
            args.push("-i".to_string());
            args.push(key.to_string_lossy().into_owned());
        }
        args.push("-o".to_string());
        args.push("BatchMode=yes".to_string());
        args.push("-o".to_string());
        args.push(format!("ConnectTimeout={}", self.connect_timeout_secs));
        if self.forward_agent {
            args.push("-o".to_string());
            args.push("ForwardAgent=yes".to_string());
        }
        args
    }

    /// Arguments for `ssh` running `remote_command` on `host`.
    pub fn ssh_args(&self, host: &str, remote_command: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push(self.destination(host));
        args.push(remote_command.to_string());
        args
    }

    /// Arguments for `scp` copying `local` to `remote_path` on `host`.
    pub fn scp_args(&self, host: &str, local: &Path, remote_path: &str) -> Vec<String> {
        let mut args = self.common_args();
        args.push("-q".to_string());
        args.push(local.to_string_lossy().into_owned());
        args.push(format!("{}:{remote_path}", scp_host(&self.destination(host))));
        args
    }
}

/// Bracket IPv6 literals so scp does not read the address colons as the
/// path separator.
fn scp_host(destination: &str) -> String {
    let (user, host) = match destination.split_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, destination),
    };
    let host = if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    };
    match user {
        Some(user) => format!("{user}@{host}"),
        None => host,
    }
}

/// Expand a leading `~/` against `home`. Paths without the prefix, or
/// with no home available, are returned unchanged.
pub fn expand_tilde(path: &str, home: Option<&str>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => Path::new(home).join(rest),
        _ => PathBuf::from(path),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
