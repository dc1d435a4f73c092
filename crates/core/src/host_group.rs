//! Host groups and the static inventory that maps them to addresses.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::shell::validate_host;

/// Address used for both the production and UAT groups out of the box.
pub const DEFAULT_HOST: &str = "35.203.148.19";

/// Named set of remote machines an invocation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostGroup {
    /// Production web hosts; used when no group is selected.
    #[default]
    Web,
    Uat,
    /// Every production host (`prd` is accepted as an alias).
    All,
}

impl HostGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Uat => "uat",
            Self::All => "all",
        }
    }
}

impl FromStr for HostGroup {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "uat" => Ok(Self::Uat),
            "all" | "prd" => Ok(Self::All),
            other => Err(CoreError::UnknownHostGroup(other.to_string())),
        }
    }
}

impl fmt::Display for HostGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// HostInventory
// ---------------------------------------------------------------------------

/// Address lists for every [`HostGroup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInventory {
    web: Vec<String>,
    uat: Vec<String>,
    all: Vec<String>,
}

impl Default for HostInventory {
    fn default() -> Self {
        let web = vec![DEFAULT_HOST.to_string()];
        Self {
            uat: web.clone(),
            all: web.clone(),
            web,
        }
    }
}

impl HostInventory {
    /// Build an inventory, validating every address.
    ///
    /// `all` defaults to the `web` list when `None`, mirroring how the
    /// combined group has always been defined.
    pub fn new(
        web: Vec<String>,
        uat: Vec<String>,
        all: Option<Vec<String>>,
    ) -> Result<Self, CoreError> {
        let all = all.unwrap_or_else(|| web.clone());
        for (group, hosts) in [("web", &web), ("uat", &uat), ("all", &all)] {
            if hosts.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Host group '{group}' must contain at least one host"
                )));
            }
            for host in hosts {
                validate_host(host)?;
            }
        }
        Ok(Self { web, uat, all })
    }

    pub fn hosts(&self, group: HostGroup) -> &[String] {
        match group {
            HostGroup::Web => &self.web,
            HostGroup::Uat => &self.uat,
            HostGroup::All => &self.all,
        }
    }
}

/// Split a comma-separated host list, trimming blanks.
pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
