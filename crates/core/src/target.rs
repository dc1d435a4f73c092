//! Target selection.
//!
//! A [`Target`] names which deployable unit(s) an operation applies to.
//! It is parsed once at the edge, before any command runs, so an unknown
//! target never causes a side effect.

use std::fmt;
use std::str::FromStr;

use crate::deployable::Deployable;
use crate::error::CoreError;

/// Which deployables an operation acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    /// Every known deployable, in [`Deployable::ALL`] order.
    #[default]
    All,
    Crawler,
    Api,
}

impl Target {
    /// Parse an optional target argument. A missing or empty value means
    /// [`Target::All`].
    pub fn parse(value: Option<&str>) -> Result<Self, CoreError> {
        match value {
            None => Ok(Self::All),
            Some(s) => s.parse(),
        }
    }

    /// The deployables this target resolves to, in deterministic order.
    pub fn deployables(self) -> &'static [Deployable] {
        match self {
            Self::All => &Deployable::ALL,
            Self::Crawler => &[Deployable::Crawler],
            Self::Api => &[Deployable::Api],
        }
    }

    /// Containers restarted by a restart cycle for this target.
    ///
    /// Restarting `All` only bounces the crawler container; the api
    /// container keeps running its previous binary until restarted
    /// explicitly with `cool api`.
    pub fn restart_containers(self) -> &'static [Deployable] {
        match self {
            Self::All | Self::Crawler => &[Deployable::Crawler],
            Self::Api => &[Deployable::Api],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "",
            Self::Crawler => "crawler",
            Self::Api => "api",
        }
    }
}

impl FromStr for Target {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::All),
            "crawler" => Ok(Self::Crawler),
            "api" => Ok(Self::Api),
            other => Err(CoreError::InvalidTarget(other.to_string())),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            other => f.write_str(other.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
