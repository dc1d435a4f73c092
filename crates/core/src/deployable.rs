//! Deployable units and their build/install recipes.
//!
//! Two programs ship from this repository: the `crawler` daemon and the
//! `api` server. Both are cross-compiled for [`TARGET_OS`]/[`TARGET_ARCH`],
//! staged under `/tmp`, and installed as [`REMOTE_BINARY_NAME`] inside
//! their own directory below [`REMOTE_APP_ROOT`].

use std::fmt;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// `GOOS` used for every build.
pub const TARGET_OS: &str = "linux";

/// `GOARCH` used for every build.
pub const TARGET_ARCH: &str = "amd64";

/// Parent of every remote install directory.
pub const REMOTE_APP_ROOT: &str = "/usr/src/app";

/// File name of the installed binary; the container images run this path.
pub const REMOTE_BINARY_NAME: &str = "goapp";

/// Mode applied to uploaded binaries.
pub const BINARY_MODE: &str = "0755";

/// Local directory holding freshly built artifacts.
pub const LOCAL_STAGING_DIR: &str = "/tmp";

// ---------------------------------------------------------------------------
// AssetEmbed
// ---------------------------------------------------------------------------

/// Pre-build step that packs a static asset directory into a generated
/// Go source file (`esc -o <output_file> <asset_dir>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetEmbed {
    /// Generated source file, relative to the deployable's source dir.
    pub output_file: &'static str,
    /// Asset directory, relative to the deployable's source dir.
    pub asset_dir: &'static str,
}

// ---------------------------------------------------------------------------
// Deployable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deployable {
    Crawler,
    Api,
}

impl Deployable {
    /// Every deployable, in the order `deploy` processes them.
    pub const ALL: [Deployable; 2] = [Deployable::Crawler, Deployable::Api];

    pub fn name(self) -> &'static str {
        match self {
            Self::Crawler => "crawler",
            Self::Api => "api",
        }
    }

    /// Go package directory, relative to the source root.
    pub fn source_dir(self) -> &'static str {
        self.name()
    }

    /// Where the compiled and compressed binary is written below
    /// `staging_dir` (normally [`LOCAL_STAGING_DIR`]).
    pub fn staging_path_in(self, staging_dir: &Path) -> PathBuf {
        staging_dir.join(self.name())
    }

    /// Remote install directory, e.g. `/usr/src/app/crawler`.
    pub fn remote_dir(self) -> String {
        format!("{REMOTE_APP_ROOT}/{}", self.name())
    }

    /// Full remote path of the installed binary.
    pub fn remote_binary_path(self) -> String {
        format!("{}/{REMOTE_BINARY_NAME}", self.remote_dir())
    }

    /// Directories that must exist on the host before the binary is copied.
    ///
    /// The api reads its TLS material from a `certs` directory next to the
    /// binary, so that is created alongside the install directory.
    pub fn remote_dirs(self) -> Vec<String> {
        let dir = self.remote_dir();
        match self {
            Self::Crawler => vec![dir],
            Self::Api => {
                let certs = format!("{dir}/certs");
                vec![dir, certs]
            }
        }
    }

    /// Asset embedding that must run before compilation, if any.
    pub fn asset_embed(self) -> Option<AssetEmbed> {
        match self {
            Self::Crawler => None,
            Self::Api => Some(AssetEmbed {
                output_file: "static.go",
                asset_dir: "static",
            }),
        }
    }

    /// Name of the Docker container running this deployable.
    pub fn container_name(self) -> &'static str {
        self.name()
    }
}

impl fmt::Display for Deployable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
