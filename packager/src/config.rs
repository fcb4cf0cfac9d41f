//! Build configuration: file, environment, then command line.
//!
//! `gomodpack.toml` supplies defaults for a checkout. The
//! `GOMODPACK_GO_VERSION`, `GOMODPACK_DEST_DIR` and `GOMODPACK_CACHE_DIR`
//! environment variables override it, and explicit CLI flags override both.
//!
//! ```toml
//! go_version = "go1.22.3"
//! arches = ["amd64", "arm64"]
//! dest_dir = "dist"
//! cache_dir = "/var/cache/gomodpack"
//! codec = "zstd"
//! ```

use crate::archive::Codec;
use crate::arch::{ArchPair, GoArch};
use crate::error::{PackError, Result};
use crate::fetch::GoTool;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "gomodpack.toml";
/// Environment override for the expected toolchain version.
pub const ENV_GO_VERSION: &str = "GOMODPACK_GO_VERSION";
/// Environment override for the artifact directory.
pub const ENV_DEST_DIR: &str = "GOMODPACK_DEST_DIR";
/// Environment override for the cache directory.
pub const ENV_CACHE_DIR: &str = "GOMODPACK_CACHE_DIR";

const DEFAULT_GOOS: &str = "linux";
const DEFAULT_ARCHES: [&str; 2] = ["amd64", "arm64"];
const DEFAULT_CACHE_SUBDIR: &str = ".gomodpack-cache";

/// Settings as read from `gomodpack.toml`; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FileConfig {
    /// Expected `go env GOVERSION` on install hosts.
    pub go_version: Option<String>,
    /// Target operating system.
    pub goos: Option<String>,
    /// The two target architectures.
    pub arches: Option<Vec<GoArch>>,
    /// Where artifacts are published.
    pub dest_dir: Option<Utf8PathBuf>,
    /// Parent of the per-set cache roots.
    pub cache_dir: Option<Utf8PathBuf>,
    /// Archive compression.
    pub codec: Option<Codec>,
    /// `go` executable to run.
    pub go: Option<String>,
    /// Also publish the bare archive next to the installer.
    pub keep_archive: Option<bool>,
}

impl FileConfig {
    /// Parse TOML text; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::ConfigFile`] for malformed TOML, unknown keys,
    /// or invalid values.
    pub fn from_toml(text: &str, path: &Utf8Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| PackError::ConfigFile {
            path: path.to_owned(),
            source,
        })
    }

    /// Load `path`, or return defaults when `required` is false and the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Io`] if an existing file cannot be read, or
    /// [`PackError::Configuration`] if a required file is missing.
    pub fn load(path: &Utf8Path, required: bool) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                Ok(Self::default())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PackError::configuration(
                format!("configuration file {path} does not exist"),
            )),
            Err(e) => Err(e.into()),
        }
    }
}

/// Values taken from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// `GOMODPACK_GO_VERSION`.
    pub go_version: Option<String>,
    /// `GOMODPACK_DEST_DIR`.
    pub dest_dir: Option<Utf8PathBuf>,
    /// `GOMODPACK_CACHE_DIR`.
    pub cache_dir: Option<Utf8PathBuf>,
}

impl EnvConfig {
    /// Read the overrides from the current environment. Empty values are
    /// treated as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            go_version: var(ENV_GO_VERSION),
            dest_dir: var(ENV_DEST_DIR).map(Utf8PathBuf::from),
            cache_dir: var(ENV_CACHE_DIR).map(Utf8PathBuf::from),
        }
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// `--go-version`.
    pub go_version: Option<String>,
    /// `--goos`.
    pub goos: Option<String>,
    /// `--arch`, given twice.
    pub arches: Vec<GoArch>,
    /// `--dest-dir`.
    pub dest_dir: Option<Utf8PathBuf>,
    /// `--cache-dir`.
    pub cache_dir: Option<Utf8PathBuf>,
    /// `--codec`.
    pub codec: Option<Codec>,
    /// `--go`.
    pub go: Option<String>,
    /// `--keep-archive`.
    pub keep_archive: bool,
}

/// Fully resolved settings for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Version baked into the installer.
    pub go_version: String,
    /// Target operating system.
    pub goos: String,
    /// Target architectures.
    pub arches: ArchPair,
    /// Artifact directory.
    pub dest_dir: Utf8PathBuf,
    /// Parent of the per-set cache roots.
    pub cache_dir: Utf8PathBuf,
    /// Archive compression.
    pub codec: Codec,
    /// Resolver executable.
    pub go: GoTool,
    /// Publish the bare archive too.
    pub keep_archive: bool,
}

impl BuildConfig {
    /// Merge the three layers, command line first.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Configuration`] if no expected go version is
    /// given anywhere, or the architecture list is not two distinct
    /// supported names.
    pub fn resolve(file: FileConfig, env: EnvConfig, cli: CliOverrides) -> Result<Self> {
        let go_version = cli
            .go_version
            .or(env.go_version)
            .or(file.go_version)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                PackError::configuration(format!(
                    "expected go version is not set; use --go-version, {ENV_GO_VERSION}, \
                     or go_version in {CONFIG_FILE_NAME}"
                ))
            })?;

        let arches = if cli.arches.is_empty() {
            match file.arches {
                Some(arches) => arches,
                None => DEFAULT_ARCHES
                    .iter()
                    .map(|a| GoArch::try_from(*a))
                    .collect::<Result<_>>()?,
            }
        } else {
            cli.arches
        };

        let dest_dir = cli
            .dest_dir
            .or(env.dest_dir)
            .or(file.dest_dir)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        let cache_dir = cli
            .cache_dir
            .or(env.cache_dir)
            .or(file.cache_dir)
            .unwrap_or_else(|| dest_dir.join(DEFAULT_CACHE_SUBDIR));

        Ok(Self {
            go_version,
            goos: cli
                .goos
                .or(file.goos)
                .unwrap_or_else(|| DEFAULT_GOOS.to_owned()),
            arches: ArchPair::try_from(arches.as_slice())?,
            dest_dir,
            cache_dir,
            codec: cli.codec.or(file.codec).unwrap_or_default(),
            go: GoTool::new(cli.go.or(file.go).as_deref().unwrap_or("go")),
            keep_archive: cli.keep_archive || file.keep_archive.unwrap_or(false),
        })
    }
}
