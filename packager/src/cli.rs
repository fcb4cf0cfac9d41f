//! CLI argument definitions for gomodpack.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::arch::GoArch;
use crate::archive::Codec;
use crate::config::{CONFIG_FILE_NAME, CliOverrides};
use crate::error::{PackError, Result};
use crate::module_set::{FetchMode, ModuleSet, ModuleSpec};
use crate::set_list::SetList;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Package Go module caches for two architectures into one offline installer.
#[derive(Parser, Debug)]
#[command(name = "gomodpack")]
#[command(version, about)]
#[command(long_about = concat!(
    "Package Go module caches for two architectures into one offline installer.\n\n",
    "`build` runs `go` once per target architecture against a shared cache ",
    "root, merges the two binary trees, records a tagged manifest, and emits a ",
    "self-extracting installer script with checksum and descriptor sidecars.\n\n",
    "The installer picks the right binaries for the host it runs on and refuses ",
    "to install when the local go version differs from the one it was built for.",
))]
#[command(after_help = concat!(
    "INSTALLER FLAGS (for `inspect` and the generated .run script):\n",
    "  (none)  install into the first GOPATH entry\n",
    "  -x      write the compressed archive to stdout\n",
    "  -t      list archive members\n",
    "  -tv     list archive members with details\n",
    "  -i      print the build timestamp and archive sha256\n",
    "  -m      print the recorded module list\n\n",
    "EXAMPLES:\n",
    "  Package one tool as binaries only:\n",
    "    $ gomodpack build tools --mode binary-only golang.org/x/example/hello\n\n",
    "  Package a dependency closure from a set-list file:\n",
    "    $ gomodpack build deps --mode resolved --set-file sets.conf\n\n",
    "  Check what an installer carries:\n",
    "    $ gomodpack inspect dist/tools-20261019.1.run -t\n\n",
    "  Check the embedded digest:\n",
    "    $ gomodpack verify dist/tools-20261019.1.run",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch a module set for both architectures and emit an installer.
    Build(BuildArgs),

    /// Run one installer flag natively and print its output.
    Inspect(InspectArgs),

    /// Install an installer's payload into a GOPATH.
    Install(InstallArgs),

    /// Recompute the payload digest and compare it with the embedded one.
    Verify(VerifyArgs),
}

/// Arguments for the build command.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Module set name; also names the emitted files.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Module specifiers, `path` or `path@version`.
    #[arg(value_name = "SPEC")]
    pub specs: Vec<ModuleSpec>,

    /// Fetch mode [default: explicit, or the set-list `mode =` line].
    #[arg(short, long, value_enum)]
    pub mode: Option<FetchMode>,

    /// Read specifiers from the `[NAME]` section of a set-list file.
    #[arg(short, long, value_name = "FILE")]
    pub set_file: Option<Utf8PathBuf>,

    /// Remove the set's cache root before fetching.
    #[arg(long)]
    pub clean: bool,

    /// Configuration file [default: ./gomodpack.toml when present].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Go version the installer will require, e.g. go1.22.3.
    #[arg(long, value_name = "VERSION")]
    pub go_version: Option<String>,

    /// Target operating system [default: linux].
    #[arg(long, value_name = "GOOS")]
    pub goos: Option<String>,

    /// Target architecture; give exactly two [default: amd64, arm64].
    #[arg(short, long = "arch", value_name = "ARCH", value_parser = parse_arch)]
    pub arches: Vec<GoArch>,

    /// Directory that receives the installer and sidecars [default: .].
    #[arg(short, long, value_name = "DIR")]
    pub dest_dir: Option<Utf8PathBuf>,

    /// Parent of the per-set cache roots [default: DEST/.gomodpack-cache].
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Archive compression [default: zstd].
    #[arg(long, value_enum)]
    pub codec: Option<Codec>,

    /// The go executable [default: go].
    #[arg(long, value_name = "PROGRAM")]
    pub go: Option<String>,

    /// Also publish the bare archive next to the installer.
    #[arg(long)]
    pub keep_archive: bool,

    /// Suppress progress output (errors still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the inspect command.
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Installer to inspect.
    #[arg(value_name = "ARTIFACT")]
    pub artifact: Utf8PathBuf,

    /// Installer flag: -x, -t, -tv, -i, or -m.
    #[arg(value_name = "FLAG", allow_hyphen_values = true)]
    pub flag: Option<String>,
}

/// Arguments for the install command.
#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
    /// Installer to install.
    #[arg(value_name = "ARTIFACT")]
    pub artifact: Utf8PathBuf,

    /// Install as this architecture instead of `go env GOARCH`.
    #[arg(short, long, value_name = "ARCH", value_parser = parse_arch)]
    pub arch: Option<GoArch>,

    /// Install into this directory instead of `go env GOPATH`.
    #[arg(long, value_name = "DIR")]
    pub gopath: Option<Utf8PathBuf>,

    /// The go executable [default: go].
    #[arg(long, value_name = "PROGRAM", default_value = "go")]
    pub go: String,

    /// Suppress the closing summary.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the verify command.
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Installer to check.
    #[arg(value_name = "ARTIFACT")]
    pub artifact: Utf8PathBuf,
}

impl BuildArgs {
    /// Return the configuration file to read and whether it must exist.
    ///
    /// # Examples
    ///
    /// ```
    /// use camino::Utf8PathBuf;
    /// use gomodpack::cli::BuildArgs;
    ///
    /// let (path, required) = BuildArgs::default().config_file();
    /// assert_eq!(path, Utf8PathBuf::from("gomodpack.toml"));
    /// assert!(!required);
    /// ```
    #[must_use]
    pub fn config_file(&self) -> (Utf8PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (Utf8PathBuf::from(CONFIG_FILE_NAME), false),
        }
    }

    /// Collect the configuration flags given on the command line.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            go_version: self.go_version.clone(),
            goos: self.goos.clone(),
            arches: self.arches.clone(),
            dest_dir: self.dest_dir.clone(),
            cache_dir: self.cache_dir.clone(),
            codec: self.codec,
            go: self.go.clone(),
            keep_archive: self.keep_archive,
        }
    }

    /// Build the module set from the set-list section (if any) followed by
    /// the positional specifiers.
    ///
    /// The mode comes from `--mode`, then the section's `mode =` line, then
    /// defaults to explicit.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Configuration`] if a set-list file has no
    /// section named after the set, and any error of [`ModuleSet::new`].
    pub fn module_set(&self, set_list: Option<&SetList>) -> Result<ModuleSet> {
        let entry = match (set_list, &self.set_file) {
            (Some(list), Some(path)) => Some(list.find(&self.name).ok_or_else(|| {
                PackError::configuration(format!("{path} has no [{}] section", self.name))
            })?),
            _ => None,
        };
        let mode = self
            .mode
            .or_else(|| entry.and_then(|e| e.mode))
            .unwrap_or(FetchMode::Explicit);
        let mut specs = entry.map(|e| e.specs.clone()).unwrap_or_default();
        specs.extend(self.specs.iter().cloned());
        ModuleSet::new(&self.name, mode, specs)
    }
}

fn parse_arch(value: &str) -> Result<GoArch> {
    GoArch::try_from(value)
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
