//! The installer as a pure value: everything but the payload bytes.

use super::policy::ExtractionPolicy;
use crate::archive::Codec;
use crate::arch::{ArchPair, GoArch};
use crate::digest::Sha256Digest;
use crate::error::Result;
use crate::module_set::ModuleSpec;
use crate::tag::Tag;

/// What an installer does for a given command-line argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerCommand {
    /// No argument: version check, arch selection, extraction,
    /// consolidation.
    Install,
    /// `-x`: write the embedded compressed archive to stdout.
    Extract,
    /// `-t`: list member names.
    List,
    /// `-tv`: list members with permissions, size and mtime.
    ListVerbose,
    /// `-i`: print the build timestamp then the archive digest.
    Info,
    /// `-m`: print the embedded module list.
    Modules,
    /// Anything else: print usage and exit 2.
    Usage,
}

impl InstallerCommand {
    /// Every command with a flag, in usage order.
    pub const FLAGGED: [Self; 5] = [
        Self::Extract,
        Self::List,
        Self::ListVerbose,
        Self::Info,
        Self::Modules,
    ];

    /// Map an argument onto a command. An absent or empty argument
    /// installs.
    #[must_use]
    pub fn parse(arg: Option<&str>) -> Self {
        match arg.unwrap_or_default() {
            "" => Self::Install,
            "-x" => Self::Extract,
            "-t" => Self::List,
            "-tv" => Self::ListVerbose,
            "-i" => Self::Info,
            "-m" => Self::Modules,
            _ => Self::Usage,
        }
    }

    /// Return the flag that selects this command, if it has one.
    #[must_use]
    pub fn flag(self) -> Option<&'static str> {
        match self {
            Self::Extract => Some("-x"),
            Self::List => Some("-t"),
            Self::ListVerbose => Some("-tv"),
            Self::Info => Some("-i"),
            Self::Modules => Some("-m"),
            Self::Install | Self::Usage => None,
        }
    }

    /// One-line description used in usage text.
    #[must_use]
    pub fn summary(self) -> &'static str {
        match self {
            Self::Install => "install into the first GOPATH entry",
            Self::Extract => "write the compressed archive to stdout",
            Self::List => "list archive members",
            Self::ListVerbose => "list archive members with metadata",
            Self::Info => "print build timestamp and archive sha256",
            Self::Modules => "print the module list",
            Self::Usage => "print this help",
        }
    }
}

/// Everything baked into an installer besides the archive itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerSpec {
    /// Module set name.
    pub set_name: String,
    /// Build tag.
    pub tag: Tag,
    /// `go env GOVERSION` the install host must report.
    pub expected_go_version: String,
    /// Target operating system of both buckets.
    pub goos: String,
    /// Architectures the archive carries.
    pub arches: ArchPair,
    /// SHA-256 of the compressed archive.
    pub digest: Sha256Digest,
    /// Modules recorded in the manifest.
    pub modules: Vec<ModuleSpec>,
    /// Compression of the embedded archive.
    pub codec: Codec,
}

impl InstallerSpec {
    /// Decide what to do for `arg`.
    #[must_use]
    pub fn dispatch(&self, arg: Option<&str>) -> InstallerCommand {
        InstallerCommand::parse(arg)
    }

    /// Return the installer filename, `<set>-<tag>.run`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.run", self.tag.file_stem(&self.set_name))
    }

    /// Return the `-i` output.
    #[must_use]
    pub fn info_text(&self) -> String {
        format!("{}\n{}\n", self.tag.iso_timestamp(), self.digest)
    }

    /// Return the `-m` output.
    #[must_use]
    pub fn modules_text(&self) -> String {
        self.modules
            .iter()
            .map(|spec| format!("{}\n", spec.manifest_line()))
            .collect()
    }

    /// Return the usage text.
    #[must_use]
    pub fn usage_text(&self) -> String {
        let mut text = format!(
            "usage: {} [-x|-t|-tv|-i|-m]\n\n  (none)  {}\n",
            self.file_name(),
            InstallerCommand::Install.summary()
        );
        for command in InstallerCommand::FLAGGED {
            if let Some(flag) = command.flag() {
                text.push_str(&format!("  {flag:<6}  {}\n", command.summary()));
            }
        }
        text
    }

    /// Return the extraction policy for an install host.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PackError::UnsupportedArch`] for hosts the
    /// artifact does not carry.
    pub fn policy_for(&self, host: &GoArch) -> Result<ExtractionPolicy> {
        ExtractionPolicy::for_host(&self.arches, host, &self.goos)
    }
}
