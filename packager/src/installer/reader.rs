//! Reads generated installers and runs their commands natively.
//!
//! [`Artifact::parse`] recovers the baked [`InstallerSpec`] and payload
//! from the script text. Every dispatch command is then available without
//! bash, GNU tar, or coreutils, and [`Artifact::verify`] closes the gap the
//! script leaves open by recomputing the payload digest.

use super::policy::ExtractionPolicy;
use super::render::shell_quote;
use super::spec::{InstallerCommand, InstallerSpec};
use super::{END_MARKER, MODULES_DELIMITER, PAYLOAD_MARKER};
use crate::archive::{self, Codec};
use crate::arch::{ArchPair, GoArch};
use crate::cache_root::MANIFESTS_DIR;
use crate::digest::Sha256Digest;
use crate::error::{PackError, Result};
use crate::fetch::{CommandExecutor, GoTool};
use crate::manifest::{MANIFEST_EXTENSION, consolidate, consolidated_file_name, write_read_only};
use crate::module_set::ModuleSpec;
use crate::tag::Tag;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Component, Path};

/// A parsed installer: its baked spec and the compressed archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    spec: InstallerSpec,
    payload: Vec<u8>,
}

/// Host facts an install is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOptions {
    /// `go env GOVERSION` on the install host.
    pub go_version: String,
    /// Install host architecture.
    pub arch: GoArch,
    /// Extraction root, normally the first `GOPATH` entry.
    pub gopath: Utf8PathBuf,
}

impl InstallOptions {
    /// Query `go` for whatever the caller did not override.
    ///
    /// The toolchain version is always queried; it is what the install
    /// checks against.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Configuration`] if `go` cannot be queried and
    /// [`PackError::UnsupportedArch`] for an unknown `GOARCH`.
    pub fn detect(
        executor: &dyn CommandExecutor,
        go: &GoTool,
        arch: Option<GoArch>,
        gopath: Option<Utf8PathBuf>,
    ) -> Result<Self> {
        let go_version = go.version(executor)?;
        let arch = match arch {
            Some(arch) => arch,
            None => GoArch::try_from(go.env_var(executor, "GOARCH")?)?,
        };
        let gopath = match gopath {
            Some(path) => path,
            None => first_gopath_entry(&go.env_var(executor, "GOPATH")?)?,
        };
        Ok(Self {
            go_version,
            arch,
            gopath,
        })
    }
}

/// `GOPATH` may be a list; modules install into its first entry.
fn first_gopath_entry(value: &str) -> Result<Utf8PathBuf> {
    value
        .split(':')
        .map(str::trim)
        .find(|entry| !entry.is_empty())
        .map(Utf8PathBuf::from)
        .ok_or_else(|| PackError::configuration("`go env GOPATH` has no usable entry"))
}

/// What an install did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Extraction root.
    pub gopath: Utf8PathBuf,
    /// Architecture the binaries were bound to.
    pub arch: GoArch,
    /// Members written.
    pub extracted: usize,
    /// Members dropped by the exclude rule.
    pub excluded: usize,
    /// Path of the consolidated module list.
    pub consolidated: Utf8PathBuf,
}

impl Artifact {
    /// Read and parse an installer file.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Io`] if the file cannot be read and
    /// [`PackError::InvalidArtifact`] if it is not an installer.
    pub fn open(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parse installer text.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::InvalidArtifact`] when a baked variable, the
    /// module list, or the payload is missing or malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let preamble: Vec<&str> = lines.by_ref().take_while(|l| *l != PAYLOAD_MARKER).collect();
        let mut body = String::new();
        let mut terminated = false;
        for line in lines {
            if line == END_MARKER {
                terminated = true;
                break;
            }
            body.push_str(line.trim_end());
        }
        if !terminated {
            return Err(PackError::invalid_artifact(format!(
                "payload is missing or not terminated by {END_MARKER}"
            )));
        }
        let payload = STANDARD
            .decode(body.as_bytes())
            .map_err(|e| PackError::invalid_artifact(format!("payload is not base64: {e}")))?;

        let vars = baked_variables(&preamble);
        let var = |name: &str| {
            vars.get(name)
                .map(String::as_str)
                .ok_or_else(|| PackError::invalid_artifact(format!("{name} is not set")))
        };

        let arches: Vec<GoArch> = var("TARGET_ARCHES")?
            .split_whitespace()
            .map(GoArch::try_from)
            .collect::<Result<_>>()?;
        let codec = match var("TAR_CODEC")? {
            "--zstd" => Codec::Zstd,
            "--gzip" => Codec::Gzip,
            other => {
                return Err(PackError::invalid_artifact(format!(
                    "unknown archive codec flag {other}"
                )));
            }
        };
        let spec = InstallerSpec {
            set_name: var("SET_NAME")?.to_owned(),
            tag: Tag::parse(var("BUILD_TAG")?, var("BUILD_TIMESTAMP")?)?,
            expected_go_version: var("EXPECTED_GO_VERSION")?.to_owned(),
            goos: var("TARGET_GOOS")?.to_owned(),
            arches: ArchPair::try_from(arches.as_slice())?,
            digest: Sha256Digest::try_from(var("ARCHIVE_SHA256")?)?,
            modules: embedded_modules(&preamble)?,
            codec,
        };
        Ok(Self { spec, payload })
    }

    /// Return the baked spec.
    #[must_use]
    pub fn spec(&self) -> &InstallerSpec {
        &self.spec
    }

    /// Return the compressed archive bytes (`-x`).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Recompute the payload digest and compare it with the baked one.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::IntegrityMismatch`] when they differ.
    pub fn verify(&self) -> Result<Sha256Digest> {
        let actual = Sha256Digest::of_bytes(&self.payload);
        if actual != self.spec.digest {
            return Err(PackError::IntegrityMismatch {
                expected: self.spec.digest.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(actual)
    }

    /// List member names (`-t`).
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decompressed.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(archive::list_members(&self.payload)?
            .into_iter()
            .map(|m| m.path)
            .collect())
    }

    /// List members with metadata (`-tv`).
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decompressed.
    pub fn list_verbose(&self) -> Result<Vec<String>> {
        Ok(archive::list_members(&self.payload)?
            .iter()
            .map(archive::Member::verbose_line)
            .collect())
    }

    /// Write the output of a non-install command to `out`.
    ///
    /// # Errors
    ///
    /// [`InstallerCommand::Usage`] yields [`PackError::Configuration`]
    /// carrying the usage text, and [`InstallerCommand::Install`] is
    /// refused since it needs host facts; see [`Artifact::install`].
    pub fn respond(&self, command: InstallerCommand, out: &mut dyn Write) -> Result<()> {
        match command {
            InstallerCommand::Extract => out.write_all(&self.payload)?,
            InstallerCommand::List => write_lines(out, &self.list()?)?,
            InstallerCommand::ListVerbose => write_lines(out, &self.list_verbose()?)?,
            InstallerCommand::Info => out.write_all(self.spec.info_text().as_bytes())?,
            InstallerCommand::Modules => out.write_all(self.spec.modules_text().as_bytes())?,
            InstallerCommand::Usage => {
                return Err(PackError::configuration(self.spec.usage_text()));
            }
            InstallerCommand::Install => {
                return Err(PackError::configuration(
                    "installing needs the host toolchain; use `gomodpack install`",
                ));
            }
        }
        Ok(())
    }

    /// Install into `options.gopath`.
    ///
    /// The toolchain version is checked first; nothing is extracted on a
    /// mismatch. The host bucket is flattened onto `bin/`, the other
    /// bucket skipped, and every embedded manifest consolidated into
    /// `manifests/<set>.modules`.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::VersionMismatch`], [`PackError::UnsupportedArch`],
    /// [`PackError::PathTraversal`] for hostile member names, or an I/O
    /// error.
    pub fn install(&self, options: &InstallOptions) -> Result<InstallReport> {
        if options.go_version != self.spec.expected_go_version {
            return Err(PackError::VersionMismatch {
                found: options.go_version.clone(),
                expected: self.spec.expected_go_version.clone(),
            });
        }
        let policy = self.spec.policy_for(&options.arch)?;
        fs::create_dir_all(&options.gopath)?;

        let outcome = extract_with_policy(&self.payload, &policy, &options.gopath)?;
        let consolidated = self.consolidate_manifests(&options.gopath, &outcome.manifests)?;
        info!(
            "installed {} {} for {}/{} into {}",
            self.spec.set_name, self.spec.tag, self.spec.goos, options.arch, options.gopath
        );
        Ok(InstallReport {
            gopath: options.gopath.clone(),
            arch: options.arch.clone(),
            extracted: outcome.extracted,
            excluded: outcome.excluded,
            consolidated,
        })
    }

    fn consolidate_manifests(&self, root: &Utf8Path, members: &[String]) -> Result<Utf8PathBuf> {
        let texts = members
            .iter()
            .map(|member| fs::read_to_string(root.join(member)))
            .collect::<std::io::Result<Vec<_>>>()?;
        let dir = root.join(MANIFESTS_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(consolidated_file_name(&self.spec.set_name));
        write_read_only(&path, consolidate(texts.iter().map(String::as_str)).as_bytes())?;
        debug!("consolidated {} manifest(s) into {path}", members.len());
        Ok(path)
    }
}

fn write_lines(out: &mut dyn Write, lines: &[String]) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Collect `NAME='value'` assignments from the preamble.
fn baked_variables(preamble: &[&str]) -> HashMap<String, String> {
    preamble
        .iter()
        .filter_map(|line| {
            let (name, value) = line.split_once('=')?;
            let is_name = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
            if !is_name {
                return None;
            }
            Some((name.to_owned(), shell_unquote(value)?))
        })
        .collect()
}

/// Invert [`shell_quote`].
fn shell_unquote(value: &str) -> Option<String> {
    let inner = value.strip_prefix('\'')?.strip_suffix('\'')?;
    let unquoted = inner.replace(r"'\''", "'");
    (shell_quote(&unquoted) == value).then_some(unquoted)
}

/// Parse the module heredoc.
fn embedded_modules(preamble: &[&str]) -> Result<Vec<ModuleSpec>> {
    let opener = format!("<<'{MODULES_DELIMITER}'");
    let mut lines = preamble
        .iter()
        .skip_while(|line| !line.trim_end().ends_with(&opener));
    if lines.next().is_none() {
        return Err(PackError::invalid_artifact("module list is missing"));
    }
    let mut modules = Vec::new();
    for line in lines {
        if *line == MODULES_DELIMITER {
            return Ok(modules);
        }
        let mut parts = line.split_whitespace();
        let Some(path) = parts.next() else {
            continue;
        };
        modules.push(ModuleSpec::new(path, parts.next().map(str::to_owned)));
    }
    Err(PackError::invalid_artifact("module list is not terminated"))
}

struct ExtractOutcome {
    extracted: usize,
    excluded: usize,
    manifests: Vec<String>,
}

/// Unpack `payload` into `dest`, applying `policy` to every member name.
fn extract_with_policy(
    payload: &[u8],
    policy: &ExtractionPolicy,
    dest: &Utf8Path,
) -> Result<ExtractOutcome> {
    let raw = archive::decompress(payload)?;
    let mut tar = tar::Archive::new(Cursor::new(raw));
    tar.set_preserve_ownerships(false);

    let mut outcome = ExtractOutcome {
        extracted: 0,
        excluded: 0,
        manifests: Vec::new(),
    };
    for entry in tar.entries()? {
        let mut entry = entry?;
        let member_path = entry.path()?.into_owned();
        validate_entry_path(&member_path)?;
        let Some(member) = member_path.to_str() else {
            return Err(PackError::invalid_artifact(format!(
                "non-UTF-8 member name {}",
                member_path.display()
            )));
        };
        if is_manifest_member(member) {
            outcome.manifests.push(member.to_owned());
        }
        let Some(target) = policy.map_path(member) else {
            outcome.excluded += 1;
            continue;
        };

        let dest_path = dest.join(&target);
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if fs::symlink_metadata(&dest_path).is_ok_and(|m| !m.is_dir()) {
            fs::remove_file(&dest_path)?;
        }
        entry.unpack(&dest_path)?;
        outcome.extracted += 1;
    }
    Ok(outcome)
}

fn is_manifest_member(member: &str) -> bool {
    member
        .strip_prefix(MANIFESTS_DIR)
        .and_then(|rest| rest.strip_prefix('/'))
        .is_some_and(|name| {
            !name.contains('/') && name.ends_with(&format!(".{MANIFEST_EXTENSION}"))
        })
}

/// Reject member paths that are absolute or climb out via `..`.
fn validate_entry_path(path: &Path) -> Result<()> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(PackError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}
