//! Module specifiers and the named sets they are grouped into.
//!
//! A [`ModuleSet`] is built once per invocation and never mutated. Its specs
//! keep the caller's order; uniqueness is by module path.

use crate::error::{PackError, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// One dependency request or resolution result: a module path and an
/// optional version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleSpec {
    path: String,
    version: Option<String>,
}

impl ModuleSpec {
    /// Create a spec from validated parts.
    #[must_use]
    pub fn new(path: impl Into<String>, version: Option<String>) -> Self {
        Self {
            path: path.into(),
            version,
        }
    }

    /// Return the module path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Return the version, if one was pinned.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Return the `path@version` query form passed to `go`, using
    /// `latest` when no version is pinned.
    #[must_use]
    pub fn query(&self) -> String {
        format!("{}@{}", self.path, self.version.as_deref().unwrap_or("latest"))
    }

    /// Return the space-delimited manifest line (`path version` or `path`).
    #[must_use]
    pub fn manifest_line(&self) -> String {
        match &self.version {
            Some(version) => format!("{} {version}", self.path),
            None => self.path.clone(),
        }
    }
}

impl fmt::Display for ModuleSpec {
    /// Format in wire form: `path@version`, or `path` alone.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{version}", self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

impl FromStr for ModuleSpec {
    type Err = PackError;

    fn from_str(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        let invalid = |reason: &str| PackError::InvalidSpecifier {
            value: value.to_owned(),
            reason: reason.to_owned(),
        };

        let (path, version) = match trimmed.split_once('@') {
            Some((path, version)) => {
                if version.is_empty() {
                    return Err(invalid("version after '@' is empty"));
                }
                (path, Some(version.to_owned()))
            }
            None => (trimmed, None),
        };

        if path.is_empty() {
            return Err(invalid("module path is empty"));
        }
        if path.chars().any(|c| c.is_whitespace()) {
            return Err(invalid("module path contains whitespace"));
        }
        if path.starts_with('/') || path.ends_with('/') || path.contains("..") {
            return Err(invalid("module path is not a clean relative path"));
        }
        if version.as_deref().is_some_and(|v| v.contains(['@', ' ', '/'])) {
            return Err(invalid("version contains a reserved character"));
        }

        Ok(Self::new(path, version))
    }
}

/// How the module set is fetched and what ends up in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FetchMode {
    /// Download exactly the listed modules; the manifest is the input list.
    Explicit,
    /// Let the resolver pull the transitive closure; the manifest is
    /// discovered by scanning the cache.
    Resolved,
    /// Install executables only; the archive carries just the binaries.
    BinaryOnly,
}

impl FetchMode {
    /// Return the stable textual name used in descriptors and set lists.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Resolved => "resolved",
            Self::BinaryOnly => "binary-only",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchMode {
    type Err = PackError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim() {
            "explicit" => Ok(Self::Explicit),
            "resolved" => Ok(Self::Resolved),
            "binary-only" | "binary" => Ok(Self::BinaryOnly),
            other => Err(PackError::configuration(format!(
                "unknown fetch mode \"{other}\"; expected explicit, resolved, or binary-only"
            ))),
        }
    }
}

/// A named, immutable group of module specs fetched together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSet {
    name: String,
    mode: FetchMode,
    specs: Vec<ModuleSpec>,
}

impl ModuleSet {
    /// Build a set, validating the name and rejecting duplicate paths.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::InvalidSetName`] for an unusable name,
    /// [`PackError::InvalidSpecifier`] for a duplicate path, and
    /// [`PackError::Configuration`] when no specs were given.
    pub fn new(name: &str, mode: FetchMode, specs: Vec<ModuleSpec>) -> Result<Self> {
        validate_set_name(name)?;
        if specs.is_empty() {
            return Err(PackError::configuration(format!(
                "module set \"{name}\" has no specifiers"
            )));
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            if !seen.insert(spec.path()) {
                return Err(PackError::InvalidSpecifier {
                    value: spec.to_string(),
                    reason: "module path listed more than once".to_owned(),
                });
            }
        }

        Ok(Self {
            name: name.to_owned(),
            mode,
            specs,
        })
    }

    /// Return the set name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the fetch mode.
    #[must_use]
    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Return the originally requested specs, in caller order.
    #[must_use]
    pub fn specs(&self) -> &[ModuleSpec] {
        &self.specs
    }
}

/// Check that `name` is usable as a file-name component.
fn validate_set_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(PackError::InvalidSetName {
            value: name.to_owned(),
        })
    }
}
