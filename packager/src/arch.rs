//! Architecture names and the binary bucket layout they imply.
//!
//! `go install` writes executables for the host platform straight into
//! `bin/`, and cross-compiled ones into `bin/<goos>_<goarch>/`. After the
//! layout merge both architectures live in suffixed buckets, and the flat
//! `bin/` path is chosen again on the install host.

use crate::error::{PackError, Result};
use serde::Deserialize;
use std::fmt;

/// The `GOARCH` values an artifact may carry.
const SUPPORTED_ARCHES: &[&str] = &[
    "amd64", "arm64", "386", "arm", "ppc64le", "riscv64", "s390x", "loong64",
];

/// Relative path of the generic binary bucket.
pub const BIN_DIR: &str = "bin";

/// A validated Go architecture name.
///
/// # Examples
///
/// ```
/// use gomodpack::arch::GoArch;
///
/// let arch = GoArch::try_from("arm64").expect("supported");
/// assert_eq!(arch.bucket("linux"), "bin/linux_arm64");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub struct GoArch(String);

impl GoArch {
    /// Return the architecture as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the relative bucket path `bin/<goos>_<arch>`.
    #[must_use]
    pub fn bucket(&self, goos: &str) -> String {
        format!("{BIN_DIR}/{goos}_{}", self.0)
    }
}

impl TryFrom<&str> for GoArch {
    type Error = PackError;

    fn try_from(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if SUPPORTED_ARCHES.contains(&trimmed) {
            Ok(Self(trimmed.to_owned()))
        } else {
            Err(PackError::UnsupportedArch {
                value: value.to_owned(),
                expected: SUPPORTED_ARCHES.join(", "),
            })
        }
    }
}

impl TryFrom<String> for GoArch {
    type Error = PackError;

    fn try_from(value: String) -> Result<Self> {
        Self::try_from(value.as_str())
    }
}

impl fmt::Display for GoArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed pair of target architectures an artifact carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchPair {
    first: GoArch,
    second: GoArch,
}

impl ArchPair {
    /// Create a pair of two distinct architectures.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Configuration`] if both entries are equal.
    pub fn new(first: GoArch, second: GoArch) -> Result<Self> {
        if first == second {
            return Err(PackError::configuration(format!(
                "target architectures must differ, got {first} twice"
            )));
        }
        Ok(Self { first, second })
    }

    /// Return both architectures in configured order.
    #[must_use]
    pub fn as_array(&self) -> [&GoArch; 2] {
        [&self.first, &self.second]
    }

    /// Return whether `arch` is one of the pair.
    #[must_use]
    pub fn contains(&self, arch: &GoArch) -> bool {
        &self.first == arch || &self.second == arch
    }

    /// Return the member of the pair that is not `arch`.
    ///
    /// When `arch` is not in the pair the second entry is returned.
    #[must_use]
    pub fn other_than(&self, arch: &GoArch) -> &GoArch {
        if &self.second == arch {
            &self.first
        } else {
            &self.second
        }
    }
}

impl TryFrom<&[GoArch]> for ArchPair {
    type Error = PackError;

    fn try_from(value: &[GoArch]) -> Result<Self> {
        match value {
            [first, second] => Self::new(first.clone(), second.clone()),
            _ => Err(PackError::configuration(format!(
                "exactly two target architectures are required, got {}",
                value.len()
            ))),
        }
    }
}

/// Where each architecture's binaries live inside a cache root.
///
/// The host architecture is the one `go` builds natively during the fetch;
/// its output lands in the generic bucket and is moved into
/// [`ArchLayout::host_bucket`] by the layout merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchLayout {
    host: GoArch,
    other: GoArch,
    goos: String,
}

impl ArchLayout {
    /// Derive the layout for a build host.
    ///
    /// If the build host is not one of the pair, the first entry stands in
    /// as host; nothing lands in the generic bucket in that case.
    #[must_use]
    pub fn for_build_host(pair: &ArchPair, build_host: &GoArch, goos: &str) -> Self {
        let host = if pair.contains(build_host) {
            build_host.clone()
        } else {
            log::warn!("build host architecture {build_host} is not a target; no native bucket");
            pair.first.clone()
        };
        let other = pair.other_than(&host).clone();
        Self {
            host,
            other,
            goos: goos.to_owned(),
        }
    }

    /// Return the host architecture.
    #[must_use]
    pub fn host(&self) -> &GoArch {
        &self.host
    }

    /// Return the non-host architecture.
    #[must_use]
    pub fn other(&self) -> &GoArch {
        &self.other
    }

    /// Return the target operating system.
    #[must_use]
    pub fn goos(&self) -> &str {
        &self.goos
    }

    /// Return the relative host bucket path.
    #[must_use]
    pub fn host_bucket(&self) -> String {
        self.host.bucket(&self.goos)
    }

    /// Return the relative bucket path of the other architecture.
    #[must_use]
    pub fn other_bucket(&self) -> String {
        self.other.bucket(&self.goos)
    }

    /// Return the fetch order: other architecture first, host last, so the
    /// most recent occupant of the generic bucket is always the host run.
    #[must_use]
    pub fn fetch_order(&self) -> [&GoArch; 2] {
        [&self.other, &self.host]
    }
}
