//! Install-time architecture binding as plain data.
//!
//! An artifact carries one binary bucket per architecture. At install time
//! the bucket matching the installing host is renamed onto the flat `bin/`
//! path and the other bucket is excluded. The same policy drives both the
//! generated shell script (as GNU tar arguments) and the native installer
//! (as a path mapping).

use crate::arch::{ArchPair, BIN_DIR, GoArch};
use crate::error::{PackError, Result};

/// Rename members under `from` to live under `to` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRule {
    /// Source prefix, with trailing slash.
    pub from: String,
    /// Replacement prefix, with trailing slash.
    pub to: String,
}

/// Drop the member named `prefix` and everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeRule {
    /// Excluded path, without trailing slash.
    pub prefix: String,
}

/// Rename plus exclude, chosen for one install host.
///
/// # Examples
///
/// ```
/// use gomodpack::arch::{ArchPair, GoArch};
/// use gomodpack::installer::ExtractionPolicy;
///
/// let pair = ArchPair::new(
///     GoArch::try_from("amd64").expect("arch"),
///     GoArch::try_from("arm64").expect("arch"),
/// )
/// .expect("pair");
/// let policy = ExtractionPolicy::for_host(&pair, &GoArch::try_from("arm64").expect("arch"), "linux")
///     .expect("arm64 is in the pair");
/// assert_eq!(policy.map_path("bin/linux_arm64/hello").as_deref(), Some("bin/hello"));
/// assert_eq!(policy.map_path("bin/linux_amd64/hello"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPolicy {
    /// Host bucket to flatten.
    pub rename: RenameRule,
    /// Other architecture's bucket.
    pub exclude: ExcludeRule,
}

impl ExtractionPolicy {
    /// Build the policy for an install host.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::UnsupportedArch`] if `host` is not one of the
    /// architectures the artifact carries.
    pub fn for_host(pair: &ArchPair, host: &GoArch, goos: &str) -> Result<Self> {
        if !pair.contains(host) {
            return Err(PackError::UnsupportedArch {
                value: host.to_string(),
                expected: pair
                    .as_array()
                    .map(GoArch::as_str)
                    .join(", "),
            });
        }
        let other = pair.other_than(host);
        Ok(Self {
            rename: RenameRule {
                from: format!("{}/", host.bucket(goos)),
                to: format!("{BIN_DIR}/"),
            },
            exclude: ExcludeRule {
                prefix: other.bucket(goos),
            },
        })
    }

    /// Return where `member` lands after extraction, or `None` if it is
    /// excluded.
    #[must_use]
    pub fn map_path(&self, member: &str) -> Option<String> {
        let excluded = member
            .strip_prefix(&self.exclude.prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if excluded {
            return None;
        }
        match member.strip_prefix(&self.rename.from) {
            Some(rest) => Some(format!("{}{rest}", self.rename.to)),
            None => Some(member.to_owned()),
        }
    }

    /// Return the GNU tar arguments implementing this policy.
    #[must_use]
    pub fn tar_args(&self) -> Vec<String> {
        vec![
            "--transform".to_owned(),
            format!("s|^{}|{}|", self.rename.from, self.rename.to),
            "--exclude".to_owned(),
            self.exclude.prefix.clone(),
            "--exclude".to_owned(),
            format!("{}/*", self.exclude.prefix),
        ]
    }
}
