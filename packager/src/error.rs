//! Error types for the gomodpack pipeline and CLI.
//!
//! Each variant names the stage that failed and carries enough context for
//! an operator to act on it. [`PackError::exit_code`] maps variants onto the
//! distinguished process statuses the CLI reports.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Exit status for configuration problems detected before any fetch.
pub const EXIT_CONFIGURATION: i32 = 2;
/// Exit status for a resolver version mismatch at install time.
pub const EXIT_VERSION_MISMATCH: i32 = 3;
/// Exit status for a failed fetch invocation.
pub const EXIT_FETCH_FAILED: i32 = 4;
/// Exit status for a resolved-mode scan that found nothing.
pub const EXIT_EMPTY_RESOLUTION: i32 = 5;
/// Exit status for an embedded digest that does not match the payload.
pub const EXIT_INTEGRITY_MISMATCH: i32 = 6;

/// Errors that can occur while building, inspecting, or installing.
#[derive(Debug, Error)]
pub enum PackError {
    /// A required contextual input is missing or invalid.
    #[error("configuration error: {reason}")]
    Configuration {
        /// Description of the missing or invalid input.
        reason: String,
    },

    /// The configuration file could not be parsed.
    #[error("invalid configuration file {path}: {source}")]
    ConfigFile {
        /// Path of the offending file.
        path: Utf8PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An external fetch invocation failed or produced no content.
    #[error("fetch for {arch} failed: {reason}")]
    FetchFailed {
        /// Architecture the failing invocation targeted.
        arch: String,
        /// Description of the failure, usually the resolver's stderr.
        reason: String,
    },

    /// A resolved-mode scan found no modules in the download cache.
    #[error("no modules found under {path}; refusing to write an empty manifest")]
    EmptyResolution {
        /// The download cache directory that was scanned.
        path: Utf8PathBuf,
    },

    /// The installed resolver version differs from the one baked in.
    #[error("found go version: {found}\nexpected go version: {expected}")]
    VersionMismatch {
        /// Version reported by the local toolchain.
        found: String,
        /// Version the artifact was built for.
        expected: String,
    },

    /// The embedded digest does not match the payload bytes.
    #[error("archive digest mismatch: embedded {expected}, computed {actual}")]
    IntegrityMismatch {
        /// Digest recorded in the installer.
        expected: String,
        /// Digest recomputed over the payload.
        actual: String,
    },

    /// A module specifier could not be parsed.
    #[error("invalid module specifier \"{value}\": {reason}")]
    InvalidSpecifier {
        /// The rejected specifier.
        value: String,
        /// Description of the problem.
        reason: String,
    },

    /// A module set name is empty or contains unsupported characters.
    #[error("invalid module set name \"{value}\"")]
    InvalidSetName {
        /// The rejected name.
        value: String,
    },

    /// An architecture is not in the supported set.
    #[error("unsupported architecture \"{value}\"; expected one of: {expected}")]
    UnsupportedArch {
        /// The rejected architecture name.
        value: String,
        /// Comma-separated list of accepted names.
        expected: String,
    },

    /// A file does not look like a gomodpack installer.
    #[error("invalid installer artifact: {reason}")]
    InvalidArtifact {
        /// Description of what is missing or malformed.
        reason: String,
    },

    /// An archive entry tries to escape the extraction root.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry path.
        path: String,
    },

    /// A set-list file could not be parsed.
    #[error("{path}:{line}: {reason}")]
    SetList {
        /// Path of the set-list file.
        path: Utf8PathBuf,
        /// One-based line number.
        line: usize,
        /// Description of the problem.
        reason: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

impl PackError {
    /// Return the process exit status for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } | Self::ConfigFile { .. } => EXIT_CONFIGURATION,
            Self::VersionMismatch { .. } => EXIT_VERSION_MISMATCH,
            Self::FetchFailed { .. } => EXIT_FETCH_FAILED,
            Self::EmptyResolution { .. } => EXIT_EMPTY_RESOLUTION,
            Self::IntegrityMismatch { .. } => EXIT_INTEGRITY_MISMATCH,
            _ => 1,
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_artifact(reason: impl Into<String>) -> Self {
        Self::InvalidArtifact {
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`PackError`].
pub type Result<T> = std::result::Result<T, PackError>;
