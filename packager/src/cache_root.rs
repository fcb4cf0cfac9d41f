//! The shared, per-set cache root both fetch runs write into.
//!
//! A cache root is shaped like a `GOPATH`: `pkg/mod` holds the module cache
//! and its content-addressed download store, `bin` holds installed
//! executables. It is keyed by module-set name and reused across runs.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

use crate::error::Result;

/// Relative path of the module cache (`GOMODCACHE`).
pub const MODCACHE_DIR: &str = "pkg/mod";
/// Relative path of the content-addressed download store.
pub const DOWNLOAD_DIR: &str = "pkg/mod/cache/download";
/// Relative path of the manifests directory.
pub const MANIFESTS_DIR: &str = "manifests";
/// Relative path of the scratch module used for resolved fetches.
pub const WORK_DIR: &str = "work";

/// A cache root directory, threaded explicitly through every stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    root: Utf8PathBuf,
}

impl CacheRoot {
    /// Return the cache root for `set_name` under `cache_dir`.
    #[must_use]
    pub fn for_set(cache_dir: &Utf8Path, set_name: &str) -> Self {
        Self {
            root: cache_dir.join(set_name),
        }
    }

    /// Wrap an existing directory as a cache root.
    #[must_use]
    pub fn at(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Return the root directory (used as `GOPATH`).
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.root
    }

    /// Return the module cache directory (used as `GOMODCACHE`).
    #[must_use]
    pub fn modcache(&self) -> Utf8PathBuf {
        self.root.join(MODCACHE_DIR)
    }

    /// Return the content-addressed download store.
    #[must_use]
    pub fn download_dir(&self) -> Utf8PathBuf {
        self.root.join(DOWNLOAD_DIR)
    }

    /// Return the generic binary bucket.
    #[must_use]
    pub fn bin_dir(&self) -> Utf8PathBuf {
        self.root.join(crate::arch::BIN_DIR)
    }

    /// Return the manifests directory.
    #[must_use]
    pub fn manifests_dir(&self) -> Utf8PathBuf {
        self.root.join(MANIFESTS_DIR)
    }

    /// Return the scratch module directory.
    #[must_use]
    pub fn work_dir(&self) -> Utf8PathBuf {
        self.root.join(WORK_DIR)
    }

    /// Create the root and its fixed subdirectories.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a directory cannot be created.
    pub fn prepare(&self) -> Result<()> {
        for dir in [self.modcache(), self.bin_dir(), self.manifests_dir()] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Remove the whole root so the next fetch starts from nothing.
    ///
    /// Module cache files are written read-only by `go`; fetches run with
    /// `-modcacherw` so that this removal succeeds.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removal fails for a reason other than the
    /// root being absent.
    pub fn clean(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
