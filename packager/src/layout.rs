//! Reconciles the two architectures' binary trees into one portable layout.
//!
//! After both fetch runs the native (host) executables sit directly in
//! `bin/` and the cross-compiled ones in `bin/<goos>_<other>/`. The merge
//! moves the host files into `bin/<goos>_<host>/` so both architectures
//! are addressed the same way regardless of which machine ran the build.

use crate::arch::ArchLayout;
use crate::cache_root::CacheRoot;
use crate::error::Result;
use log::debug;
use std::fs;

/// Outcome of a layout merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Names of the files moved into the host bucket, sorted.
    pub moved: Vec<String>,
}

/// Move every top-level regular file of the generic bucket into the host
/// bucket, replacing any stale host bucket content.
///
/// The other architecture's bucket is never touched. When the generic
/// bucket holds no files the host bucket is left as it is.
///
/// # Errors
///
/// Returns an I/O error if the buckets cannot be read, cleared, or
/// written.
pub fn merge_layout(cache_root: &CacheRoot, layout: &ArchLayout) -> Result<MergeReport> {
    let generic = cache_root.bin_dir();
    if !generic.is_dir() {
        return Ok(MergeReport::default());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(&generic)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry);
        }
    }
    if files.is_empty() {
        debug!("generic bucket {generic} is empty; nothing to merge");
        return Ok(MergeReport::default());
    }

    let host_bucket = cache_root.path().join(layout.host_bucket());
    match fs::remove_dir_all(&host_bucket) {
        Ok(()) => debug!("cleared stale host bucket {host_bucket}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::create_dir_all(&host_bucket)?;

    let mut moved = Vec::with_capacity(files.len());
    for entry in files {
        let name = entry.file_name();
        fs::rename(entry.path(), host_bucket.as_std_path().join(&name))?;
        moved.push(name.to_string_lossy().into_owned());
    }
    moved.sort();
    debug!("moved {} file(s) into {host_bucket}", moved.len());
    Ok(MergeReport { moved })
}
