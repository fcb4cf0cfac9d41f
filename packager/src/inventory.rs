//! Derives the final, ordered module list for a build.
//!
//! Explicit and binary-only sets report exactly what the caller asked for.
//! Resolved sets are discovered from the download store, since the true
//! closure is only known after the resolver has run.

use crate::cache_root::CacheRoot;
use crate::error::{PackError, Result};
use crate::module_path::decode;
use crate::module_set::{FetchMode, ModuleSet, ModuleSpec};
use log::debug;
use std::collections::BTreeSet;
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Directory separating the escaped module path from its versions.
const VERSION_DIR: &str = "@v";
/// Extension of the one stored content file per module version.
const CONTENT_EXTENSION: &str = "zip";

/// Return the module list recorded in the manifest.
///
/// # Errors
///
/// Returns [`PackError::EmptyResolution`] when a resolved-mode scan finds
/// nothing, and an I/O error if the store cannot be walked.
pub fn extract_inventory(set: &ModuleSet, cache_root: &CacheRoot) -> Result<Vec<ModuleSpec>> {
    match set.mode() {
        FetchMode::Explicit | FetchMode::BinaryOnly => Ok(set.specs().to_vec()),
        FetchMode::Resolved => {
            let found = scan_download_store(cache_root)?;
            if found.is_empty() {
                return Err(PackError::EmptyResolution {
                    path: cache_root.download_dir(),
                });
            }
            debug!("resolved {} module(s) from {}", found.len(), cache_root.download_dir());
            Ok(found)
        }
    }
}

/// Scan the download store for `<escaped path>/@v/<escaped version>.zip`
/// entries and return the decoded modules, sorted and deduplicated.
///
/// A missing store yields an empty list.
///
/// # Errors
///
/// Returns an I/O error if walking the store fails part-way.
pub fn scan_download_store(cache_root: &CacheRoot) -> Result<Vec<ModuleSpec>> {
    let store = cache_root.download_dir();
    if !store.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = BTreeSet::new();
    for entry in WalkDir::new(&store).sort_by_file_name() {
        let entry = entry.map_err(|e| PackError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&store) else {
            continue;
        };
        if let Some(spec) = spec_from_store_path(relative) {
            found.insert(spec);
        }
    }
    Ok(found.into_iter().collect())
}

/// Map a store-relative path onto a module spec, if it names a content file.
fn spec_from_store_path(relative: &Path) -> Option<ModuleSpec> {
    if relative.extension().and_then(|e| e.to_str()) != Some(CONTENT_EXTENSION) {
        return None;
    }
    let version = relative.file_stem()?.to_str()?;
    let version_dir = relative.parent()?;
    if version_dir.file_name()?.to_str()? != VERSION_DIR {
        return None;
    }
    let module_dir = version_dir.parent()?;

    let mut segments = Vec::new();
    for component in module_dir.components() {
        match component {
            Component::Normal(part) => segments.push(part.to_str()?),
            _ => return None,
        }
    }
    // `cache/download/sumdb` holds checksum database tiles, not modules.
    if segments.is_empty() || segments.first() == Some(&"sumdb") {
        return None;
    }

    let path = decode(&segments.join("/"));
    Some(ModuleSpec::new(path, Some(decode(version))))
}
