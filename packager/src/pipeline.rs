//! Build pipeline orchestration.
//!
//! One build runs fetch, merge, inventory, manifest, archive, installer
//! rendering and publication in that order against a single
//! [`CacheRoot`]. Nothing reaches the destination directory until the
//! archive digest is known and every output is rendered.

use crate::arch::{ArchLayout, GoArch};
use crate::archive::{ArchiveSelection, build_archive};
use crate::cache_root::CacheRoot;
use crate::catalog::{
    Descriptor, EXECUTABLE_MODE, PublishedFile, READ_ONLY_MODE, REGULAR_MODE, publish_all,
};
use crate::config::BuildConfig;
use crate::digest::Sha256Digest;
use crate::error::Result;
use crate::fetch::{CommandExecutor, FetchRequest, fetch_both};
use crate::installer::{InstallerSpec, render_installer};
use crate::inventory::extract_inventory;
use crate::layout::merge_layout;
use crate::manifest::Manifest;
use crate::module_set::{ModuleSet, ModuleSpec};
use crate::output::write_stderr_line;
use crate::tag::Tag;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fs;
use std::io::Write;

/// Inputs of one build.
pub struct BuildRequest<'a> {
    /// The module set to package.
    pub set: &'a ModuleSet,
    /// Resolved build configuration.
    pub config: &'a BuildConfig,
    /// Remove the set's cache root before fetching.
    pub clean: bool,
    /// Suppress progress output.
    pub quiet: bool,
    /// Build time; fixes the tag and manifest timestamp.
    pub now: DateTime<Utc>,
}

/// Everything a finished build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Tag assigned to the build.
    pub tag: Tag,
    /// Path of the published installer.
    pub installer: Utf8PathBuf,
    /// Every published file, installer first.
    pub published: Vec<Utf8PathBuf>,
    /// Digest of the installer file.
    pub installer_digest: Sha256Digest,
    /// Digest of the embedded archive.
    pub archive_digest: Sha256Digest,
    /// Module list recorded in the manifest.
    pub modules: Vec<ModuleSpec>,
}

/// Run one build end to end.
///
/// # Errors
///
/// Propagates the first failing stage. A failed build publishes nothing
/// and leaves no new manifest in the cache root.
pub fn build_module_set(
    executor: &dyn CommandExecutor,
    request: &BuildRequest<'_>,
    stderr: &mut dyn Write,
) -> Result<BuildOutput> {
    let BuildRequest {
        set, config, quiet, ..
    } = *request;
    let host_arch = detect_host(executor, config)?;
    let layout = ArchLayout::for_build_host(&config.arches, &host_arch, &config.goos);
    let cache_root = CacheRoot::for_set(&config.cache_dir, set.name());

    if request.clean {
        progress(quiet, stderr, format!("Cleaning {}...", cache_root.path()));
        cache_root.clean()?;
    }

    progress(
        quiet,
        stderr,
        format!(
            "Fetching {} ({}) for {} then {}...",
            set.name(),
            set.mode(),
            layout.other(),
            layout.host()
        ),
    );
    fetch_both(
        executor,
        &FetchRequest {
            set,
            cache_root: &cache_root,
            layout: &layout,
            go: &config.go,
        },
    )?;
    let merged = merge_layout(&cache_root, &layout)?;
    debug!("moved {} binaries into {}", merged.moved.len(), layout.host_bucket());

    let modules = extract_inventory(set, &cache_root)?;
    let manifests_dir = cache_root.manifests_dir();
    let tag = Tag::next(set.name(), request.now, &[&config.dest_dir, &manifests_dir])?;
    let manifest = Manifest::new(set.name(), tag.clone(), modules);
    let manifest_path = manifest.write_to(&manifests_dir)?;

    let result = package(request, &cache_root, &manifest, stderr);
    if result.is_err() {
        discard_manifest(&manifest_path);
    }
    result
}

/// Archive, render and publish a build whose manifest is already written.
fn package(
    request: &BuildRequest<'_>,
    cache_root: &CacheRoot,
    manifest: &Manifest,
    stderr: &mut dyn Write,
) -> Result<BuildOutput> {
    let BuildRequest {
        set, config, quiet, ..
    } = *request;
    let tag = manifest.tag();

    progress(quiet, stderr, format!("Archiving {} {}...", set.name(), tag));
    let selection = ArchiveSelection::for_mode(set.mode(), &manifest.archive_path());
    let archive = build_archive(cache_root, &selection, config.codec)?;

    let spec = InstallerSpec {
        set_name: set.name().to_owned(),
        tag: tag.clone(),
        expected_go_version: config.go_version.clone(),
        goos: config.goos.clone(),
        arches: config.arches.clone(),
        digest: archive.digest.clone(),
        modules: manifest.specs().to_vec(),
        codec: archive.codec,
    };
    let script = render_installer(&spec, &archive.bytes);
    let installer_digest = Sha256Digest::of_bytes(script.as_bytes());
    let installer_name = spec.file_name();
    let descriptor = Descriptor {
        mode: set.mode(),
        size: u64::try_from(script.len()).unwrap_or(u64::MAX),
        sha256: &installer_digest,
        archive_sha256: &archive.digest,
        requested: set.specs(),
    }
    .render();

    let stem = tag.file_stem(set.name());
    let mut files = vec![
        PublishedFile::new(installer_name.clone(), script, EXECUTABLE_MODE),
        PublishedFile::new(
            format!("{installer_name}.sha256"),
            installer_digest.sidecar_line(&installer_name),
            REGULAR_MODE,
        ),
        PublishedFile::new(format!("{installer_name}.list"), descriptor, REGULAR_MODE),
        PublishedFile::new(manifest.file_name(), manifest.render(), READ_ONLY_MODE),
    ];
    if config.keep_archive {
        let name = format!("{stem}.{}", archive.codec.extension());
        files.push(PublishedFile::new(name, archive.bytes, REGULAR_MODE));
    }

    progress(quiet, stderr, format!("Publishing into {}...", config.dest_dir));
    let published = publish_all(&config.dest_dir, &files)?;
    Ok(BuildOutput {
        tag: tag.clone(),
        installer: config.dest_dir.join(&installer_name),
        published,
        installer_digest,
        archive_digest: archive.digest,
        modules: manifest.specs().to_vec(),
    })
}

/// Read the host architecture, warning when the local resolver is not
/// the configured expected version.
fn detect_host(executor: &dyn CommandExecutor, config: &BuildConfig) -> Result<GoArch> {
    let found = config.go.version(executor)?;
    if found != config.go_version {
        warn!(
            "build host has {found}; installers will expect {}",
            config.go_version
        );
    }
    config.go.host_arch(executor)
}

/// Remove a manifest written for a build that did not complete.
fn discard_manifest(path: &Utf8Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("could not remove manifest {path} of failed build: {e}");
    }
}

fn progress(quiet: bool, stderr: &mut dyn Write, message: String) {
    if !quiet {
        write_stderr_line(stderr, message);
    }
}
