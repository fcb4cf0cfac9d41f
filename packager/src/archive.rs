//! Deterministic, compressed tar archives of a cache root.
//!
//! The archive carries paths relative to the cache root so it can be
//! unpacked straight into a `GOPATH`. Entries are walked in sorted order
//! with normalised headers, so identical trees always compress to the same
//! bytes and the same digest.

use crate::cache_root::{CacheRoot, MANIFESTS_DIR};
use crate::digest::Sha256Digest;
use crate::error::{PackError, Result};
use crate::module_set::FetchMode;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tar::{Builder, EntryType, HeaderMode};
use walkdir::WalkDir;

/// Fixed zstd compression level.
const ZSTD_LEVEL: i32 = 19;
/// Fixed gzip compression level.
const GZIP_LEVEL: u32 = 9;

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression applied to the tar stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// Zstandard (`.tar.zst`).
    #[default]
    Zstd,
    /// Gzip (`.tar.gz`).
    Gzip,
}

impl Codec {
    /// Identify the codec from the first bytes of a compressed stream.
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&ZSTD_MAGIC) {
            Some(Self::Zstd)
        } else if bytes.starts_with(&GZIP_MAGIC) {
            Some(Self::Gzip)
        } else {
            None
        }
    }

    /// Return the GNU tar flag that selects this codec.
    #[must_use]
    pub fn tar_flag(self) -> &'static str {
        match self {
            Self::Zstd => "--zstd",
            Self::Gzip => "--gzip",
        }
    }

    /// Return the archive file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zstd => "tar.zst",
            Self::Gzip => "tar.gz",
        }
    }

    fn compress(self, tar: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Zstd => zstd::encode_all(tar, ZSTD_LEVEL),
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL));
                encoder.write_all(tar)?;
                encoder.finish()
            }
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zstd => "zstd",
            Self::Gzip => "gzip",
        })
    }
}

/// Top-level relative paths to include in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSelection {
    roots: Vec<String>,
}

impl ArchiveSelection {
    /// Select what a build of `mode` ships.
    ///
    /// Binary-only builds carry the binaries and this build's manifest.
    /// Every other mode carries the module cache, the binaries, and all
    /// manifests, historical ones included.
    #[must_use]
    pub fn for_mode(mode: FetchMode, manifest_archive_path: &str) -> Self {
        let roots = match mode {
            FetchMode::BinaryOnly => {
                vec![crate::arch::BIN_DIR.to_owned(), manifest_archive_path.to_owned()]
            }
            FetchMode::Explicit | FetchMode::Resolved => vec![
                "pkg".to_owned(),
                crate::arch::BIN_DIR.to_owned(),
                MANIFESTS_DIR.to_owned(),
            ],
        };
        Self { roots }
    }

    /// Return the selected relative paths.
    #[must_use]
    pub fn roots(&self) -> &[String] {
        &self.roots
    }
}

/// A finished archive: compressed bytes and their digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Compressed archive bytes.
    pub bytes: Vec<u8>,
    /// SHA-256 over [`Archive::bytes`].
    pub digest: Sha256Digest,
    /// Codec the bytes were compressed with.
    pub codec: Codec,
    /// Relative member paths, in archive order.
    pub entries: Vec<String>,
}

/// Archive the selected paths of `cache_root`.
///
/// Missing selection roots are skipped. Directories contribute their
/// regular files and symlinks, never directory entries of their own.
///
/// # Errors
///
/// Returns [`PackError::Io`] if the tree cannot be walked or read.
pub fn build_archive(
    cache_root: &CacheRoot,
    selection: &ArchiveSelection,
    codec: Codec,
) -> Result<Archive> {
    let root = cache_root.path().as_std_path();
    let members = collect_members(root, selection)?;

    let mut builder = Builder::new(Vec::new());
    builder.mode(HeaderMode::Deterministic);
    builder.follow_symlinks(false);
    for member in &members {
        builder.append_path_with_name(root.join(member), member)?;
    }
    let tar = builder.into_inner()?;

    let bytes = codec.compress(&tar)?;
    let digest = Sha256Digest::of_bytes(&bytes);
    debug!(
        "archived {} member(s) into {} {codec} bytes, sha256 {digest}",
        members.len(),
        bytes.len()
    );
    Ok(Archive {
        bytes,
        digest,
        codec,
        entries: members,
    })
}

/// Walk the selection roots and return sorted relative member paths.
fn collect_members(root: &Path, selection: &ArchiveSelection) -> Result<Vec<String>> {
    let mut members = Vec::new();
    for relative in selection.roots() {
        let start = root.join(relative);
        if start.symlink_metadata().is_err() {
            debug!("skipping missing archive root {relative}");
            continue;
        }
        for entry in WalkDir::new(&start).sort_by_file_name() {
            let entry = entry.map_err(|e| PackError::Io(e.into()))?;
            let file_type = entry.file_type();
            if !(file_type.is_file() || file_type.is_symlink()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let Some(rel) = rel.to_str() else {
                return Err(PackError::invalid_artifact(format!(
                    "non-UTF-8 path under cache root: {}",
                    rel.display()
                )));
            };
            members.push(rel.to_owned());
        }
    }
    Ok(members)
}

/// Decompress an archive, detecting the codec from its magic bytes.
///
/// # Errors
///
/// Returns [`PackError::InvalidArtifact`] for an unknown codec and
/// [`PackError::Io`] for a corrupt stream.
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut raw = Vec::new();
    match Codec::detect(bytes) {
        Some(Codec::Zstd) => {
            zstd::Decoder::new(Cursor::new(bytes))?.read_to_end(&mut raw)?;
        }
        Some(Codec::Gzip) => {
            GzDecoder::new(Cursor::new(bytes)).read_to_end(&mut raw)?;
        }
        None => {
            return Err(PackError::invalid_artifact(
                "payload is neither zstd nor gzip compressed",
            ));
        }
    }
    Ok(raw)
}

/// Metadata for one archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Relative path inside the archive.
    pub path: String,
    /// Permission bits.
    pub mode: u32,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: u64,
    /// Symlink target, for symlink members.
    pub link_target: Option<String>,
}

impl Member {
    /// Render a `tar -tv`-style line: permissions, size, mtime, path.
    #[must_use]
    pub fn verbose_line(&self) -> String {
        let kind = if self.link_target.is_some() { 'l' } else { '-' };
        let time = chrono::DateTime::from_timestamp(i64::try_from(self.mtime).unwrap_or(0), 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let mut line = format!(
            "{kind}{} {:>10} {time} {}",
            permission_string(self.mode),
            self.size,
            self.path
        );
        if let Some(target) = &self.link_target {
            line.push_str(" -> ");
            line.push_str(target);
        }
        line
    }
}

/// `rwxr-xr-x` rendering of the low nine mode bits.
fn permission_string(mode: u32) -> String {
    const FLAGS: [(u32, char); 9] = [
        (0o400, 'r'),
        (0o200, 'w'),
        (0o100, 'x'),
        (0o040, 'r'),
        (0o020, 'w'),
        (0o010, 'x'),
        (0o004, 'r'),
        (0o002, 'w'),
        (0o001, 'x'),
    ];
    FLAGS
        .iter()
        .map(|&(bit, c)| if mode & bit == 0 { '-' } else { c })
        .collect()
}

/// List the members of a compressed archive.
///
/// # Errors
///
/// See [`decompress`]; malformed tar headers are [`PackError::Io`].
pub fn list_members(bytes: &[u8]) -> Result<Vec<Member>> {
    let raw = decompress(bytes)?;
    let mut archive = tar::Archive::new(Cursor::new(raw));
    let mut members = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let header = entry.header();
        let link_target = if header.entry_type() == EntryType::Symlink {
            entry
                .link_name()?
                .map(|target| target.to_string_lossy().into_owned())
        } else {
            None
        };
        members.push(Member {
            path: entry.path()?.to_string_lossy().into_owned(),
            mode: header.mode()?,
            size: header.size()?,
            mtime: header.mtime()?,
            link_target,
        });
    }
    Ok(members)
}
