//! Checksum and descriptor sidecars, and atomic publication of a build.
//!
//! Every file of a build is staged as a temporary file inside the
//! destination directory first. Only when all of them are staged are they
//! renamed into place, so an interrupted build never leaves a partial set
//! of distributable files behind.

use crate::digest::Sha256Digest;
use crate::error::Result;
use crate::module_set::{FetchMode, ModuleSpec};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fs;
use std::io::Write;
use tempfile::NamedTempFile;

/// Permission bits of the installer.
pub const EXECUTABLE_MODE: u32 = 0o755;
/// Permission bits of sidecars and archives.
pub const REGULAR_MODE: u32 = 0o644;
/// Permission bits of finalised records.
pub const READ_ONLY_MODE: u32 = 0o444;

/// The `.list` descriptor: intent (requested specifiers) next to outcome
/// (mode, size, digests).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor<'a> {
    /// Fetch mode of the build.
    pub mode: FetchMode,
    /// Installer size in bytes.
    pub size: u64,
    /// Digest of the installer file.
    pub sha256: &'a Sha256Digest,
    /// Digest of the embedded archive.
    pub archive_sha256: &'a Sha256Digest,
    /// Specifiers exactly as requested, before resolution.
    pub requested: &'a [ModuleSpec],
}

impl Descriptor<'_> {
    /// Render the descriptor text.
    ///
    /// # Examples
    ///
    /// ```
    /// use gomodpack::catalog::Descriptor;
    /// use gomodpack::digest::Sha256Digest;
    /// use gomodpack::module_set::{FetchMode, ModuleSpec};
    ///
    /// let digest = Sha256Digest::of_bytes(b"");
    /// let requested = [ModuleSpec::new("golang.org/x/example/hello", None)];
    /// let text = Descriptor {
    ///     mode: FetchMode::BinaryOnly,
    ///     size: 42,
    ///     sha256: &digest,
    ///     archive_sha256: &digest,
    ///     requested: &requested,
    /// }
    /// .render();
    /// assert!(text.starts_with("mode: binary-only\nsize: 42\n"));
    /// assert!(text.ends_with("requested: golang.org/x/example/hello\n"));
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = format!(
            "mode: {}\nsize: {}\nsha256: {}\narchive-sha256: {}\n",
            self.mode, self.size, self.sha256, self.archive_sha256
        );
        for spec in self.requested {
            text.push_str("requested: ");
            text.push_str(&spec.to_string());
            text.push('\n');
        }
        text
    }
}

/// One file to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile {
    /// Filename inside the destination directory.
    pub name: String,
    /// File contents.
    pub contents: Vec<u8>,
    /// Permission bits.
    pub mode: u32,
}

impl PublishedFile {
    /// Create a file entry.
    #[must_use]
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>, mode: u32) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
            mode,
        }
    }
}

/// Stage every file, then move them all into `dest`.
///
/// # Errors
///
/// Returns [`crate::error::PackError::Io`] if the destination cannot be
/// created or a file cannot be staged or renamed. Staging failures leave
/// the destination untouched.
pub fn publish_all(dest: &Utf8Path, files: &[PublishedFile]) -> Result<Vec<Utf8PathBuf>> {
    fs::create_dir_all(dest)?;
    let mut staged = Vec::with_capacity(files.len());
    for file in files {
        let mut temp = NamedTempFile::new_in(dest)?;
        temp.write_all(&file.contents)?;
        temp.as_file().sync_all()?;
        set_mode(temp.path(), file.mode)?;
        staged.push((temp, dest.join(&file.name)));
    }

    let mut published = Vec::with_capacity(staged.len());
    for (temp, path) in staged {
        if fs::symlink_metadata(&path).is_ok() {
            fs::remove_file(&path)?;
        }
        temp.persist(&path).map_err(|e| e.error)?;
        debug!("published {path}");
        published.push(path);
    }
    Ok(published)
}

#[cfg(unix)]
fn set_mode(path: &std::path::Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(path: &std::path::Path, mode: u32) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o222 == 0);
    fs::set_permissions(path, perms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dest() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp.path().join("out")).expect("utf-8");
        (temp, dir)
    }

    #[test]
    fn descriptor_lists_every_requested_specifier() {
        let installer = Sha256Digest::of_bytes(b"installer");
        let archive = Sha256Digest::of_bytes(b"archive");
        let requested = [
            ModuleSpec::new("example.com/a", Some("v1.0.0".to_owned())),
            ModuleSpec::new("example.com/b", None),
        ];
        let text = Descriptor {
            mode: FetchMode::Resolved,
            size: 1234,
            sha256: &installer,
            archive_sha256: &archive,
            requested: &requested,
        }
        .render();
        assert_eq!(
            text,
            format!(
                "mode: resolved\nsize: 1234\nsha256: {installer}\narchive-sha256: {archive}\n\
                 requested: example.com/a@v1.0.0\nrequested: example.com/b\n"
            )
        );
    }

    #[test]
    fn publish_writes_every_file() {
        let (_temp, dir) = dest();
        let published = publish_all(
            &dir,
            &[
                PublishedFile::new("tools.run", "#!/bin/sh\n", EXECUTABLE_MODE),
                PublishedFile::new("tools.run.sha256", "x  tools.run\n", REGULAR_MODE),
            ],
        )
        .expect("publish");
        assert_eq!(published, vec![dir.join("tools.run"), dir.join("tools.run.sha256")]);
        assert_eq!(fs::read_to_string(dir.join("tools.run")).expect("read"), "#!/bin/sh\n");
        let leftovers = fs::read_dir(&dir).expect("read dir").count();
        assert_eq!(leftovers, 2, "no temporary files remain");
    }

    #[cfg(unix)]
    #[rstest]
    #[case::executable(EXECUTABLE_MODE)]
    #[case::regular(REGULAR_MODE)]
    #[case::read_only(READ_ONLY_MODE)]
    fn publish_applies_mode(#[case] mode: u32) {
        use std::os::unix::fs::PermissionsExt;

        let (_temp, dir) = dest();
        publish_all(&dir, &[PublishedFile::new("f", "x", mode)]).expect("publish");
        let actual = fs::metadata(dir.join("f")).expect("meta").permissions().mode();
        assert_eq!(actual & 0o777, mode);
    }

    #[test]
    fn republishing_replaces_read_only_files() {
        let (_temp, dir) = dest();
        publish_all(&dir, &[PublishedFile::new("m", "one", READ_ONLY_MODE)]).expect("first");
        publish_all(&dir, &[PublishedFile::new("m", "two", READ_ONLY_MODE)]).expect("second");
        assert_eq!(fs::read_to_string(dir.join("m")).expect("read"), "two");
    }
}
