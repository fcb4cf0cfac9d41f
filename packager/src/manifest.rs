//! The tagged, read-only record of a build's resolved module list.
//!
//! A manifest is plain text:
//!
//! ```text
//! 20261019.1
//! 2026-10-19T12:30:05Z
//!
//! golang.org/x/mod v0.17.0
//! golang.org/x/text v0.14.0
//! ```
//!
//! Module lines are `path version` (space-delimited), or just `path` when
//! no version was pinned. Consolidation merges manifests from several
//! builds by dropping the header lines, sorting, and deduplicating.

use crate::cache_root::MANIFESTS_DIR;
use crate::error::Result;
use crate::module_set::ModuleSpec;
use crate::tag::Tag;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeSet;
use std::fs;

/// File extension of a per-build manifest.
pub const MANIFEST_EXTENSION: &str = "manifest";
/// File extension of a consolidated module list.
pub const CONSOLIDATED_EXTENSION: &str = "modules";

/// An immutable record of one build's module list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    set_name: String,
    tag: Tag,
    specs: Vec<ModuleSpec>,
}

impl Manifest {
    /// Create a manifest.
    #[must_use]
    pub fn new(set_name: &str, tag: Tag, specs: Vec<ModuleSpec>) -> Self {
        Self {
            set_name: set_name.to_owned(),
            tag,
            specs,
        }
    }

    /// Return the build tag.
    #[must_use]
    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Return the recorded modules.
    #[must_use]
    pub fn specs(&self) -> &[ModuleSpec] {
        &self.specs
    }

    /// Return the manifest filename, `<set>-<tag>.manifest`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.{MANIFEST_EXTENSION}", self.tag.file_stem(&self.set_name))
    }

    /// Return the path of the manifest inside an archive.
    #[must_use]
    pub fn archive_path(&self) -> String {
        format!("{MANIFESTS_DIR}/{}", self.file_name())
    }

    /// Render the manifest text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = format!("{}\n{}\n\n", self.tag.id(), self.tag.iso_timestamp());
        for spec in &self.specs {
            text.push_str(&spec.manifest_line());
            text.push('\n');
        }
        text
    }

    /// Write the manifest into `dir` and mark it read-only.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written or its
    /// permissions changed.
    pub fn write_to(&self, dir: &Utf8Path) -> Result<Utf8PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        write_read_only(&path, self.render().as_bytes())?;
        Ok(path)
    }
}

/// Write `contents` to `path` and drop all write permission bits.
///
/// A previous read-only file at `path` is replaced.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be replaced or written.
pub fn write_read_only(path: &Utf8Path, contents: &[u8]) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::write(path, contents)?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)?;
    Ok(())
}

/// Return whether `line` is a manifest header (tag id, timestamp, blank).
#[must_use]
pub fn is_header_line(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || is_tag_id(line) || is_iso_timestamp(line)
}

/// `YYYYMMDD.N`
fn is_tag_id(line: &str) -> bool {
    let Some((date, seq)) = line.split_once('.') else {
        return false;
    };
    date.len() == 8
        && date.chars().all(|c| c.is_ascii_digit())
        && !seq.is_empty()
        && seq.chars().all(|c| c.is_ascii_digit())
}

/// `YYYY-MM-DDThh:mm:ssZ`
fn is_iso_timestamp(line: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(line).is_ok()
}

/// Merge several manifests into one sorted, deduplicated module list.
///
/// # Examples
///
/// ```
/// use gomodpack::manifest::consolidate;
///
/// let a = "20261019.1\n2026-10-19T12:00:00Z\n\nexample.com/b v1\nexample.com/a v2\n";
/// let b = "20261020.1\n2026-10-20T08:00:00Z\n\nexample.com/a v2\n";
/// assert_eq!(consolidate([a, b]), "example.com/a v2\nexample.com/b v1\n");
/// ```
#[must_use]
pub fn consolidate<'a, I>(manifests: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let lines: BTreeSet<&str> = manifests
        .into_iter()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !is_header_line(line))
        .collect();
    lines.into_iter().fold(String::new(), |mut text, line| {
        text.push_str(line);
        text.push('\n');
        text
    })
}

/// Return the consolidated list filename for a set, `<set>.modules`.
#[must_use]
pub fn consolidated_file_name(set_name: &str) -> String {
    format!("{set_name}.{CONSOLIDATED_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn tag() -> Tag {
        let ts = Utc
            .with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
            .single()
            .expect("valid time");
        Tag::new(ts, 2)
    }

    fn sample() -> Manifest {
        Manifest::new(
            "tools",
            tag(),
            vec![
                ModuleSpec::new("golang.org/x/mod", Some("v0.17.0".to_owned())),
                ModuleSpec::new("golang.org/x/example/hello", None),
            ],
        )
    }

    #[test]
    fn renders_header_blank_then_module_lines() {
        assert_eq!(
            sample().render(),
            concat!(
                "20261019.2\n",
                "2026-10-19T09:00:00Z\n",
                "\n",
                "golang.org/x/mod v0.17.0\n",
                "golang.org/x/example/hello\n",
            )
        );
    }

    #[test]
    fn filename_embeds_tag() {
        assert_eq!(sample().file_name(), "tools-20261019.2.manifest");
        assert_eq!(sample().archive_path(), "manifests/tools-20261019.2.manifest");
    }

    #[test]
    fn written_manifest_is_read_only() {
        let temp = TempDir::new().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf-8");
        let path = sample().write_to(&dir).expect("write");
        let perms = fs::metadata(&path).expect("metadata").permissions();
        assert!(perms.readonly());
        assert_eq!(fs::read_to_string(&path).expect("read"), sample().render());

        sample().write_to(&dir).expect("rewriting replaces the read-only file");
    }

    #[test]
    fn header_lines_are_recognised() {
        assert!(is_header_line("20261019.2"));
        assert!(is_header_line("2026-10-19T09:00:00Z"));
        assert!(is_header_line("   "));
        assert!(!is_header_line("golang.org/x/mod v0.17.0"));
        assert!(!is_header_line("9fans.net/go v0.0.7"));
    }

    #[test]
    fn consolidation_strips_headers_sorts_and_dedupes() {
        let older = sample().render();
        let newer = Manifest::new(
            "tools",
            Tag::new(tag().timestamp(), 3),
            vec![
                ModuleSpec::new("golang.org/x/mod", Some("v0.17.0".to_owned())),
                ModuleSpec::new("9fans.net/go", Some("v0.0.7".to_owned())),
            ],
        )
        .render();
        assert_eq!(
            consolidate([older.as_str(), newer.as_str()]),
            concat!(
                "9fans.net/go v0.0.7\n",
                "golang.org/x/example/hello\n",
                "golang.org/x/mod v0.17.0\n",
            )
        );
    }
}
