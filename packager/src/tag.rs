//! Build tags: a date plus a per-day sequence number.
//!
//! Tags are appended to every emitted filename so repeated builds of the
//! same set never collide.

use crate::error::{PackError, Result};
use camino::Utf8Path;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::fs;

/// Identifies one build of one module set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    date: String,
    sequence: u32,
    timestamp: DateTime<Utc>,
}

impl Tag {
    /// Create a tag for `timestamp` with an explicit sequence number.
    #[must_use]
    pub fn new(timestamp: DateTime<Utc>, sequence: u32) -> Self {
        Self {
            date: timestamp.format("%Y%m%d").to_string(),
            sequence,
            timestamp,
        }
    }

    /// Choose the next free tag for `set_name` on the day of `now`.
    ///
    /// Every directory in `search_dirs` is scanned for names of the form
    /// `<set>-<YYYYMMDD>.<seq>...`; the new sequence is one past the
    /// highest found, starting at 1. Missing directories are skipped.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if an existing directory cannot be read.
    pub fn next(set_name: &str, now: DateTime<Utc>, search_dirs: &[&Utf8Path]) -> Result<Self> {
        let candidate = Self::new(now, 1);
        let prefix = format!("{set_name}-{}.", candidate.date);
        let mut highest = 0;
        for dir in search_dirs {
            if !dir.is_dir() {
                continue;
            }
            for entry in fs::read_dir(dir)? {
                let name = entry?.file_name();
                if let Some(seq) = name.to_str().and_then(|n| sequence_after(n, &prefix)) {
                    highest = highest.max(seq);
                }
            }
        }
        Ok(Self::new(now, highest.saturating_add(1)))
    }

    /// Rebuild a tag from its id and ISO timestamp, as baked into an
    /// installer.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::InvalidArtifact`] if either part is malformed
    /// or the id's date disagrees with the timestamp.
    pub fn parse(id: &str, iso_timestamp: &str) -> Result<Self> {
        let timestamp = DateTime::parse_from_rfc3339(iso_timestamp)
            .map_err(|e| {
                PackError::invalid_artifact(format!("bad build timestamp \"{iso_timestamp}\": {e}"))
            })?
            .with_timezone(&Utc);
        let (date, sequence) = id
            .split_once('.')
            .ok_or_else(|| PackError::invalid_artifact(format!("bad build tag \"{id}\"")))?;
        let sequence = sequence
            .parse()
            .map_err(|_| PackError::invalid_artifact(format!("bad build tag \"{id}\"")))?;
        let tag = Self::new(timestamp, sequence);
        if tag.date != date {
            return Err(PackError::invalid_artifact(format!(
                "build tag {id} does not match timestamp {iso_timestamp}"
            )));
        }
        Ok(tag)
    }

    /// Return the tag id, e.g. `20261019.2`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}.{}", self.date, self.sequence)
    }

    /// Return the build time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Return the build time as ISO 8601 (`YYYY-MM-DDThh:mm:ssZ`).
    #[must_use]
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Return `<set>-<id>`, the stem shared by every emitted file.
    #[must_use]
    pub fn file_stem(&self, set_name: &str) -> String {
        format!("{set_name}-{}", self.id())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Parse the sequence number following `prefix` in `name`.
fn sequence_after(name: &str, prefix: &str) -> Option<u32> {
    let rest = name.strip_prefix(prefix)?;
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    let tail = rest.get(digits.len()..)?;
    if digits.is_empty() || !(tail.is_empty() || tail.starts_with('.')) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 30, 5)
            .single()
            .expect("valid time")
    }

    #[test]
    fn formats_id_and_timestamp() {
        let tag = Tag::new(noon(), 3);
        assert_eq!(tag.id(), "20261019.3");
        assert_eq!(tag.iso_timestamp(), "2026-10-19T12:30:05Z");
        assert_eq!(tag.file_stem("tools"), "tools-20261019.3");
    }

    #[test]
    fn first_build_of_the_day_is_sequence_one() {
        let temp = TempDir::new().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf-8");
        let tag = Tag::next("tools", noon(), &[&dir]).expect("tag");
        assert_eq!(tag.id(), "20261019.1");
    }

    #[test]
    fn sequence_advances_past_existing_files() {
        let temp = TempDir::new().expect("temp dir");
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf-8");
        for name in [
            "tools-20261019.1.run",
            "tools-20261019.4.manifest",
            "tools-20261018.9.run",
            "other-20261019.7.run",
            "tools-20261019.x.run",
        ] {
            fs::write(dir.join(name), b"").expect("write");
        }
        let tag = Tag::next("tools", noon(), &[&dir, Utf8Path::new("/nonexistent")])
            .expect("tag");
        assert_eq!(tag.id(), "20261019.5");
    }

    #[test]
    fn parse_rebuilds_a_rendered_tag() {
        let tag = Tag::new(noon(), 4);
        let parsed = Tag::parse(&tag.id(), &tag.iso_timestamp()).expect("parse");
        assert_eq!(parsed, tag);
    }

    #[test]
    fn parse_rejects_date_disagreement() {
        let err = Tag::parse("20261018.1", "2026-10-19T12:30:05Z").expect_err("mismatch");
        assert!(matches!(err, PackError::InvalidArtifact { .. }));
    }

    #[test]
    fn sequence_requires_a_dot_or_end_after_digits() {
        assert_eq!(sequence_after("tools-20261019.12.run", "tools-20261019."), Some(12));
        assert_eq!(sequence_after("tools-20261019.12", "tools-20261019."), Some(12));
        assert_eq!(sequence_after("tools-20261019.12x", "tools-20261019."), None);
    }
}
