//! Named module sets kept in a plain text file.
//!
//! ```text
//! # tools shipped to the build farm
//! [tools]
//! mode = binary-only
//! golang.org/x/tools/gopls@v0.15.3
//! golang.org/x/example/hello
//!
//! [deps]
//! mode = resolved
//! github.com/spf13/cobra@v1.8.0
//! ```
//!
//! Blank lines and `#` comments are ignored. A `[name]` line opens a
//! section; every other line inside it is one specifier, except an
//! optional `mode = <mode>` line.

use crate::error::{PackError, Result};
use crate::module_set::{FetchMode, ModuleSpec};
use camino::Utf8Path;
use std::fs;

/// One `[name]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetEntry {
    /// Section name.
    pub name: String,
    /// Mode from a `mode =` line, if present.
    pub mode: Option<FetchMode>,
    /// Specifiers in file order.
    pub specs: Vec<ModuleSpec>,
}

/// Parsed contents of a set-list file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetList {
    entries: Vec<SetEntry>,
}

impl SetList {
    /// Read and parse a set-list file.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Io`] if the file cannot be read and
    /// [`PackError::SetList`] for malformed lines.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Parse set-list text; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::SetList`] naming the offending line.
    pub fn parse(text: &str, path: &Utf8Path) -> Result<Self> {
        let mut entries: Vec<SetEntry> = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split_once('#').map_or(raw, |(before, _)| before).trim();
            if line.is_empty() {
                continue;
            }
            let fail = |reason: String| PackError::SetList {
                path: path.to_owned(),
                line: index + 1,
                reason,
            };

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim();
                if name.is_empty() {
                    return Err(fail("empty section name".to_owned()));
                }
                if entries.iter().any(|e| e.name == name) {
                    return Err(fail(format!("section [{name}] appears twice")));
                }
                entries.push(SetEntry {
                    name: name.to_owned(),
                    mode: None,
                    specs: Vec::new(),
                });
                continue;
            }

            let Some(entry) = entries.last_mut() else {
                return Err(fail("specifier outside of any [section]".to_owned()));
            };
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() != "mode" {
                    return Err(fail(format!("unknown setting \"{}\"", key.trim())));
                }
                let mode = value.parse().map_err(|e: PackError| fail(e.to_string()))?;
                entry.mode = Some(mode);
                continue;
            }
            let spec = line.parse().map_err(|e: PackError| fail(e.to_string()))?;
            entry.specs.push(spec);
        }
        Ok(Self { entries })
    }

    /// Return the section called `name`.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SetEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Return every section in file order.
    #[must_use]
    pub fn entries(&self) -> &[SetEntry] {
        &self.entries
    }
}
