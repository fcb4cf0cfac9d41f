//! User-facing progress and summary text.

use crate::installer::InstallReport;
use camino::Utf8Path;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; ignore write failures.
    }
}

/// Format the closing message of a build.
///
/// # Example
///
/// ```
/// use camino::Utf8Path;
/// use gomodpack::output::build_summary;
///
/// let text = build_summary("tools", "20261019.1", 1, Utf8Path::new("dist/tools-20261019.1.run"));
/// assert_eq!(text, "Built tools 20261019.1 with 1 module: dist/tools-20261019.1.run");
/// ```
#[must_use]
pub fn build_summary(set_name: &str, tag: &str, modules: usize, installer: &Utf8Path) -> String {
    let plural = if modules == 1 { "module" } else { "modules" };
    format!("Built {set_name} {tag} with {modules} {plural}: {installer}")
}

/// Format the closing message of an install.
#[must_use]
pub fn install_summary(report: &InstallReport) -> String {
    format!(
        "Installed {} file(s) for {} into {} ({} excluded); module list at {}",
        report.extracted, report.arch, report.gopath, report.excluded, report.consolidated
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::GoArch;
    use camino::Utf8PathBuf;

    #[test]
    fn summary_pluralises_modules() {
        let text = build_summary("deps", "20261019.2", 3, Utf8Path::new("deps.run"));
        assert_eq!(text, "Built deps 20261019.2 with 3 modules: deps.run");
    }

    #[test]
    fn install_summary_names_arch_and_root() {
        let report = InstallReport {
            gopath: Utf8PathBuf::from("/home/dev/go"),
            arch: GoArch::try_from("arm64").expect("arch"),
            extracted: 4,
            excluded: 1,
            consolidated: Utf8PathBuf::from("/home/dev/go/manifests/tools.modules"),
        };
        let text = install_summary(&report);
        assert!(text.contains("for arm64 into /home/dev/go"));
        assert!(text.ends_with("/home/dev/go/manifests/tools.modules"));
    }

    #[test]
    fn write_stderr_line_appends_newline() {
        let mut buffer = Vec::new();
        write_stderr_line(&mut buffer, "hello");
        assert_eq!(buffer, b"hello\n");
    }
}
