//! Shared test utilities for the gomodpack crate.

use crate::error::{PackError, Result};
use crate::fetch::{CommandExecutor, Invocation};
use crate::module_path::encode;
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    stdout_output("")
}

/// Creates a successful command `Output` with the given stdout.
#[must_use]
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The program expected (e.g., "go").
    pub program: &'static str,
    /// The arguments expected.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: Result<Output>,
}

impl ExpectedCall {
    /// Expect `go env NAME` and answer with `value`.
    #[must_use]
    pub fn go_env(name: &'static str, value: &str) -> Self {
        Self {
            program: "go",
            args: vec!["env", name],
            result: Ok(stdout_output(&format!("{value}\n"))),
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Replays expected invocations in order and reports a
/// [`PackError::StubMismatch`] when a call deviates from the script.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let Some(call) = expected.pop_front() else {
            return Err(PackError::StubMismatch {
                message: format!("unexpected invocation of {}", invocation.program),
            });
        };

        if call.program != invocation.program || call.args != invocation.arg_strs() {
            return Err(PackError::StubMismatch {
                message: format!(
                    "expected {} {:?}, got {} {:?}",
                    call.program, call.args, invocation.program, invocation.args
                ),
            });
        }

        call.result
    }
}

/// Version `FakeGo` resolves `latest` to.
pub const FAKE_LATEST: &str = "v1.0.0";

/// A `go` stand-in that writes files where the real toolchain would.
///
/// `install` drops a binary under `$GOPATH/bin` (host architecture) or
/// `$GOPATH/bin/<goos>_<arch>` (any other), `mod download` writes a
/// module zip into the download store, and `mod download all` in a
/// scratch module also pulls every registered transitive dependency.
#[derive(Debug)]
pub struct FakeGo {
    version: String,
    host_arch: String,
    transitive: Vec<(String, String)>,
    failing_arch: Option<String>,
    requested: RefCell<Vec<String>>,
    calls: RefCell<Vec<Invocation>>,
}

impl FakeGo {
    /// A toolchain reporting `version` on a `host_arch` machine.
    #[must_use]
    pub fn new(version: &str, host_arch: &str) -> Self {
        Self {
            version: version.to_owned(),
            host_arch: host_arch.to_owned(),
            transitive: Vec::new(),
            failing_arch: None,
            requested: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Pull `path@version` whenever the full graph is downloaded.
    #[must_use]
    pub fn with_dependency(mut self, path: &str, version: &str) -> Self {
        self.transitive.push((path.to_owned(), version.to_owned()));
        self
    }

    /// Fail every fetch that targets `arch`.
    #[must_use]
    pub fn failing_for(mut self, arch: &str) -> Self {
        self.failing_arch = Some(arch.to_owned());
        self
    }

    /// Every invocation received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    fn fetch(&self, invocation: &Invocation, args: &[&str]) -> Result<Output> {
        let arch = invocation.env_value("GOARCH").unwrap_or(self.host_arch.as_str());
        if self.failing_arch.as_deref() == Some(arch) {
            return Ok(failure_output("go: network is unreachable"));
        }
        let gopath = required_env(invocation, "GOPATH")?;
        let modcache = required_env(invocation, "GOMODCACHE")?;
        match args {
            ["install", query] => {
                let goos = invocation.env_value("GOOS").unwrap_or("linux");
                let mut dir = gopath.join("bin");
                if arch != self.host_arch {
                    dir = dir.join(format!("{goos}_{arch}"));
                }
                let (path, _) = split_query(query);
                let name = path.rsplit('/').next().unwrap_or(path);
                write_file(&dir.join(name), &format!("{path} for {goos}/{arch}\n"))?;
            }
            ["mod", "init", module] => {
                let cwd = invocation.cwd.clone().unwrap_or_else(|| gopath.clone());
                write_file(&cwd.join("go.mod"), &format!("module {module}\n"))?;
            }
            ["get", queries @ ..] => {
                let mut requested = self.requested.borrow_mut();
                for query in queries {
                    if !requested.iter().any(|q| q == query) {
                        requested.push((*query).to_owned());
                    }
                }
            }
            ["mod", "download", "all"] => {
                for query in self.requested.borrow().iter() {
                    let (path, version) = split_query(query);
                    store_module(&modcache, path, version)?;
                }
                for (path, version) in &self.transitive {
                    store_module(&modcache, path, version)?;
                }
            }
            ["mod", "download", query] => {
                let (path, version) = split_query(query);
                store_module(&modcache, path, version)?;
            }
            _ => {
                return Err(PackError::StubMismatch {
                    message: format!("fake go cannot run {args:?}"),
                });
            }
        }
        Ok(success_output())
    }
}

impl CommandExecutor for FakeGo {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        self.calls.borrow_mut().push(invocation.clone());
        let args = invocation.arg_strs();
        match args.as_slice() {
            ["env", "GOVERSION"] => Ok(stdout_output(&format!("{}\n", self.version))),
            ["env", "GOHOSTARCH" | "GOARCH"] => {
                Ok(stdout_output(&format!("{}\n", self.host_arch)))
            }
            other => self.fetch(invocation, other),
        }
    }
}

fn required_env(invocation: &Invocation, key: &str) -> Result<Utf8PathBuf> {
    invocation
        .env_value(key)
        .map(Utf8PathBuf::from)
        .ok_or_else(|| PackError::StubMismatch {
            message: format!("fake go invoked without {key}"),
        })
}

fn split_query(query: &str) -> (&str, &str) {
    match query.split_once('@') {
        Some((path, "latest")) => (path, FAKE_LATEST),
        Some((path, version)) => (path, version),
        None => (query, FAKE_LATEST),
    }
}

fn store_module(modcache: &Utf8Path, path: &str, version: &str) -> Result<()> {
    let escaped = encode(path);
    let version_dir = modcache.join("cache/download").join(&escaped).join("@v");
    let stem = encode(version);
    write_file(&version_dir.join(format!("{stem}.info")), "{}\n")?;
    write_file(&version_dir.join(format!("{stem}.mod")), &format!("module {path}\n"))?;
    write_file(&version_dir.join(format!("{stem}.zip")), &format!("{path}@{version}\n"))?;
    write_file(
        &modcache.join(format!("{escaped}@{stem}")).join("go.mod"),
        &format!("module {path}\n"),
    )
}

fn write_file(path: &Utf8Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(())
}
