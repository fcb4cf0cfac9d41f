//! Dual-architecture fetch through the external `go` resolver.
//!
//! The resolver is invoked once per target architecture against one shared
//! [`CacheRoot`]. Runs are strictly sequential: the layout merge depends on
//! the generic `bin/` bucket holding only the most recent run's output.
//! Network retries are the resolver's business; each invocation either
//! succeeds or aborts the build.

use crate::arch::{ArchLayout, GoArch};
use crate::cache_root::CacheRoot;
use crate::error::{PackError, Result};
use crate::module_set::{FetchMode, ModuleSet};
use camino::Utf8PathBuf;
use log::{debug, info};
use std::process::{Command, Output};
use walkdir::WalkDir;

/// A fully described external command: program, arguments, environment,
/// and working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Environment variables set for the child.
    pub envs: Vec<(String, String)>,
    /// Environment variables removed from the child.
    pub removed_envs: Vec<String>,
    /// Working directory, or the caller's when absent.
    pub cwd: Option<Utf8PathBuf>,
}

impl Invocation {
    /// Create an invocation with no extra environment.
    #[must_use]
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_owned(),
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.envs.push((key.to_owned(), value.into()));
        self
    }

    /// Remove an inherited environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: &str) -> Self {
        self.removed_envs.push(key.to_owned());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Return the value this invocation sets for `key`, if any.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.envs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Return the argument list as string slices.
    #[must_use]
    pub fn arg_strs(&self) -> Vec<&str> {
        self.args.iter().map(String::as_str).collect()
    }
}

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs the invocation and returns its captured output.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning the command.
    fn run(&self, invocation: &Invocation) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        for key in &invocation.removed_envs {
            command.env_remove(key);
        }
        command.envs(invocation.envs.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        command.output().map_err(PackError::from)
    }
}

/// The `go` toolchain as seen through a [`CommandExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoTool {
    program: String,
}

impl Default for GoTool {
    fn default() -> Self {
        Self::new("go")
    }
}

impl GoTool {
    /// Use `program` as the `go` executable.
    #[must_use]
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_owned(),
        }
    }

    /// Return the program name or path.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Read one variable with `go env NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`PackError::Configuration`] when `go` cannot be run or
    /// reports an empty value; the build cannot start without it.
    pub fn env_var(&self, executor: &dyn CommandExecutor, name: &str) -> Result<String> {
        let invocation = Invocation::new(&self.program, ["env", name]);
        let output = executor.run(&invocation).map_err(|e| {
            PackError::configuration(format!("cannot run `{} env {name}`: {e}", self.program))
        })?;
        if !output.status.success() {
            return Err(PackError::configuration(format!(
                "`{} env {name}` failed: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if value.is_empty() {
            return Err(PackError::configuration(format!(
                "`{} env {name}` returned nothing",
                self.program
            )));
        }
        Ok(value)
    }

    /// Return the toolchain version, e.g. `go1.22.3`.
    ///
    /// # Errors
    ///
    /// See [`GoTool::env_var`].
    pub fn version(&self, executor: &dyn CommandExecutor) -> Result<String> {
        self.env_var(executor, "GOVERSION")
    }

    /// Return the architecture `go` builds natively on this host.
    ///
    /// # Errors
    ///
    /// See [`GoTool::env_var`]; unknown architectures are rejected too.
    pub fn host_arch(&self, executor: &dyn CommandExecutor) -> Result<GoArch> {
        GoArch::try_from(self.env_var(executor, "GOHOSTARCH")?)
    }
}

/// Everything one dual-architecture fetch needs.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    /// The set being fetched.
    pub set: &'a ModuleSet,
    /// The shared cache root.
    pub cache_root: &'a CacheRoot,
    /// Architecture layout for this build.
    pub layout: &'a ArchLayout,
    /// The resolver.
    pub go: &'a GoTool,
}

/// Run the resolver for both architectures, other first and host last.
///
/// # Errors
///
/// Returns [`PackError::FetchFailed`] if any invocation fails or the cache
/// root holds no content afterwards. The cache is left as-is for diagnosis.
pub fn fetch_both(executor: &dyn CommandExecutor, request: &FetchRequest<'_>) -> Result<()> {
    request.cache_root.prepare()?;
    for arch in request.layout.fetch_order() {
        fetch_for_arch(executor, request, arch)?;
    }
    ensure_content(request)
}

/// Run every invocation of one architecture's fetch.
fn fetch_for_arch(
    executor: &dyn CommandExecutor,
    request: &FetchRequest<'_>,
    arch: &GoArch,
) -> Result<()> {
    info!(
        "fetching {} module(s) of set {} for {}/{arch}",
        request.set.specs().len(),
        request.set.name(),
        request.layout.goos()
    );
    for invocation in plan_invocations(request, arch)? {
        run_checked(executor, &invocation, arch)?;
    }
    Ok(())
}

/// Build the resolver invocations for one architecture.
///
/// # Errors
///
/// Returns an I/O error if the scratch module directory cannot be created.
pub fn plan_invocations(request: &FetchRequest<'_>, arch: &GoArch) -> Result<Vec<Invocation>> {
    let root = request.cache_root;
    let go = request.go.program();
    let base = |args: Vec<String>| {
        Invocation::new(go, args)
            .env("GOPATH", root.path().as_str())
            .env("GOMODCACHE", root.modcache().as_str())
            .env("GOFLAGS", "-modcacherw")
            .env("GOTOOLCHAIN", "local")
            .env("CGO_ENABLED", "0")
            .env("GOOS", request.layout.goos())
            .env("GOARCH", arch.as_str())
            .env_remove("GOBIN")
            .current_dir(root.path())
    };
    let queries = || request.set.specs().iter().map(|spec| spec.query());

    let invocations = match request.set.mode() {
        FetchMode::BinaryOnly => queries()
            .map(|q| base(vec!["install".to_owned(), q]))
            .collect(),
        FetchMode::Explicit => queries()
            .map(|q| base(vec!["mod".to_owned(), "download".to_owned(), q]))
            .collect(),
        FetchMode::Resolved => {
            let work = root.work_dir();
            std::fs::create_dir_all(&work)?;
            let mut planned = Vec::new();
            if !work.join("go.mod").is_file() {
                let module = format!("gomodpack.local/{}", request.set.name());
                planned.push(base(vec!["mod".to_owned(), "init".to_owned(), module]).current_dir(&work));
            }
            let mut get = vec!["get".to_owned()];
            get.extend(queries());
            planned.push(base(get).current_dir(&work));
            planned.push(
                base(vec!["mod".to_owned(), "download".to_owned(), "all".to_owned()])
                    .current_dir(&work),
            );
            planned
        }
    };
    Ok(invocations)
}

/// Run one invocation, mapping any failure onto [`PackError::FetchFailed`].
fn run_checked(executor: &dyn CommandExecutor, invocation: &Invocation, arch: &GoArch) -> Result<()> {
    debug!("running {} {}", invocation.program, invocation.args.join(" "));
    let output = executor.run(invocation).map_err(|e| PackError::FetchFailed {
        arch: arch.to_string(),
        reason: format!("cannot run {}: {e}", invocation.program),
    })?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(PackError::FetchFailed {
        arch: arch.to_string(),
        reason: format!(
            "`{} {}` exited with {}: {}",
            invocation.program,
            invocation.args.join(" "),
            output.status,
            stderr.trim()
        ),
    })
}

/// Check that the fetches left something to package.
fn ensure_content(request: &FetchRequest<'_>) -> Result<()> {
    let dir = match request.set.mode() {
        FetchMode::BinaryOnly => request.cache_root.bin_dir(),
        FetchMode::Explicit | FetchMode::Resolved => request.cache_root.download_dir(),
    };
    let has_files = WalkDir::new(&dir)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .any(|entry| entry.file_type().is_file());
    if has_files {
        Ok(())
    } else {
        Err(PackError::FetchFailed {
            arch: request.layout.host().to_string(),
            reason: format!("resolver produced no content under {dir}"),
        })
    }
}

#[cfg(test)]
mod tests;
