//! Test support utilities for gomodpack behavioural tests.
//!
//! Builds run against [`FakeGo`], which writes the files the real `go`
//! toolchain would, inside a per-scenario temporary directory.

use camino::Utf8PathBuf;
use chrono::{DateTime, TimeZone, Utc};
use gomodpack::arch::{ArchPair, GoArch};
use gomodpack::archive::Codec;
use gomodpack::config::BuildConfig;
use gomodpack::error::Result;
use gomodpack::fetch::GoTool;
use gomodpack::module_set::{FetchMode, ModuleSet, ModuleSpec};
use gomodpack::pipeline::{BuildOutput, BuildRequest, build_module_set};
use gomodpack::test_utils::FakeGo;
use tempfile::TempDir;

/// Go version every fake build host and install host reports by default.
pub const GO_VERSION: &str = "go1.22.3";

/// A temporary directory holding a destination, a cache, and a GOPATH.
pub struct Sandbox {
    _temp: TempDir,
    /// UTF-8 path of the temporary directory.
    pub root: Utf8PathBuf,
}

impl Sandbox {
    /// Create an empty sandbox.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf-8 temp path");
        Self { _temp: temp, root }
    }

    /// Build configuration publishing into `<root>/dist`.
    pub fn config(&self) -> BuildConfig {
        BuildConfig {
            go_version: GO_VERSION.to_owned(),
            goos: "linux".to_owned(),
            arches: ArchPair::new(arch("amd64"), arch("arm64")).expect("pair"),
            dest_dir: self.root.join("dist"),
            cache_dir: self.root.join("cache"),
            codec: Codec::Zstd,
            go: GoTool::default(),
            keep_archive: false,
        }
    }
}

/// Parse a supported architecture name.
pub fn arch(name: &str) -> GoArch {
    GoArch::try_from(name).expect("supported arch")
}

/// A fixed build time so tags are predictable.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 15, 0)
        .single()
        .expect("valid time")
}

/// Build a set from wire-form specifiers.
pub fn module_set(name: &str, mode: FetchMode, specs: &[&str]) -> ModuleSet {
    let specs = specs
        .iter()
        .map(|s| s.parse::<ModuleSpec>().expect("valid specifier"))
        .collect();
    ModuleSet::new(name, mode, specs).expect("valid set")
}

/// Run a quiet build at [`fixed_now`].
pub fn build(go: &FakeGo, set: &ModuleSet, config: &BuildConfig) -> Result<BuildOutput> {
    let request = BuildRequest {
        set,
        config,
        clean: false,
        quiet: true,
        now: fixed_now(),
    };
    build_module_set(go, &request, &mut Vec::new())
}
