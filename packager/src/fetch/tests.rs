//! Unit tests for the dual-architecture fetch.

use super::*;
use crate::arch::ArchPair;
use crate::module_set::ModuleSpec;
use crate::test_utils::{ExpectedCall, StubExecutor, failure_output, stdout_output, success_output};
use rstest::{fixture, rstest};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    root: CacheRoot,
    layout: ArchLayout,
    go: GoTool,
}

#[fixture]
fn fx() -> Fixture {
    let temp = TempDir::new().expect("temp dir");
    let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).expect("utf-8 path");
    let pair = ArchPair::new(arch("amd64"), arch("arm64")).expect("pair");
    Fixture {
        root: CacheRoot::for_set(&dir, "tools"),
        layout: ArchLayout::for_build_host(&pair, &arch("amd64"), "linux"),
        go: GoTool::default(),
        _temp: temp,
    }
}

fn arch(name: &str) -> GoArch {
    GoArch::try_from(name).expect("supported arch")
}

fn set(mode: FetchMode, specs: &[&str]) -> ModuleSet {
    let specs = specs
        .iter()
        .map(|s| s.parse::<ModuleSpec>().expect("valid spec"))
        .collect();
    ModuleSet::new("tools", mode, specs).expect("valid set")
}

#[rstest]
fn binary_only_plans_one_install_per_spec(fx: Fixture) {
    let set = set(FetchMode::BinaryOnly, &["golang.org/x/example/hello", "example.com/cmd@v1.2.0"]);
    let request = FetchRequest {
        set: &set,
        cache_root: &fx.root,
        layout: &fx.layout,
        go: &fx.go,
    };
    let planned = plan_invocations(&request, &arch("arm64")).expect("plan");
    let args: Vec<Vec<&str>> = planned.iter().map(Invocation::arg_strs).collect();
    assert_eq!(
        args,
        vec![
            vec!["install", "golang.org/x/example/hello@latest"],
            vec!["install", "example.com/cmd@v1.2.0"],
        ]
    );
    let first = planned.first().expect("one invocation");
    assert_eq!(first.env_value("GOARCH"), Some("arm64"));
    assert_eq!(first.env_value("GOOS"), Some("linux"));
    assert_eq!(first.env_value("GOPATH"), Some(fx.root.path().as_str()));
    assert_eq!(first.env_value("GOMODCACHE"), Some(fx.root.modcache().as_str()));
    assert!(first.removed_envs.contains(&"GOBIN".to_owned()));
}

#[rstest]
fn explicit_plans_module_downloads(fx: Fixture) {
    let set = set(FetchMode::Explicit, &["golang.org/x/mod@v0.17.0"]);
    let request = FetchRequest {
        set: &set,
        cache_root: &fx.root,
        layout: &fx.layout,
        go: &fx.go,
    };
    let planned = plan_invocations(&request, &arch("amd64")).expect("plan");
    assert_eq!(planned.len(), 1);
    assert_eq!(
        planned.first().expect("one").arg_strs(),
        vec!["mod", "download", "golang.org/x/mod@v0.17.0"]
    );
}

#[rstest]
fn resolved_initialises_scratch_module_once(fx: Fixture) {
    let set = set(FetchMode::Resolved, &["example.com/a@v1.0.0", "example.com/b"]);
    let request = FetchRequest {
        set: &set,
        cache_root: &fx.root,
        layout: &fx.layout,
        go: &fx.go,
    };
    let planned = plan_invocations(&request, &arch("amd64")).expect("plan");
    let args: Vec<Vec<&str>> = planned.iter().map(Invocation::arg_strs).collect();
    assert_eq!(
        args,
        vec![
            vec!["mod", "init", "gomodpack.local/tools"],
            vec!["get", "example.com/a@v1.0.0", "example.com/b@latest"],
            vec!["mod", "download", "all"],
        ]
    );
    assert!(planned.iter().all(|i| i.cwd.as_ref() == Some(&fx.root.work_dir())));

    std::fs::write(fx.root.work_dir().join("go.mod"), "module gomodpack.local/tools\n")
        .expect("write go.mod");
    let replanned = plan_invocations(&request, &arch("arm64")).expect("plan");
    assert_eq!(replanned.len(), 2, "existing go.mod skips init");
}

#[rstest]
fn fetch_runs_other_arch_before_host(fx: Fixture) {
    let set = set(FetchMode::BinaryOnly, &["golang.org/x/example/hello"]);
    let request = FetchRequest {
        set: &set,
        cache_root: &fx.root,
        layout: &fx.layout,
        go: &fx.go,
    };
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let bin = fx.root.bin_dir();

    let mut executor = MockCommandExecutor::new();
    executor.expect_run().times(2).returning(move |invocation| {
        let goarch = invocation.env_value("GOARCH").unwrap_or_default().to_owned();
        let dir = if goarch == "amd64" {
            bin.clone()
        } else {
            bin.join(format!("linux_{goarch}"))
        };
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("hello"), goarch.as_bytes())?;
        recorder.lock().expect("lock").push(goarch);
        Ok(success_output())
    });

    fetch_both(&executor, &request).expect("fetch succeeds");
    assert_eq!(*seen.lock().expect("lock"), vec!["arm64", "amd64"]);
}

#[rstest]
fn failing_invocation_aborts_with_fetch_failed(fx: Fixture) {
    let set = set(FetchMode::BinaryOnly, &["golang.org/x/example/hello"]);
    let request = FetchRequest {
        set: &set,
        cache_root: &fx.root,
        layout: &fx.layout,
        go: &fx.go,
    };
    let executor = StubExecutor::new(vec![ExpectedCall {
        program: "go",
        args: vec!["install", "golang.org/x/example/hello@latest"],
        result: Ok(failure_output("dial tcp: lookup proxy.golang.org: no such host")),
    }]);

    let err = fetch_both(&executor, &request).expect_err("fetch must fail");
    match err {
        PackError::FetchFailed { arch, reason } => {
            assert_eq!(arch, "arm64");
            assert!(reason.contains("no such host"));
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
    executor.assert_finished();
}

#[rstest]
fn empty_fetch_output_is_a_failure(fx: Fixture) {
    let set = set(FetchMode::Explicit, &["golang.org/x/mod@v0.17.0"]);
    let request = FetchRequest {
        set: &set,
        cache_root: &fx.root,
        layout: &fx.layout,
        go: &fx.go,
    };
    let mut executor = MockCommandExecutor::new();
    executor.expect_run().returning(|_| Ok(success_output()));

    let err = fetch_both(&executor, &request).expect_err("nothing was downloaded");
    assert!(matches!(err, PackError::FetchFailed { .. }));
}

#[test]
fn go_env_reads_trimmed_value() {
    let executor = StubExecutor::new(vec![ExpectedCall::go_env("GOVERSION", "go1.22.3")]);
    let version = GoTool::default().version(&executor).expect("version");
    assert_eq!(version, "go1.22.3");
    executor.assert_finished();
}

#[test]
fn missing_go_is_a_configuration_error() {
    let mut executor = MockCommandExecutor::new();
    executor
        .expect_run()
        .returning(|_| Err(PackError::Io(std::io::Error::from(std::io::ErrorKind::NotFound))));
    let err = GoTool::default().version(&executor).expect_err("go is missing");
    assert!(matches!(err, PackError::Configuration { .. }));
}

#[test]
fn empty_go_env_value_is_a_configuration_error() {
    let executor = StubExecutor::new(vec![ExpectedCall {
        program: "go",
        args: vec!["env", "GOHOSTARCH"],
        result: Ok(stdout_output("\n")),
    }]);
    let err = GoTool::default().host_arch(&executor).expect_err("empty value");
    assert!(matches!(err, PackError::Configuration { .. }));
}
