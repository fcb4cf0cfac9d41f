//! End-to-end CLI behaviour tests for `gomodpack`.
//!
//! These scenarios invoke the binary, and where bash and the archive tools
//! are available the generated installer script itself, and validate exit
//! codes, output, and the installed tree.

mod support;

use camino::Utf8PathBuf;
use gomodpack::archive::Codec;
use gomodpack::digest::Sha256Digest;
use gomodpack::installer::PAYLOAD_MARKER;
use gomodpack::module_set::FetchMode;
use gomodpack::test_utils::FakeGo;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Output};
use support::{Sandbox, build, module_set};

#[derive(Default)]
struct ScriptRun {
    info: Option<Output>,
    extract: Option<Output>,
    install: Option<Output>,
}

struct CliWorld {
    sandbox: Sandbox,
    installer: Option<Utf8PathBuf>,
    output: Option<Output>,
    script: ScriptRun,
    skipped: bool,
}

#[fixture]
fn world() -> CliWorld {
    CliWorld {
        sandbox: Sandbox::new(),
        installer: None,
        output: None,
        script: ScriptRun::default(),
        skipped: false,
    }
}

fn gomodpack(world: &CliWorld, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_gomodpack"))
        .args(args)
        .current_dir(&world.sandbox.root)
        .env_remove("GOMODPACK_GO_VERSION")
        .env_remove("GOMODPACK_DEST_DIR")
        .env_remove("GOMODPACK_CACHE_DIR")
        .output()
        .expect("failed to run gomodpack")
}

fn installer(world: &CliWorld) -> &str {
    world.installer.as_ref().expect("installer built").as_str()
}

fn output(world: &CliWorld) -> &Output {
    world.output.as_ref().expect("command ran")
}

/// Report whether every program in `tools` resolves on `PATH`.
fn has_tools(tools: &[&str]) -> bool {
    Command::new("bash")
        .args([
            "-c",
            r#"for tool; do command -v "$tool" >/dev/null || exit 1; done"#,
            "has_tools",
        ])
        .args(tools)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn gopath(world: &CliWorld) -> Utf8PathBuf {
    world.sandbox.root.join("gopath")
}

/// Write a `go` stand-in answering the three `go env` queries the
/// installer script makes.
fn write_fake_go(world: &CliWorld, arch: &str, version: &str) -> Utf8PathBuf {
    let dir = world.sandbox.root.join("fake-bin");
    fs::create_dir_all(&dir).expect("fake bin dir");
    let script = format!(
        "#!/usr/bin/env bash\n\
         case \"$1 $2\" in\n\
         \x20   'env GOVERSION') echo '{version}' ;;\n\
         \x20   'env GOARCH') echo '{arch}' ;;\n\
         \x20   'env GOPATH') echo '{gopath}' ;;\n\
         \x20   *) echo \"unexpected go $*\" >&2; exit 1 ;;\n\
         esac\n",
        gopath = gopath(world),
    );
    let go = dir.join("go");
    fs::write(&go, script).expect("write fake go");
    fs::set_permissions(&go, fs::Permissions::from_mode(0o755)).expect("chmod fake go");
    dir
}

fn script_install(world: &CliWorld) -> &Output {
    world.script.install.as_ref().expect("script install ran")
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("an empty working directory")]
fn given_empty_dir(world: &mut CliWorld) {
    assert_eq!(fs::read_dir(&world.sandbox.root).expect("read dir").count(), 0);
}

#[given("a built installer")]
fn given_built_installer(world: &mut CliWorld) {
    let go = FakeGo::new(support::GO_VERSION, "amd64");
    let set = module_set("tools", FetchMode::BinaryOnly, &["golang.org/x/example/hello"]);
    let output = build(&go, &set, &world.sandbox.config()).expect("build");
    world.installer = Some(output.installer);
}

#[given("one payload character is changed")]
fn given_tampered(world: &mut CliWorld) {
    let path = installer(world).to_owned();
    let text = fs::read_to_string(&path).expect("read installer");
    let marker_line = format!("\n{PAYLOAD_MARKER}\n");
    let body = text.find(&marker_line).expect("payload marker line") + marker_line.len();
    let at = body + 10;
    let original = text.get(at..=at).expect("payload character");
    let replacement = if original == "A" { "B" } else { "A" };
    let tampered = format!(
        "{}{replacement}{}",
        text.get(..at).expect("head"),
        text.get(at + 1..).expect("tail")
    );
    fs::write(&path, tampered).expect("write installer");
}

#[given("a gzip installer built on an \"{host}\" host")]
fn given_gzip_installer(world: &mut CliWorld, host: String) {
    let go = FakeGo::new(support::GO_VERSION, &host);
    let set = module_set("tools", FetchMode::BinaryOnly, &["golang.org/x/example/hello"]);
    let mut config = world.sandbox.config();
    config.codec = Codec::Gzip;
    let output = build(&go, &set, &config).expect("build");
    world.installer = Some(output.installer);
}

#[when("gomodpack is run with \"{args}\"")]
fn when_run(world: &mut CliWorld, args: String) {
    let args: Vec<&str> = args.split_whitespace().collect();
    world.output = Some(gomodpack(world, &args));
}

#[when("gomodpack inspects the installer with \"{flag}\"")]
fn when_inspected(world: &mut CliWorld, flag: String) {
    let path = installer(world).to_owned();
    world.output = Some(gomodpack(world, &["inspect", path.as_str(), flag.as_str()]));
}

#[when("gomodpack verifies the installer")]
fn when_verified(world: &mut CliWorld) {
    let path = installer(world).to_owned();
    world.output = Some(gomodpack(world, &["verify", path.as_str()]));
}

#[when("the installer script is run with \"{info}\" and \"{extract}\"")]
fn when_script_run(world: &mut CliWorld, info: String, extract: String) {
    if !has_tools(&["bash", "base64", "awk"]) {
        world.skipped = true;
        rstest_bdd::skip!("bash and base64 are required to run the generated script");
    }
    let path = installer(world).to_owned();
    let run = |flag: &str| {
        Command::new("bash")
            .arg(&path)
            .arg(flag)
            .output()
            .expect("failed to run installer script")
    };
    world.script.info = Some(run(&info));
    world.script.extract = Some(run(&extract));
}

#[when("the installer script installs on an \"{arch}\" host with \"{version}\"")]
fn when_script_installs(world: &mut CliWorld, arch: String, version: String) {
    if !has_tools(&["bash", "base64", "awk", "tar", "gzip", "grep", "sort"]) {
        world.skipped = true;
        rstest_bdd::skip!("bash and the archive tools are required to run the generated script");
    }
    let fake_bin = write_fake_go(world, &arch, &version);
    let path = std::env::var("PATH").unwrap_or_default();
    let output = Command::new("bash")
        .arg(installer(world))
        .current_dir(&world.sandbox.root)
        .env("PATH", format!("{fake_bin}:{path}"))
        .output()
        .expect("failed to run installer script");
    world.script.install = Some(output);
}

#[then("the exit code is {code}")]
fn then_exit_code(world: &mut CliWorld, code: i32) {
    let out = output(world);
    assert_eq!(
        out.status.code(),
        Some(code),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[then("stderr mentions \"{text}\"")]
fn then_stderr_mentions(world: &mut CliWorld, text: String) {
    let stderr = String::from_utf8_lossy(&output(world).stderr).into_owned();
    assert!(stderr.contains(&text), "stderr: {stderr}");
}

#[then("stdout is \"{expected}\"")]
fn then_stdout_is(world: &mut CliWorld, expected: String) {
    let stdout = String::from_utf8_lossy(&output(world).stdout).into_owned();
    assert_eq!(stdout, format!("{expected}\n"));
}

#[then("stdout ends with \"{suffix}\"")]
fn then_stdout_ends_with(world: &mut CliWorld, suffix: String) {
    let stdout = String::from_utf8_lossy(&output(world).stdout).into_owned();
    assert!(stdout.trim_end().ends_with(&suffix), "stdout: {stdout}");
}

#[then("the script exits with {code}")]
fn then_script_exits(world: &mut CliWorld, code: i32) {
    if world.skipped {
        return;
    }
    let out = script_install(world);
    assert_eq!(
        out.status.code(),
        Some(code),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

#[then("the script stderr mentions \"{text}\"")]
fn then_script_stderr_mentions(world: &mut CliWorld, text: String) {
    if world.skipped {
        return;
    }
    let stderr = String::from_utf8_lossy(&script_install(world).stderr).into_owned();
    assert!(stderr.contains(&text), "stderr: {stderr}");
}

#[then("the installed hello binary was built for \"{arch}\"")]
fn then_installed_binary(world: &mut CliWorld, arch: String) {
    if world.skipped {
        return;
    }
    let binary = gopath(world).join("bin/hello");
    let contents = fs::read_to_string(&binary).expect("flat binary");
    assert_eq!(contents, format!("golang.org/x/example/hello for linux/{arch}\n"));
}

#[then("no architecture bucket remains in the installed bin directory")]
fn then_no_installed_buckets(world: &mut CliWorld) {
    if world.skipped {
        return;
    }
    let bin = gopath(world).join("bin");
    for entry in fs::read_dir(&bin).expect("bin dir") {
        let entry = entry.expect("entry");
        assert!(
            entry.file_type().expect("file type").is_file(),
            "unexpected directory {:?} under {bin}",
            entry.file_name()
        );
    }
}

#[then("the installed module list for \"{set}\" is \"{expected}\"")]
fn then_installed_list(world: &mut CliWorld, set: String, expected: String) {
    if world.skipped {
        return;
    }
    let list = gopath(world).join(format!("manifests/{set}.modules"));
    assert_eq!(
        fs::read_to_string(&list).expect("module list"),
        format!("{expected}\n")
    );
}

#[then("the installed module list for \"{set}\" is read-only")]
fn then_installed_list_read_only(world: &mut CliWorld, set: String) {
    if world.skipped {
        return;
    }
    let list = gopath(world).join(format!("manifests/{set}.modules"));
    let mode = fs::metadata(&list).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o444);
}

#[then("the script installed nothing")]
fn then_script_installed_nothing(world: &mut CliWorld) {
    if world.skipped {
        return;
    }
    assert!(!gopath(world).exists());
}

#[then("the script info digest matches its extracted bytes")]
fn then_script_digest_matches(world: &mut CliWorld) {
    if world.skipped {
        return;
    }
    let info = world.script.info.as_ref().expect("info ran");
    let extract = world.script.extract.as_ref().expect("extract ran");
    assert!(info.status.success(), "{}", String::from_utf8_lossy(&info.stderr));
    assert!(extract.status.success(), "{}", String::from_utf8_lossy(&extract.stderr));

    let info = String::from_utf8_lossy(&info.stdout).into_owned();
    let mut lines = info.lines();
    assert_eq!(lines.next(), Some("2026-10-19T09:15:00Z"));
    assert_eq!(
        lines.next(),
        Some(Sha256Digest::of_bytes(&extract.stdout).as_str())
    );
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/cli.feature",
    name = "Building without an expected go version is a configuration error"
)]
fn scenario_missing_go_version(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "Inspect prints the embedded module list"
)]
fn scenario_inspect_modules(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "Inspect rejects an unknown flag with usage"
)]
fn scenario_inspect_usage(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "Verify accepts an untouched installer"
)]
fn scenario_verify_ok(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "Verify rejects a tampered payload"
)]
fn scenario_verify_tampered(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "The generated script reports a digest matching its extracted archive"
)]
fn scenario_script_digest(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "The generated script flattens the install host's bucket"
)]
fn scenario_script_install(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "The generated script refuses a different go version"
)]
fn scenario_script_version_mismatch(world: CliWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/cli.feature",
    name = "The generated script refuses an architecture it does not carry"
)]
fn scenario_script_unsupported_arch(world: CliWorld) {
    let _ = world;
}
