//! gomodpack CLI entrypoint.
//!
//! `build` packages a module set into a self-extracting installer; the
//! other subcommands read an installer back without running its script.

use chrono::Utc;
use clap::Parser;
use gomodpack::cli::{BuildArgs, Cli, Command, InspectArgs, InstallArgs, VerifyArgs};
use gomodpack::config::{BuildConfig, EnvConfig, FileConfig};
use gomodpack::error::Result;
use gomodpack::fetch::{GoTool, SystemCommandExecutor};
use gomodpack::installer::{Artifact, InstallOptions};
use gomodpack::output::{build_summary, install_summary, write_stderr_line};
use gomodpack::pipeline::{BuildRequest, build_module_set};
use gomodpack::set_list::SetList;
use std::io::Write;

fn main() {
    let cli = Cli::parse();
    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    if stdout.flush().is_err() {
        // Nothing useful left to report on a closed stdout.
    }
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Build(args) => run_build(args, stderr),
        Command::Inspect(args) => run_inspect(args, stdout),
        Command::Install(args) => run_install(args, stderr),
        Command::Verify(args) => run_verify(args, stdout),
    }
}

/// Resolves configuration and the module set, then runs the pipeline.
fn run_build(args: &BuildArgs, stderr: &mut dyn Write) -> Result<()> {
    let (config_path, required) = args.config_file();
    let file = FileConfig::load(&config_path, required)?;
    let config = BuildConfig::resolve(file, EnvConfig::from_env(), args.overrides())?;

    let set_list = args.set_file.as_deref().map(SetList::load).transpose()?;
    let set = args.module_set(set_list.as_ref())?;

    let request = BuildRequest {
        set: &set,
        config: &config,
        clean: args.clean,
        quiet: args.quiet,
        now: Utc::now(),
    };
    let output = build_module_set(&SystemCommandExecutor, &request, stderr)?;

    if !args.quiet {
        write_stderr_line(
            stderr,
            build_summary(
                set.name(),
                &output.tag.id(),
                output.modules.len(),
                &output.installer,
            ),
        );
    }
    Ok(())
}

/// Answers one installer flag from the parsed artifact.
fn run_inspect(args: &InspectArgs, stdout: &mut dyn Write) -> Result<()> {
    let artifact = Artifact::open(&args.artifact)?;
    let command = artifact.spec().dispatch(args.flag.as_deref());
    artifact.respond(command, stdout)
}

/// Detects host facts and installs the artifact's payload.
fn run_install(args: &InstallArgs, stderr: &mut dyn Write) -> Result<()> {
    let artifact = Artifact::open(&args.artifact)?;
    let options = InstallOptions::detect(
        &SystemCommandExecutor,
        &GoTool::new(&args.go),
        args.arch.clone(),
        args.gopath.clone(),
    )?;
    let report = artifact.install(&options)?;
    if !args.quiet {
        write_stderr_line(stderr, install_summary(&report));
    }
    Ok(())
}

/// Prints the payload digest when it matches the embedded one.
fn run_verify(args: &VerifyArgs, stdout: &mut dyn Write) -> Result<()> {
    let digest = Artifact::open(&args.artifact)?.verify()?;
    writeln!(stdout, "{digest}  OK")?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, &err);
            err.exit_code()
        }
    }
}
