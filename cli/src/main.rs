//! `launchpatch`: the command-line front end for the launch-site rewriter.
//!
//! Reads a host IR file and a device IR file, runs the rewriter, and writes
//! the patched host IR to a third file. Three required options, no
//! subcommands, no config file: everything the tool needs is a process
//! argument (see `launchpatch-core`'s crate docs for the rewrite itself).

use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

/// Rewrite legacy kernel-launch call sequences into the runtime's calling convention.
#[derive(Parser)]
#[command(name = "launchpatch", version, about)]
struct Args {
    /// Path to the host module's textual IR, as emitted by the frontend.
    #[arg(long, value_name = "PATH")]
    hostrawfile: String,

    /// Path to the device kernel module's textual IR.
    #[arg(long, value_name = "PATH")]
    devicellfile: String,

    /// Path the rewritten host IR is written to.
    #[arg(long, value_name = "PATH")]
    hostpatchedfile: String,

    /// Increase verbosity; may be passed more than once.
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Silence all output but errors.
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(args: &Args) {
    let level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Either input IR failed to parse (exit code 1), or the rewrite itself
/// failed after both inputs parsed cleanly (exit code -1). Kept as a
/// distinct outcome from `run` rather than inferred after the fact, since
/// the CLI's exit codes are a committed part of its contract.
enum Failure {
    InputParse(anyhow::Error),
    Other(anyhow::Error),
}

fn read_module(path: &str) -> Result<launchpatch_ir::Module, Failure> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{path}'"))
        .map_err(Failure::InputParse)?;
    launchpatch_reader::parse_module(&text)
        .with_context(|| format!("failed to parse '{path}'"))
        .map_err(Failure::InputParse)
}

fn run(args: &Args) -> Result<(), Failure> {
    let mut host = read_module(&args.hostrawfile)?;
    let device = read_module(&args.devicellfile)?;
    let device_ir_text = fs::read_to_string(&args.devicellfile)
        .with_context(|| format!("failed to read '{}'", args.devicellfile))
        .map_err(Failure::Other)?;

    launchpatch_core::rewrite_module(&mut host, &device, &device_ir_text)
        .context("failed to rewrite host module")
        .map_err(Failure::Other)?;

    let printed = launchpatch_ir::write::write_module(&host);
    fs::write(&args.hostpatchedfile, printed)
        .with_context(|| format!("failed to write '{}'", args.hostpatchedfile))
        .map_err(Failure::Other)?;

    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(255); // -1: argument-parsing failure
        }
    };
    init_logging(&args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::InputParse(e)) => {
            log::error!("{e:?}");
            ExitCode::from(1)
        }
        Err(Failure::Other(e)) => {
            log::error!("{e:?}");
            ExitCode::from(255) // -1
        }
    }
}
