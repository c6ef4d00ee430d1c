//! `dsg`: run and inspect data specification files
//!
//! Usage:
//!
//! ```text
//! dsg [-v] run <SPEC> [--output FILE] [--space BYTES] [--trace]
//! dsg [-v] dump <SPEC>
//! ```

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dataspec_executor::{Executor, ExecutorConfig};
use dataspec_isa::{DataSpecError, DEFAULT_SDRAM_BYTES};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status for errors in the specification itself
const EXIT_SPEC_ERROR: u8 = 1;

/// Exit status for failures reading or writing files
const EXIT_IO_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "dsg", version)]
#[command(about = "Execute data specifications into memory images")]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a specification and write the resulting image
    Run {
        /// Specification file
        spec: PathBuf,

        /// Image file; defaults to the specification path with a `.dat` extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bytes available for the image
        #[arg(long, default_value_t = DEFAULT_SDRAM_BYTES)]
        space: u32,

        /// Print every executed command
        #[arg(long)]
        trace: bool,
    },

    /// Print one line per command
    Dump {
        /// Specification file
        spec: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run {
            spec,
            output,
            space,
            trace,
        } => {
            let output = output.unwrap_or_else(|| default_output(&spec));
            run(&spec, &output, space, trace)
        }
        Command::Dump { spec } => dump(&spec),
    }
}

/// Specification errors exit with 1; everything else is an I/O failure
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<DataSpecError>() {
        Some(spec_error) if !spec_error.is_io() => EXIT_SPEC_ERROR,
        _ => EXIT_IO_ERROR,
    }
}

fn default_output(spec: &Path) -> PathBuf {
    spec.with_extension("dat")
}

fn read_spec(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run(spec_path: &Path, output: &Path, space: u32, trace: bool) -> Result<()> {
    let spec = read_spec(spec_path)?;
    let config = ExecutorConfig::new(space)
        .with_source_name(spec_path.display().to_string())
        .with_trace(trace);

    let result = Executor::new(&spec, config)
        .run()
        .with_context(|| format!("failed to execute {}", spec_path.display()))?;

    if trace {
        let mut stdout = io::stdout().lock();
        for entry in &result.trace {
            writeln!(stdout, "{:08X}. {} ({:#010x})", entry.offset, entry.opcode, entry.word)?;
        }
    }

    for (id, region) in result.regions.iter().enumerate() {
        if let Some(region) = region {
            info!(
                region = id,
                size = region.size,
                written = region.max_write_pointer,
                unfilled = region.unfilled,
                "region"
            );
        }
    }

    fs::write(output, &result.image)
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(
        commands = result.commands_executed,
        bytes = result.image.len(),
        "wrote {}",
        output.display()
    );
    Ok(())
}

fn dump(spec_path: &Path) -> Result<()> {
    let spec = read_spec(spec_path)?;
    let lines = dataspec_disassembler::disassemble(&spec)
        .with_context(|| format!("failed to decode {}", spec_path.display()))?;

    let mut stdout = io::stdout().lock();
    for line in lines {
        writeln!(stdout, "{line}")?;
    }
    Ok(())
}
