//! Command-line host for the stepwise emulation session.
//!
//! This binary drives a session from the terminal. It provides:
//! 1. **Run:** Assemble a source file into the text section and single-step or free-run it.
//! 2. **Asm:** Print the address, bytes and text of every assembled instruction.
//! 3. **Disasm:** Disassemble a raw little-endian binary.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{fs, process, thread};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stepwise_core::arch::{Architecture, RiscV64};
use stepwise_core::common::constants::TEXT_BASE;
use stepwise_core::session::ThreadedRunner;
use stepwise_core::stats::StatsSnapshot;
use stepwise_core::{Config, Context, EmulatorState, Session};

#[derive(Parser, Debug)]
#[command(
    name = "stepwise",
    author,
    version,
    about = "Assemble-and-step RV64 emulation workbench",
    long_about = "Lay out memory, assemble a snippet, then single-step or free-run it.\n\nExamples:\n  stepwise run snippet.s\n  stepwise run snippet.s --step --max-steps 20\n  stepwise asm snippet.s --base 0x4000\n  stepwise disasm code.bin"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Assemble and execute a source file, then print the registers.
    Run {
        /// Assembly source file.
        file: PathBuf,

        /// Execute one instruction per run request.
        #[arg(long)]
        step: bool,

        /// JSON configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Upper bound on the number of steps in step mode.
        #[arg(long, default_value_t = 10_000)]
        max_steps: usize,

        /// Stop a free run after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Print the final state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Assemble a source file and list the instructions.
    Asm {
        /// Assembly source file.
        file: PathBuf,

        /// Address of the first instruction.
        #[arg(long, default_value_t = TEXT_BASE, value_parser = parse_address)]
        base: u64,
    },

    /// Disassemble a raw binary.
    Disasm {
        /// Binary file.
        file: PathBuf,

        /// Load address of the first byte.
        #[arg(long, default_value_t = TEXT_BASE, value_parser = parse_address)]
        base: u64,
    },
}

/// Final session state printed by `run --json`.
#[derive(Serialize)]
struct Report {
    state: EmulatorState,
    steps: usize,
    registers: Vec<RegisterValue>,
    stats: StatsSnapshot,
    fault: Option<String>,
}

#[derive(Serialize)]
struct RegisterValue {
    name: &'static str,
    value: u64,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            step,
            config,
            max_steps,
            timeout_ms,
            json,
        } => cmd_run(&file, step, config.as_deref(), max_steps, timeout_ms, json),
        Commands::Asm { file, base } => cmd_asm(&file, base),
        Commands::Disasm { file, base } => cmd_disasm(&file, base),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_address(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{text}': {e}"))
}

fn read_text(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))
}

fn cmd_run(
    file: &Path,
    step: bool,
    config: Option<&Path>,
    max_steps: usize,
    timeout_ms: Option<u64>,
    json: bool,
) -> Result<(), String> {
    let mut config = match config {
        Some(path) => Config::from_json(&read_text(path)?).map_err(|e| e.to_string())?,
        None => Config::default(),
    };
    if step {
        config.general.step_mode = true;
    }
    let step_mode = config.general.step_mode;
    info!(file = %file.display(), step_mode, "starting session");

    let mut session = Session::new(Context::riscv64(config)).map_err(|e| e.to_string())?;
    if !step_mode && timeout_ms.is_some() {
        session = session.with_runner(ThreadedRunner::new());
    }
    session.set_source(read_text(file)?);

    let mut steps = 0;
    let outcome = if step_mode {
        step_until_finished(&mut session, max_steps, &mut steps)
    } else {
        free_run(&mut session, timeout_ms)
    };
    let fault = outcome.err();

    print_report(&mut session, steps, fault.clone(), json)?;
    fault.map_or(Ok(()), Err)
}

fn step_until_finished(session: &mut Session, max_steps: usize, steps: &mut usize) -> Result<(), String> {
    while session.state() != EmulatorState::Finished && *steps < max_steps {
        session
            .transition_to(EmulatorState::Running)
            .map_err(|e| e.to_string())?;
        *steps += 1;
    }
    if session.state() != EmulatorState::Finished {
        return Err(format!("stopped after {max_steps} steps without reaching the end"));
    }
    Ok(())
}

fn free_run(session: &mut Session, timeout_ms: Option<u64>) -> Result<(), String> {
    session
        .transition_to(EmulatorState::Running)
        .map_err(|e| e.to_string())?;
    let Some(timeout) = timeout_ms.map(Duration::from_millis) else {
        return Ok(());
    };

    let deadline = Instant::now() + timeout;
    while session.is_busy() {
        if session.poll().map_err(|e| e.to_string())? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            session.stop().map_err(|e| e.to_string())?;
            let _ = session.wait().map_err(|e| e.to_string())?;
            return Err(format!("free run stopped after {timeout:?}"));
        }
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn print_report(session: &mut Session, steps: usize, fault: Option<String>, json: bool) -> Result<(), String> {
    let names: Vec<&'static str> = session.registers().names().collect();
    let mut registers = Vec::with_capacity(names.len());
    for name in names {
        let value = session.register(name).map_err(|e| e.to_string())?;
        registers.push(RegisterValue { name, value });
    }

    let report = Report {
        state: session.state(),
        steps,
        registers,
        stats: session.stats(),
        fault,
    };

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{text}");
        return Ok(());
    }

    println!("state: {}  steps: {}", report.state, report.steps);
    for chunk in report.registers.chunks(4) {
        let line: Vec<String> = chunk
            .iter()
            .map(|r| format!("{:>4} = {:#018x}", r.name, r.value))
            .collect();
        println!("{}", line.join("  "));
    }
    println!();
    println!("{}", report.stats);
    Ok(())
}

fn cmd_asm(file: &Path, base: u64) -> Result<(), String> {
    let source = read_text(file)?;
    let insns = RiscV64::new()
        .assemble(&source, base)
        .map_err(|e| format!("{}: {e}", file.display()))?;
    for insn in &insns {
        println!("{insn}");
    }
    Ok(())
}

fn cmd_disasm(file: &Path, base: u64) -> Result<(), String> {
    let code = fs::read(file).map_err(|e| format!("cannot read {}: {e}", file.display()))?;
    let arch = RiscV64::new();
    let mut decoded = 0usize;
    for insn in arch.disassemble(&code, base) {
        println!("{insn}");
        decoded += insn.len();
    }
    if decoded < code.len() {
        eprintln!("stopped at undecodable bytes at {:#x}", base + decoded as u64);
    }
    Ok(())
}
