//! hotswap CLI: replays scenarios and checks rule files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use hotswap_engine::{RuleCompiler, RuleSet};
use hotswap_foundation::{Error, ErrorKind, Result};
use hotswap_runtime::Scenario;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

// ── CLI ─────────────────────────────────────────────────────────────

/// Hot-swappable rule engine over timestamped events.
#[derive(Parser, Debug)]
#[command(name = "hotswap", version, about)]
struct Cli {
    /// Log at debug level unless `RUST_LOG` is set.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scenario file and check its expectations.
    Run {
        /// Path to the scenario TOML file.
        scenario: PathBuf,
    },
    /// Parse and compile rule files without running them.
    Check {
        /// Rule files to check.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

// ── commands ────────────────────────────────────────────────────────

fn run_scenario(path: &Path) -> Result<()> {
    let scenario = Scenario::from_file(path)?;
    debug!(phases = scenario.phases.len(), "loaded scenario");
    let report = scenario.run()?;
    print!("{report}");
    Ok(())
}

fn check_files(files: &[PathBuf]) -> Result<()> {
    for path in files {
        let source = fs::read_to_string(path).map_err(|e| {
            Error::new(ErrorKind::IoError(format!(
                "failed to read '{}': {e}",
                path.display()
            )))
        })?;
        let rules = RuleCompiler::compile_source(&source)?;
        print!("{}", describe_rules(path, &rules));
    }
    Ok(())
}

/// One header line per file, then one line per rule.
fn describe_rules(path: &Path, rules: &RuleSet) -> String {
    let mut lines = vec![format!(
        "{}: {} v{}, {} rules",
        path.display(),
        rules.package().unwrap_or("<anonymous>"),
        rules.version(),
        rules.len()
    )];
    lines.extend(rules.rules().iter().map(|rule| {
        format!(
            "  {} (salience {}){}",
            rule.name,
            rule.salience,
            if rule.enabled { "" } else { " [disabled]" }
        )
    }));
    lines.iter().map(|line| format!("{line}\n")).collect()
}

// ── main ────────────────────────────────────────────────────────────

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Command::Run { scenario } => run_scenario(scenario),
        Command::Check { files } => check_files(files),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            match &e.context {
                Some(ctx) => eprintln!("error: {e} {ctx}"),
                None => eprintln!("error: {e}"),
            }
            ExitCode::FAILURE
        }
    }
}
