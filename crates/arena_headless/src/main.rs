//! Headless arena runner.
//!
//! Runs combat rounds without graphics for balance testing and CI.
//!
//! # Usage
//!
//! ```bash
//! # Play a scenario and print the JSON report
//! cargo run -p arena_headless -- run --scenario scenarios/duel.ron
//!
//! # Play every scenario in a directory
//! cargo run -p arena_headless -- batch --dir scenarios --output results/batch.json
//!
//! # Check a tuning file
//! cargo run -p arena_headless -- validate --config tuning.ron
//!
//! # Verify a scenario replays identically
//! cargo run -p arena_headless -- verify --scenario scenarios/duel.ron --runs 5
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to override the level.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arena_headless::{
    batch::{run_batch, BatchConfig},
    load_config, run_scenario, verify_scenario, Scenario,
};

#[derive(Parser)]
#[command(name = "arena_headless")]
#[command(about = "Headless arena round runner for balance testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario and print its report
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Override the scenario's round count
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Play every scenario in a directory
    Batch {
        /// Directory of scenario files
        #[arg(short, long)]
        dir: PathBuf,

        /// Maximum parallel scenarios (0 = auto)
        #[arg(short, long, default_value = "0")]
        parallel: u32,

        /// Override every scenario's round count
        #[arg(short, long)]
        rounds: Option<u32>,

        /// Output file for the batch results
        #[arg(short, long, default_value = "results/batch_results.json")]
        output: PathBuf,
    },

    /// Validate a tuning file
    Validate {
        /// Config file to check
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Verify determinism by playing a scenario several times
    Verify {
        /// Scenario to test
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            rounds,
            output,
        } => cmd_run(&scenario, rounds, output),
        Commands::Batch {
            dir,
            parallel,
            rounds,
            output,
        } => cmd_batch(dir, parallel, rounds, &output),
        Commands::Validate { config } => cmd_validate(&config),
        Commands::Verify { scenario, runs } => cmd_verify(&scenario, runs),
    }
}

/// Play a single scenario.
fn cmd_run(path: &PathBuf, rounds: Option<u32>, output: Option<PathBuf>) -> ExitCode {
    let mut scenario = match Scenario::load(path) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load scenario");
            return ExitCode::FAILURE;
        }
    };
    if let Some(rounds) = rounds {
        scenario.rounds = rounds;
    }

    let report = match run_scenario(&scenario) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, scenario = %scenario.name, "Scenario failed");
            return ExitCode::FAILURE;
        }
    };

    let json = match report.to_json() {
        Ok(j) => j,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize report");
            return ExitCode::FAILURE;
        }
    };

    match output {
        Some(path) => {
            if let Err(e) = std::fs::write(&path, json) {
                tracing::error!(error = %e, path = %path.display(), "Failed to write report");
                return ExitCode::FAILURE;
            }
            tracing::info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    tracing::info!(
        scenario = %report.scenario,
        rounds = report.rounds.len(),
        victories = report.victories(),
        ticks = report.total_ticks,
        "Scenario complete"
    );
    ExitCode::SUCCESS
}

/// Play a directory of scenarios.
fn cmd_batch(dir: PathBuf, parallel: u32, rounds: Option<u32>, output: &PathBuf) -> ExitCode {
    let config = BatchConfig {
        scenario_dir: dir,
        parallel,
        rounds,
    };

    let results = match run_batch(config) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read scenario directory");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = results.save(output) {
        tracing::error!(error = %e, path = %output.display(), "Failed to save results");
        return ExitCode::FAILURE;
    }

    let summary = &results.summary;
    eprintln!("\n{}", "=".repeat(50));
    eprintln!("BATCH COMPLETE");
    eprintln!("{}", "=".repeat(50));
    eprintln!("Scenarios: {}", summary.total_scenarios);
    eprintln!("Rounds:    {}", summary.total_rounds);
    eprintln!(
        "Victories: {}  Defeats: {}  Draws: {}  Timeouts: {}",
        summary.victories, summary.defeats, summary.draws, summary.timeouts
    );
    eprintln!("Player win rate: {:.1}%", summary.player_win_rate * 100.0);
    eprintln!("Average round:   {:.0} ticks", summary.avg_round_ticks);
    if !results.errors.is_empty() {
        eprintln!("Failed scenarios:");
        for error in &results.errors {
            eprintln!("  {}: {}", error.path.display(), error.message);
        }
    }
    eprintln!("Results saved to: {}", output.display());

    if results.errors.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Check a tuning file.
fn cmd_validate(path: &PathBuf) -> ExitCode {
    match load_config(path) {
        Ok(config) => {
            eprintln!(
                "OK: {} ({} ticks/s, {} traits)",
                path.display(),
                config.tick_rate,
                config.traits.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("INVALID: {}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

/// Replay a scenario and compare reports.
fn cmd_verify(path: &PathBuf, runs: u32) -> ExitCode {
    tracing::info!("Verifying determinism: {} ({} runs)", path.display(), runs);

    let result = Scenario::load(path).and_then(|scenario| verify_scenario(&scenario, runs));
    match result {
        Ok(true) => {
            eprintln!("PASS: All {runs} runs produced identical results");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            eprintln!("FAIL: Non-determinism detected!");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
