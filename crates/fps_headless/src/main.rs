//! Headless combat runner.
//!
//! Plays a scenario on an authority and an observer, then reports what
//! happened. Reports and event streams go to stdout; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in duel
//! cargo run -p fps_headless
//!
//! # Run a scenario for 200 ticks at 30 Hz
//! cargo run -p fps_headless -- run --scenario duel.ron --ticks 200 --dt 0.0333
//!
//! # Check that five runs end in the same state
//! cargo run -p fps_headless -- verify --scenario duel.ron --runs 5
//!
//! # Print the built-in duel as RON, as a starting point for new scenarios
//! cargo run -p fps_headless -- dump > duel.ron
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fps_core::events::GameEvent;
use fps_headless::{
    runner::{verify_determinism, MatchRunner, RunConfig, RunReport},
    scenario::{Scenario, ScenarioError},
};

#[derive(Parser)]
#[command(name = "fps_headless")]
#[command(about = "Headless combat runner for CI verification")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single match
    Run {
        /// Scenario file to load (defaults to the built-in duel)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override the number of ticks
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Override the tick length in seconds
        #[arg(long)]
        dt: Option<f64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Stream the authority's events as JSON lines
        #[arg(long)]
        events: bool,
    },

    /// Verify determinism by running the same scenario several times
    Verify {
        /// Scenario file to load (defaults to the built-in duel)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },

    /// Print a scenario as RON
    Dump {
        /// Scenario file to load (defaults to the built-in duel)
        #[arg(short, long)]
        scenario: Option<PathBuf>,
    },
}

/// One line of the `--events` stream.
#[derive(Serialize)]
struct EventLine<'a> {
    tick: u64,
    event: &'a GameEvent,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries reports
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Some(Commands::Run {
            scenario,
            ticks,
            dt,
            json,
            events,
        }) => cmd_run(scenario, ticks, dt, json, events),
        Some(Commands::Verify { scenario, runs }) => cmd_verify(scenario, runs),
        Some(Commands::Dump { scenario }) => cmd_dump(scenario),
        None => cmd_run(None, None, None, false, false),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_scenario(path: Option<PathBuf>) -> Result<Scenario, ScenarioError> {
    match path {
        Some(path) => {
            tracing::info!("Loading scenario: {}", path.display());
            Scenario::load(&path)
        }
        None => Ok(Scenario::duel()),
    }
}

/// Run a single match
fn cmd_run(
    scenario: Option<PathBuf>,
    ticks: Option<u64>,
    dt: Option<f64>,
    json: bool,
    events: bool,
) -> Result<(), ScenarioError> {
    let scenario = load_scenario(scenario)?;
    let config = RunConfig::from_seconds(ticks, dt)?;

    let mut runner = MatchRunner::new(scenario, &config)?;
    while !runner.is_finished() {
        let tick = runner.tick_count();
        let tick_events = runner.step()?;
        if events {
            for event in tick_events.iter() {
                match serde_json::to_string(&EventLine { tick, event }) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
                }
            }
        }
    }
    let report = runner.finish()?;

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{text}"),
            Err(e) => tracing::error!(error = %e, "Failed to serialize report"),
        }
    } else if !events {
        print_report(&report);
    }

    if report.converged {
        Ok(())
    } else {
        eprintln!("FAIL: observer diverged from authority");
        std::process::exit(1);
    }
}

fn print_report(report: &RunReport) {
    println!("Scenario:      {}", report.scenario);
    println!("Duration:      {} ticks ({:.2}s)", report.ticks, report.seconds);
    println!(
        "Shots:         {} (observer predicted {})",
        report.shots_fired, report.observer_shots
    );
    println!("Hits:          {} ({:.1} damage)", report.hits, report.damage_dealt);
    println!("Kills:         {}", report.kills.join(", "));
    println!(
        "Reloads:       {} completed, {} canceled",
        report.reloads_completed, report.reloads_canceled
    );
    println!(
        "Replication:   {} frames, {} bytes",
        report.frames_sent, report.bytes_sent
    );
    println!("Leaked props:  {}", report.leaked_props);
    for character in &report.characters {
        println!(
            "  {:<10} health {:>6.1}  alive {}",
            character.name, character.health, character.alive
        );
    }
    for weapon in &report.weapons {
        println!(
            "  {:<10} {:<8} clip {:>3}  {:?}",
            weapon.holder.as_deref().unwrap_or("-"),
            weapon.gun,
            weapon.clip,
            weapon.state
        );
    }
    println!("Converged:     {}", report.converged);
    println!("State hash:    {:016x}", report.state_hash);
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, runs: u32) -> Result<(), ScenarioError> {
    let scenario = load_scenario(scenario)?;
    tracing::info!("Verifying determinism: {} ({} runs)", scenario.name, runs);

    if verify_determinism(&scenario, &RunConfig::default(), runs)? {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(())
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        std::process::exit(1);
    }
}

/// Print a scenario as RON
fn cmd_dump(scenario: Option<PathBuf>) -> Result<(), ScenarioError> {
    let scenario = load_scenario(scenario)?;
    println!("{}", scenario.to_ron_string()?);
    Ok(())
}
