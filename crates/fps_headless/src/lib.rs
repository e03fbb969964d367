//! Headless match runner for CI verification.
//!
//! This crate plays scripted scenarios through `fps_core` without graphics
//! or networking. Every match runs on two simulations, an authority and an
//! observer, linked by the replication wire format, so a single run checks
//! both the combat rules and that the observer converges.
//!
//! - **Scenarios**: RON files describing combatants and an input script
//! - **Arena**: a hit-sphere world that answers traces and socket lookups
//! - **Runner**: drives both participants and reports the outcome
//!
//! # Example
//!
//! ```bash
//! # Run the built-in duel and print a JSON report
//! cargo run -p fps_headless -- run --json
//!
//! # Run a scenario file, streaming events as JSON lines
//! cargo run -p fps_headless -- run --scenario scenarios/duel.ron --events
//!
//! # Verify determinism
//! cargo run -p fps_headless -- verify --runs 5
//! ```

pub mod arena;
pub mod runner;
pub mod scenario;

pub use arena::ArenaWorld;
pub use runner::{run_scenario, verify_determinism, MatchRunner, RunConfig, RunReport};
pub use scenario::{Scenario, ScenarioError};
