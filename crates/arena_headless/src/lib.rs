//! Headless round runner for balance testing and CI verification.
//!
//! Plays arena scenarios without any presentation layer:
//!
//! - **Scenario runs**: load a RON scenario, play its rounds, print a JSON report
//! - **Batch runs**: play a whole directory of scenarios in parallel
//! - **Config validation**: report every problem in a tuning file at once
//! - **Determinism checks**: replay a scenario and compare the results
//!
//! Reports go to stdout as JSON; logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! cargo run -p arena_headless -- run --scenario scenarios/duel.ron
//! cargo run -p arena_headless -- batch --dir scenarios --output results/batch.json
//! cargo run -p arena_headless -- validate --config tuning.ron
//! ```

pub mod batch;
pub mod metrics;
pub mod runner;
pub mod scenario;

pub use batch::{run_batch, BatchConfig, BatchResults};
pub use metrics::{BatchSummary, MetricsCollector, RoundMetrics};
pub use runner::{run_scenario, verify_scenario, ScenarioReport};
pub use scenario::{load_config, Scenario, ScenarioError, UnitPlacement};
