//! Batch scenario runner for balance testing.
//!
//! Runs every scenario in a directory in parallel using rayon and
//! aggregates the round metrics into a [`BatchSummary`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::metrics::BatchSummary;
use crate::runner::{run_scenario, ScenarioReport};
use crate::scenario::{Scenario, ScenarioError};

/// Configuration for a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Directory holding `.ron` scenarios.
    pub scenario_dir: PathBuf,
    /// Maximum parallel scenarios (0 = use rayon default).
    pub parallel: u32,
    /// Override for every scenario's round count.
    pub rounds: Option<u32>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            scenario_dir: PathBuf::from("scenarios"),
            parallel: 0,
            rounds: None,
        }
    }
}

impl BatchConfig {
    /// Create config for a scenario directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            scenario_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Play every scenario for `rounds` rounds.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = Some(rounds);
        self
    }
}

/// Results from a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResults {
    /// Configuration used.
    pub config: BatchConfig,
    /// One report per scenario that ran, in file name order.
    pub reports: Vec<ScenarioReport>,
    /// Aggregate summary.
    pub summary: BatchSummary,
    /// Total runtime.
    pub duration_seconds: f64,
    /// Scenarios that failed to load or run.
    pub errors: Vec<BatchError>,
}

impl BatchResults {
    /// Save results to a JSON file.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Load results from a JSON file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(std::io::Error::other)
    }
}

/// A scenario that failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchError {
    /// Scenario file.
    pub path: PathBuf,
    /// Error message.
    pub message: String,
}

/// Scenario files in `dir`, sorted by name.
pub fn scenario_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "ron"))
        .collect();
    files.sort();
    Ok(files)
}

fn run_file(path: &Path, rounds: Option<u32>) -> Result<ScenarioReport, ScenarioError> {
    let mut scenario = Scenario::load(path)?;
    if let Some(rounds) = rounds {
        scenario.rounds = rounds;
    }
    run_scenario(&scenario)
}

/// Run every scenario in the configured directory.
pub fn run_batch(config: BatchConfig) -> std::io::Result<BatchResults> {
    let start = Instant::now();
    let files = scenario_files(&config.scenario_dir)?;
    info!(
        "Starting batch run: {} scenario(s) from {}",
        files.len(),
        config.scenario_dir.display()
    );

    if config.parallel > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(config.parallel as usize)
            .build_global()
            .ok(); // Ignore if already set
    }

    let completed = AtomicU32::new(0);
    let results: Vec<Result<ScenarioReport, BatchError>> = files
        .par_iter()
        .map(|path| {
            let result = run_file(path, config.rounds).map_err(|e| {
                warn!("Scenario {} failed: {}", path.display(), e);
                BatchError {
                    path: path.clone(),
                    message: e.to_string(),
                }
            });
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("Progress: {}/{}", done, files.len());
            result
        })
        .collect();

    let (reports, errors): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    let reports: Vec<ScenarioReport> = reports.into_iter().filter_map(Result::ok).collect();
    let errors: Vec<BatchError> = errors.into_iter().filter_map(Result::err).collect();

    let summary = BatchSummary::from_rounds(reports.len(), reports.iter().flat_map(|r| &r.rounds));
    let duration_seconds = start.elapsed().as_secs_f64();

    info!(
        "Batch complete: {} scenario(s), {} round(s) in {:.1}s",
        reports.len(),
        summary.total_rounds,
        duration_seconds
    );

    Ok(BatchResults {
        config,
        reports,
        summary,
        duration_seconds,
        errors,
    })
}
