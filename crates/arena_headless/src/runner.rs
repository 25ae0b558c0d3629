//! Scenario runner: plays every round of a scenario and reports the result.

use arena_core::lifecycle::RoundOutcome;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::metrics::{MetricsCollector, RoundMetrics};
use crate::scenario::{Scenario, ScenarioError};

/// Result of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// Metrics per round, in play order.
    pub rounds: Vec<RoundMetrics>,
    /// Simulation state hash after the last round.
    pub final_state_hash: u64,
    /// Ticks simulated across all rounds.
    pub total_ticks: u64,
}

impl ScenarioReport {
    /// Rounds the player side won.
    #[must_use]
    pub fn victories(&self) -> usize {
        self.rounds
            .iter()
            .filter(|r| r.outcome == Some(RoundOutcome::Victory))
            .count()
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Play every round of `scenario`.
///
/// Each round runs until one side is wiped or `max_ticks_per_round` passes,
/// then ends. Player units carry over to the next round and the enemy wave
/// is deployed again.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioReport, ScenarioError> {
    let (mut sim, mut board) = scenario.build()?;
    info!(
        "Running scenario '{}': {} round(s), {} unit(s)",
        scenario.name,
        scenario.rounds,
        sim.units().len()
    );

    let mut rounds = Vec::with_capacity(scenario.rounds as usize);
    for index in 0..scenario.rounds {
        if index > 0 {
            scenario.deploy_enemies(&mut sim, &mut board)?;
        }
        let round = sim.lifecycle().round();
        let mut collector = MetricsCollector::new(round, &sim);
        sim.start_round()?;

        for _ in 0..scenario.max_ticks_per_round {
            let events = sim.tick();
            collector.record(&sim, &events);
            if events.outcome.is_some() {
                break;
            }
        }

        let report = sim.end_round(&mut board)?;
        debug!(
            "Round {} finished: {:?} after {} ticks",
            report.round, report.outcome, report.ticks
        );
        rounds.push(collector.finish(&report));
    }

    let total_ticks = rounds.iter().map(|r| r.ticks).sum();
    Ok(ScenarioReport {
        scenario: scenario.name.clone(),
        rounds,
        final_state_hash: sim.state_hash(),
        total_ticks,
    })
}

/// Run a scenario `runs` times and check that every run ends identically.
pub fn verify_scenario(scenario: &Scenario, runs: u32) -> Result<bool, ScenarioError> {
    let first = run_scenario(scenario)?;
    for _ in 1..runs {
        if run_scenario(scenario)? != first {
            return Ok(false);
        }
    }
    Ok(true)
}
