//! Round metrics collection for balance analysis.
//!
//! A [`MetricsCollector`] watches the [`TickEvents`] of one round and folds
//! them into per-team totals. [`BatchSummary`] aggregates finished scenarios.

use std::collections::BTreeMap;

use arena_core::events::PresentationEvent;
use arena_core::lifecycle::{RoundOutcome, RoundReport};
use arena_core::simulation::{Simulation, TickEvents};
use arena_core::unit::{Team, UnitId};
use serde::{Deserialize, Serialize};

/// Per-team totals for one round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Damage dealt after armor.
    pub damage_dealt: f64,
    /// Damage taken after armor.
    pub damage_taken: f64,
    /// Units of this team that died.
    pub deaths: u32,
    /// Enemy units this team killed.
    pub kills: u32,
    /// Abilities cast, by ability name.
    pub casts: BTreeMap<String, u32>,
}

/// Metrics for a single round.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundMetrics {
    /// Round number, starting at 1.
    pub round: u32,
    /// Outcome; `None` when the tick limit was hit.
    pub outcome: Option<RoundOutcome>,
    /// Ticks played.
    pub ticks: u64,
    /// Player side.
    pub player: TeamMetrics,
    /// Enemy side.
    pub enemy: TeamMetrics,
    /// Player units standing at the end.
    pub survivors: usize,
    /// Player units restored after falling.
    pub revived: usize,
}

impl RoundMetrics {
    fn team_mut(&mut self, team: Team) -> &mut TeamMetrics {
        match team {
            Team::Player => &mut self.player,
            Team::Enemy => &mut self.enemy,
        }
    }
}

/// Folds tick events into [`RoundMetrics`].
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: RoundMetrics,
    teams: BTreeMap<UnitId, Team>,
}

impl MetricsCollector {
    /// Start collecting for a round, remembering which team each unit is on.
    #[must_use]
    pub fn new(round: u32, sim: &Simulation) -> Self {
        let teams = sim.units().iter().map(|(&id, u)| (id, u.team)).collect();
        Self {
            metrics: RoundMetrics {
                round,
                ..Default::default()
            },
            teams,
        }
    }

    /// Record one tick.
    pub fn record(&mut self, sim: &Simulation, events: &TickEvents) {
        for event in &events.events {
            match event {
                PresentationEvent::Spawned { unit, .. } => {
                    if let Some(u) = sim.get_unit(*unit) {
                        self.teams.insert(*unit, u.team);
                    }
                }
                PresentationEvent::DamageDealt {
                    source,
                    target,
                    amount,
                } => {
                    let amount: f64 = amount.to_num();
                    if let Some(team) = self.teams.get(target).copied() {
                        self.metrics.team_mut(team).damage_taken += amount;
                    }
                    if let Some(team) = source.and_then(|s| self.teams.get(&s).copied()) {
                        self.metrics.team_mut(team).damage_dealt += amount;
                    }
                }
                PresentationEvent::AbilityCast { unit, ability, .. } => {
                    if let Some(team) = self.teams.get(unit).copied() {
                        *self
                            .metrics
                            .team_mut(team)
                            .casts
                            .entry(ability.clone())
                            .or_default() += 1;
                    }
                }
                _ => {}
            }
        }

        for death in &events.deaths {
            self.metrics.team_mut(death.team).deaths += 1;
            self.metrics.team_mut(death.team.opponent()).kills += 1;
        }
    }

    /// Close the round with its report.
    #[must_use]
    pub fn finish(mut self, report: &RoundReport) -> RoundMetrics {
        self.metrics.outcome = report.outcome;
        self.metrics.ticks = report.ticks;
        self.metrics.survivors = report.survivors.len();
        self.metrics.revived = report.revived.len();
        self.metrics
    }
}

/// Summary statistics across many rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Scenarios played.
    pub total_scenarios: u32,
    /// Rounds played.
    pub total_rounds: u32,
    /// Rounds the player side won.
    pub victories: u32,
    /// Rounds the player side lost.
    pub defeats: u32,
    /// Rounds where both sides fell together.
    pub draws: u32,
    /// Rounds that hit the tick limit.
    pub timeouts: u32,
    /// Victories over decided rounds.
    pub player_win_rate: f64,
    /// Average round length in ticks.
    pub avg_round_ticks: f64,
    /// Shortest round.
    pub min_round_ticks: u64,
    /// Longest round.
    pub max_round_ticks: u64,
    /// Casts per ability across every round and team.
    pub casts: BTreeMap<String, u32>,
}

impl BatchSummary {
    /// Calculate a summary from the rounds of every scenario.
    #[must_use]
    pub fn from_rounds<'a>(scenarios: usize, rounds: impl IntoIterator<Item = &'a RoundMetrics>) -> Self {
        let mut summary = Self {
            total_scenarios: scenarios as u32,
            min_round_ticks: u64::MAX,
            ..Default::default()
        };
        let mut tick_sum = 0u64;

        for round in rounds {
            summary.total_rounds += 1;
            tick_sum += round.ticks;
            summary.min_round_ticks = summary.min_round_ticks.min(round.ticks);
            summary.max_round_ticks = summary.max_round_ticks.max(round.ticks);

            match round.outcome {
                Some(RoundOutcome::Victory) => summary.victories += 1,
                Some(RoundOutcome::Defeat) => summary.defeats += 1,
                Some(RoundOutcome::Draw) => summary.draws += 1,
                None => summary.timeouts += 1,
            }

            for (ability, count) in round.player.casts.iter().chain(&round.enemy.casts) {
                *summary.casts.entry(ability.clone()).or_default() += count;
            }
        }

        if summary.total_rounds == 0 {
            summary.min_round_ticks = 0;
            return summary;
        }

        summary.avg_round_ticks = tick_sum as f64 / f64::from(summary.total_rounds);
        let decided = summary.victories + summary.defeats + summary.draws;
        if decided > 0 {
            summary.player_win_rate = f64::from(summary.victories) / f64::from(decided);
        }
        summary
    }
}
