//! Combat lifecycle: round start, round end, soft death and restoration.
//!
//! A round snapshots every player unit on the board, drives all on-board
//! units into `Combat`, and on end puts the player's side back exactly as it
//! was apart from permanent upgrades. Player units that fall mid-round are
//! held in a soft-dead state (untargetable, hidden after a short delay) rather
//! than destroyed, so the restore can bring them back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::board::Board;
use crate::context::SimulationContext;
use crate::error::{ArenaError, Result};
use crate::events::PresentationEvent;
use crate::math::Vec2Fixed;
use crate::scheduler::Scheduled;
use crate::state_machine;
use crate::synergy;
use crate::unit::{StatBlock, Team, TileId, UnitId, UnitState};

/// Phase of the round loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundPhase {
    /// Between rounds: units can be placed, benched, sold and upgraded.
    #[default]
    Planning,
    /// Units are fighting.
    Combat,
}

/// How a round ended, from the player's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundOutcome {
    /// No enemy combatant left.
    Victory,
    /// No player combatant left.
    Defeat,
    /// Both sides fell on the same tick.
    Draw,
}

/// Pre-combat state of one player unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    /// Tile the unit stood on.
    pub tile: Option<TileId>,
    /// World position at round start.
    pub position: Vec2Fixed,
    /// Full stat block at round start.
    pub stats: StatBlock,
}

/// Summary of a finished round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    /// Round number, starting at 1.
    pub round: u32,
    /// Outcome, if one side was wiped before the round was ended.
    pub outcome: Option<RoundOutcome>,
    /// Ticks the round lasted.
    pub ticks: u64,
    /// Player units that were still standing at round end.
    pub survivors: Vec<UnitId>,
    /// Player units that had fallen and were restored.
    pub revived: Vec<UnitId>,
    /// Enemies and summons removed at round end.
    pub removed: Vec<UnitId>,
}

/// Drives rounds and owns the player-side snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CombatLifecycleManager {
    phase: RoundPhase,
    round: u32,
    started_at: u64,
    snapshots: BTreeMap<UnitId, RoundSnapshot>,
    outcome: Option<RoundOutcome>,
}

impl CombatLifecycleManager {
    /// Create a manager in the planning phase before round 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            round: 1,
            ..Self::default()
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Current (or next) round number.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Outcome of the running round, once decided.
    #[must_use]
    pub const fn outcome(&self) -> Option<RoundOutcome> {
        self.outcome
    }

    /// Snapshot held for a unit during combat.
    #[must_use]
    pub fn snapshot(&self, id: UnitId) -> Option<&RoundSnapshot> {
        self.snapshots.get(&id)
    }

    /// Drop a unit's snapshot so round end leaves it alone.
    pub fn forget(&mut self, id: UnitId) {
        self.snapshots.remove(&id);
    }

    /// Start a combat round.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidPhase`] if a round is already running.
    pub fn start_round(&mut self, ctx: &mut SimulationContext) -> Result<()> {
        if self.phase == RoundPhase::Combat {
            return Err(ArenaError::InvalidPhase(format!(
                "round {} is already running",
                self.round
            )));
        }

        ctx.bus.clear_history();
        synergy::apply_bonuses(ctx);
        self.snapshots.clear();
        self.outcome = None;

        let mut fighters = 0;
        for id in ctx.units.sorted_ids() {
            let Some(unit) = ctx.unit(id) else {
                continue;
            };
            if unit.state != UnitState::BoardIdle || !unit.is_alive {
                continue;
            }
            if unit.team == Team::Player && !unit.is_summon() {
                self.snapshots.insert(
                    id,
                    RoundSnapshot {
                        tile: unit.tile,
                        position: unit.position,
                        stats: unit.stats.clone(),
                    },
                );
            }
            state_machine::enter_state(ctx, id, UnitState::Combat)?;
            fighters += 1;
        }

        ctx.round_active = true;
        self.phase = RoundPhase::Combat;
        self.started_at = ctx.tick;
        info!(
            "Round {} started with {} units ({} snapshotted)",
            self.round,
            fighters,
            self.snapshots.len()
        );
        Ok(())
    }

    /// Decide the round once one side has no living combatants.
    ///
    /// The first decision sticks; later calls return it unchanged.
    pub fn check_outcome(&mut self, ctx: &SimulationContext) -> Option<RoundOutcome> {
        if self.phase != RoundPhase::Combat {
            return None;
        }
        if self.outcome.is_some() {
            return self.outcome;
        }
        let standing = |team: Team| {
            ctx.targetable_ids(team)
                .into_iter()
                .any(|id| ctx.unit(id).is_some_and(|u| u.in_combat()))
        };
        let outcome = match (standing(Team::Player), standing(Team::Enemy)) {
            (true, true) => return None,
            (true, false) => RoundOutcome::Victory,
            (false, true) => RoundOutcome::Defeat,
            (false, false) => RoundOutcome::Draw,
        };
        info!("Round {} decided: {:?} at tick {}", self.round, outcome, ctx.tick);
        self.outcome = Some(outcome);
        self.outcome
    }

    /// End the running round and restore the player's side.
    ///
    /// Pending continuations are cancelled, summons and enemies are removed,
    /// and every snapshotted player unit returns to its pre-combat tile with
    /// full health, starting mana and its permanent bonuses.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidPhase`] outside combat, or a board error if
    /// a snapshot tile can no longer be assigned.
    pub fn end_round(
        &mut self,
        ctx: &mut SimulationContext,
        board: &mut dyn Board,
    ) -> Result<RoundReport> {
        if self.phase != RoundPhase::Combat {
            return Err(ArenaError::InvalidPhase(
                "no round is running".to_string(),
            ));
        }

        ctx.scheduler.clear();
        let mut removed = ctx.flush_removals();
        for id in ctx.units.sorted_ids() {
            let leaves = ctx
                .unit(id)
                .is_some_and(|u| u.is_summon() || u.team == Team::Enemy);
            if leaves && ctx.destroy_unit(id).is_some() {
                removed.push(id);
            }
        }
        for tile in std::mem::take(&mut ctx.vacated_tiles) {
            board.clear_tile(tile);
        }

        let mut survivors = Vec::new();
        let mut revived = Vec::new();
        let snapshots = std::mem::take(&mut self.snapshots);
        for (&id, snapshot) in &snapshots {
            match restore_snapshot(ctx, board, id, snapshot)? {
                Some(true) => revived.push(id),
                Some(false) => survivors.push(id),
                None => {}
            }
        }

        synergy::apply_bonuses(ctx);
        for &id in survivors.iter().chain(&revived) {
            if let Some(unit) = ctx.units.get_mut(id) {
                unit.stats.refill_health();
            }
            ctx.emit_health(id);
            ctx.emit_mana(id);
        }

        let report = RoundReport {
            round: self.round,
            outcome: self.outcome,
            ticks: ctx.tick.saturating_sub(self.started_at),
            survivors,
            revived,
            removed,
        };
        info!(
            "Round {} ended after {} ticks: {:?}",
            report.round, report.ticks, report.outcome
        );

        ctx.round_active = false;
        self.phase = RoundPhase::Planning;
        self.round += 1;
        self.outcome = None;
        Ok(report)
    }
}

/// Put one player unit back into its pre-combat state.
///
/// Returns `Some(true)` if the unit had fallen, `Some(false)` if it survived
/// and `None` if it no longer exists.
fn restore_snapshot(
    ctx: &mut SimulationContext,
    board: &mut dyn Board,
    id: UnitId,
    snapshot: &RoundSnapshot,
) -> Result<Option<bool>> {
    let Some(unit) = ctx.units.get_mut(id) else {
        return Ok(None);
    };
    let fallen = !unit.is_alive;
    if fallen {
        unit.is_alive = true;
        unit.life += 1;
    }
    unit.hidden = false;
    unit.being_restored = false;
    unit.is_casting = false;
    unit.pending_removal = false;

    let permanent_health = unit.stats.permanent_bonus_health;
    let bonus_armor = unit.stats.bonus_armor;
    unit.stats = snapshot.stats.clone();
    unit.stats.permanent_bonus_health = permanent_health;
    unit.stats.bonus_armor = bonus_armor;
    unit.stats.clear_round_bonuses();
    unit.stats.current_mana = unit.stats.starting_mana;

    unit.position = snapshot.position;
    unit.tile = snapshot.tile;
    if let Some(ability) = unit.ability.as_mut() {
        ability.on_round_end();
    }
    synergy::reset_ramps(unit);

    if unit.state != UnitState::BoardIdle {
        state_machine::enter_state(ctx, id, UnitState::BoardIdle)?;
    }
    if let Some(tile) = snapshot.tile {
        board.assign_to_tile(tile, id)?;
    }
    if fallen {
        let life = ctx.unit(id).map_or(0, |u| u.life);
        ctx.bus.retire_lives_before(id, life);
        ctx.emit(PresentationEvent::Restored { unit: id, life });
    }
    trace!("Restored unit {} (fallen: {})", id, fallen);
    Ok(Some(fallen))
}

/// Bring a fallen unit back into the running round with a new life.
///
/// Any hide or despawn still pending for the old life is cancelled; one
/// already popped this tick sees `being_restored` and aborts. Returns
/// `false` if the unit was not dead.
///
/// # Errors
///
/// Returns [`ArenaError::UnitNotFound`] for an unknown or departing unit.
pub fn restore_from_combat(ctx: &mut SimulationContext, id: UnitId) -> Result<bool> {
    let round_active = ctx.round_active;
    let unit = ctx
        .units
        .get_mut(id)
        .filter(|u| !u.pending_removal)
        .ok_or(ArenaError::UnitNotFound(id))?;
    if unit.is_alive {
        return Ok(false);
    }

    unit.being_restored = true;
    unit.is_alive = true;
    unit.life += 1;
    unit.hidden = false;
    unit.is_casting = false;
    unit.target = None;
    unit.stats.refill_health();
    unit.stats.current_mana = 0;
    let life = unit.life;
    let fighting = unit.in_combat();

    ctx.scheduler.cancel_owner(id);
    ctx.bus.retire_lives_before(id, life);
    if round_active && fighting {
        state_machine::enter_state(ctx, id, UnitState::Combat)?;
    }
    ctx.mark_traits_dirty();
    debug!("Unit {} restored into life {}", id, life);
    ctx.emit(PresentationEvent::Restored { unit: id, life });
    ctx.emit_health(id);
    ctx.emit_mana(id);
    Ok(true)
}

/// Soft-death continuation: hide a fallen player unit.
///
/// Aborts if the unit is being restored, has moved on to another life or is
/// alive again.
pub fn hide_fallen(ctx: &mut SimulationContext, entry: &Scheduled) {
    let Some(unit) = ctx.units.get_mut(entry.owner) else {
        return;
    };
    if unit.being_restored || unit.life != entry.life || unit.is_alive {
        trace!("Unit {} hide aborted", entry.owner);
        return;
    }
    unit.hidden = true;
    unit.can_move = false;
    unit.can_attack = false;
    ctx.emit(PresentationEvent::Hidden { unit: entry.owner });
}
