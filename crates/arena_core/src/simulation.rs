//! Core simulation loop.
//!
//! The simulation runs at a fixed tick rate and processes all combat logic
//! deterministically. It owns the [`SimulationContext`] and the round
//! lifecycle; the board is an external collaborator passed into the
//! operations that move units on or off tiles.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`])
//! - No system randomness
//! - Units update in sorted ID order from a list captured at tick start
//! - Same inputs always produce same outputs
//!
//! # Example
//!
//! ```
//! use arena_core::board::GridBoard;
//! use arena_core::data::UnitTemplate;
//! use arena_core::simulation::Simulation;
//! use arena_core::unit::Team;
//!
//! let mut sim = Simulation::new();
//! let mut board = GridBoard::default();
//!
//! let knight = sim.register_unit(&UnitTemplate::new("knight", 600, 50), Team::Player);
//! let raider = sim.register_unit(&UnitTemplate::new("raider", 400, 40), Team::Enemy);
//! sim.place_unit(&mut board, knight, 0).unwrap();
//! sim.place_unit(&mut board, raider, 63).unwrap();
//!
//! sim.start_round().unwrap();
//! let events = sim.tick();
//! assert_eq!(events.tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::abilities::{self, AbilityDescription};
use crate::board::Board;
use crate::context::{SimulationContext, UnitStorage};
use crate::damage::{self, DamageOutcome};
use crate::data::{SimulationConfig, UnitTemplate};
use crate::error::{ArenaError, Result};
use crate::events::{DeathEvent, PresentationEvent};
use crate::lifecycle::{self, CombatLifecycleManager, RoundOutcome, RoundPhase, RoundReport};
use crate::mana::{self, ManaOutcome};
use crate::math::Fixed;
use crate::scheduler::{Continuation, Scheduled};
use crate::state_machine;
use crate::synergy::{self, TraitAggregator, TraitStatus};
use crate::targeting;
use crate::unit::{Team, TileId, Unit, UnitId, UnitState};

/// Events generated during a simulation tick.
///
/// The presentation layer drains these to drive health bars, cast effects
/// and death animations.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    /// Tick number after this update.
    pub tick: u64,
    /// Presentation notifications in emission order.
    pub events: Vec<PresentationEvent>,
    /// Deaths broadcast this tick.
    pub deaths: Vec<DeathEvent>,
    /// Units removed at the end of this tick.
    pub removed: Vec<UnitId>,
    /// Round outcome, once one side is wiped.
    pub outcome: Option<RoundOutcome>,
}

/// The combat simulation.
///
/// # System Execution Order
///
/// Each tick:
/// 1. **Restore flags** - last tick's `being_restored` markers clear
/// 2. **Traits** - re-evaluated if the roster changed
/// 3. **Continuations** - due casts, leaps, hides and despawns resume
/// 4. **Units** - every unit captured at tick start updates in ID order
/// 5. **Removals** - queued units are destroyed
/// 6. **Outcome** - the round is decided once a side has no combatants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    /// Units, rosters, bus, scheduler and tuning.
    ctx: SimulationContext,
    /// Round state and player snapshots.
    lifecycle: CombatLifecycleManager,
}

impl Simulation {
    /// Create an empty simulation with the default tuning.
    ///
    /// # Example
    ///
    /// ```
    /// use arena_core::simulation::Simulation;
    ///
    /// let sim = Simulation::new();
    /// assert_eq!(sim.get_tick(), 0);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctx: SimulationContext::new(SimulationConfig::default()),
            lifecycle: CombatLifecycleManager::new(),
        }
    }

    /// Create a simulation with custom tuning.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Config`] listing every problem if the
    /// configuration is malformed.
    pub fn with_config(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ctx: SimulationContext::new(config),
            lifecycle: CombatLifecycleManager::new(),
        })
    }

    /// Get the current tick number.
    #[must_use]
    pub const fn get_tick(&self) -> u64 {
        self.ctx.tick
    }

    /// Active tuning.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.ctx.config
    }

    /// Shared simulation state.
    #[must_use]
    pub const fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    /// Round state.
    #[must_use]
    pub const fn lifecycle(&self) -> &CombatLifecycleManager {
        &self.lifecycle
    }

    /// Current round phase.
    #[must_use]
    pub const fn phase(&self) -> RoundPhase {
        self.lifecycle.phase()
    }

    /// All units.
    #[must_use]
    pub fn units(&self) -> &UnitStorage {
        &self.ctx.units
    }

    /// Get a unit by ID.
    #[must_use]
    pub fn get_unit(&self, id: UnitId) -> Option<&Unit> {
        self.ctx.unit(id)
    }

    /// Living, non-benched units of a team in roster order.
    #[must_use]
    pub fn targetable_ids(&self, team: Team) -> Vec<UnitId> {
        self.ctx.targetable_ids(team)
    }

    // ------------------------------------------------------------------
    // Roster management
    // ------------------------------------------------------------------

    /// Create a unit from a template on `team`'s bench.
    pub fn register_unit(&mut self, template: &UnitTemplate, team: Team) -> UnitId {
        let unit = Unit::from_template(0, template, team);
        let id = self.ctx.insert_unit(unit);
        abilities::on_registered(&mut self.ctx, id);
        debug!("Registered unit {} ({}) for {:?}", id, template.name, team);
        self.ctx.emit(PresentationEvent::Spawned {
            unit: id,
            summoner: None,
        });
        id
    }

    /// Remove a unit for good (sold).
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnitNotFound`] for an unknown unit and
    /// [`ArenaError::InvalidPhase`] when selling a fighting unit mid-round.
    pub fn unregister_unit(&mut self, board: &mut dyn Board, id: UnitId) -> Result<Unit> {
        let unit = self.ctx.unit(id).ok_or(ArenaError::UnitNotFound(id))?;
        if self.lifecycle.phase() == RoundPhase::Combat && !unit.is_benched() {
            warn!("Rejected sale of unit {} during combat", id);
            return Err(ArenaError::InvalidPhase(
                "only benched units can be sold during combat".to_string(),
            ));
        }
        let tile = unit.tile;
        self.lifecycle.forget(id);
        let removed = self
            .ctx
            .destroy_unit(id)
            .ok_or(ArenaError::UnitNotFound(id))?;
        if let Some(tile) = tile {
            self.ctx.vacated_tiles.retain(|&t| t != tile);
            board.clear_tile(tile);
        }
        debug!("Unregistered unit {}", id);
        Ok(removed)
    }

    /// Put a unit on `tile`, from the bench or from another tile.
    ///
    /// # Errors
    ///
    /// Fails during combat, for unknown units and tiles, for fallen units and
    /// when the tile holds another unit.
    pub fn place_unit(&mut self, board: &mut dyn Board, id: UnitId, tile: TileId) -> Result<()> {
        if self.lifecycle.phase() == RoundPhase::Combat {
            return Err(ArenaError::InvalidPhase(
                "units cannot be placed during combat".to_string(),
            ));
        }
        let unit = self.ctx.unit(id).ok_or(ArenaError::UnitNotFound(id))?;
        if !unit.is_alive {
            return Err(ArenaError::InvalidTransition {
                unit: id,
                from: unit.state,
                to: UnitState::BoardIdle,
                reason: "fallen units cannot be placed",
            });
        }
        let previous = unit.tile;
        let state = unit.state;
        let position = board.tile_position(tile).ok_or(ArenaError::InvalidTile(tile))?;

        board.assign_to_tile(tile, id)?;
        if let Some(old) = previous.filter(|&old| old != tile) {
            board.clear_tile(old);
        }
        if let Some(unit) = self.ctx.unit_mut(id) {
            unit.tile = Some(tile);
            unit.position = position;
        }
        if state == UnitState::Bench {
            state_machine::enter_state(&mut self.ctx, id, UnitState::BoardIdle)?;
        }
        Ok(())
    }

    /// Move a unit to the bench.
    ///
    /// Benching mid-round drops the unit out of the fight: its pending casts
    /// are cancelled and its round state resets as it would at round end.
    ///
    /// # Errors
    ///
    /// Fails for unknown units and for fallen units mid-round.
    pub fn bench_unit(&mut self, board: &mut dyn Board, id: UnitId) -> Result<()> {
        let unit = self.ctx.unit(id).ok_or(ArenaError::UnitNotFound(id))?;
        if !unit.is_alive {
            return Err(ArenaError::InvalidTransition {
                unit: id,
                from: unit.state,
                to: UnitState::Bench,
                reason: "fallen units return at round end",
            });
        }
        let tile = unit.tile;
        if let Some(tile) = tile {
            board.clear_tile(tile);
        }

        let snapshot = self.lifecycle.snapshot(id).cloned();
        self.lifecycle.forget(id);
        if let Some(unit) = self.ctx.unit_mut(id) {
            unit.tile = None;
            if let Some(snapshot) = snapshot {
                unit.stats.clear_round_bonuses();
                unit.stats.refill_health();
                unit.stats.current_mana = unit.stats.starting_mana;
                unit.position = snapshot.position;
                if let Some(ability) = unit.ability.as_mut() {
                    ability.on_round_end();
                }
                synergy::reset_ramps(unit);
            }
        }
        state_machine::enter_state(&mut self.ctx, id, UnitState::Bench)?;
        Ok(())
    }

    /// Raise a unit's star level.
    ///
    /// Returns `false` at the maximum star level.
    ///
    /// # Errors
    ///
    /// Fails for unknown units and during combat.
    pub fn upgrade_star(&mut self, id: UnitId) -> Result<bool> {
        if self.lifecycle.phase() == RoundPhase::Combat {
            return Err(ArenaError::InvalidPhase(
                "units cannot be upgraded during combat".to_string(),
            ));
        }
        let multiplier = self.ctx.config.combat.star_multiplier;
        let max_star = self.ctx.config.combat.max_star;
        let unit = self
            .ctx
            .unit_mut(id)
            .ok_or(ArenaError::UnitNotFound(id))?;
        if !unit.upgrade_star(multiplier, max_star) {
            return Ok(false);
        }
        let star = unit.star;
        // Percentage bonuses follow the new base health.
        synergy::apply_bonuses(&mut self.ctx);
        if let Some(unit) = self.ctx.unit_mut(id) {
            unit.stats.refill_health();
        }
        debug!("Unit {} upgraded to {} stars", id, star);
        self.ctx.emit_health(id);
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Rounds
    // ------------------------------------------------------------------

    /// Start a combat round.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidPhase`] if a round is already running.
    pub fn start_round(&mut self) -> Result<()> {
        self.lifecycle.start_round(&mut self.ctx)
    }

    /// End the running round and restore the player's side.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidPhase`] outside combat.
    pub fn end_round(&mut self, board: &mut dyn Board) -> Result<RoundReport> {
        self.lifecycle.end_round(&mut self.ctx, board)
    }

    /// Bring a fallen unit back into the running round.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::UnitNotFound`] for unknown or departing units.
    pub fn restore_from_combat(&mut self, id: UnitId) -> Result<bool> {
        lifecycle::restore_from_combat(&mut self.ctx, id)
    }

    /// Advance the simulation by one tick.
    ///
    /// # Example
    ///
    /// ```
    /// use arena_core::simulation::Simulation;
    ///
    /// let mut sim = Simulation::new();
    /// let events = sim.tick();
    /// assert_eq!(sim.get_tick(), 1);
    /// assert!(events.deaths.is_empty());
    /// ```
    pub fn tick(&mut self) -> TickEvents {
        // Units spawned from here on act next tick.
        let unit_ids = self.ctx.units.sorted_ids();

        // 1. Restore flags
        for &id in &unit_ids {
            if let Some(unit) = self.ctx.units.get_mut(id) {
                unit.being_restored = false;
            }
        }

        // 2. Traits
        if self.ctx.traits_dirty {
            synergy::apply_bonuses(&mut self.ctx);
        }

        // 3. Continuations
        let now = self.ctx.tick;
        for entry in self.ctx.scheduler.pop_due(now) {
            self.run_continuation(&entry);
        }

        // 4. Units
        for &id in &unit_ids {
            state_machine::update_unit(&mut self.ctx, id);
        }

        // 5. Removals
        let removed = self.ctx.flush_removals();

        // 6. Outcome
        let outcome = self.lifecycle.check_outcome(&self.ctx);

        self.ctx.tick += 1;

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.ctx.tick, state_hash = hash, "Simulation state hash");
        }

        TickEvents {
            tick: self.ctx.tick,
            events: std::mem::take(&mut self.ctx.events),
            deaths: std::mem::take(&mut self.ctx.deaths),
            removed,
            outcome,
        }
    }

    fn run_continuation(&mut self, entry: &Scheduled) {
        match entry.action {
            Continuation::HideFallen => lifecycle::hide_fallen(&mut self.ctx, entry),
            Continuation::Despawn => {
                let stale = self
                    .ctx
                    .unit(entry.owner)
                    .map_or(true, |u| u.is_alive || u.life != entry.life);
                if !stale {
                    self.ctx.queue_removal(entry.owner);
                }
            }
            _ => abilities::resume(&mut self.ctx, entry),
        }
    }

    // ------------------------------------------------------------------
    // Combat services
    // ------------------------------------------------------------------

    /// Apply raw damage to a unit from an optional source.
    pub fn apply_damage(
        &mut self,
        source: Option<UnitId>,
        target: UnitId,
        raw: Fixed,
    ) -> DamageOutcome {
        damage::apply_damage(&mut self.ctx, source, target, raw)
    }

    /// Add mana to a unit, casting at the threshold.
    pub fn gain_mana(&mut self, id: UnitId, amount: u32) -> ManaOutcome {
        mana::gain_mana(&mut self.ctx, id, amount)
    }

    /// Best target for a unit right now.
    #[must_use]
    pub fn find_target(&self, id: UnitId) -> Option<UnitId> {
        targeting::find_target(&self.ctx, id)
    }

    /// Trait status lines for one team.
    #[must_use]
    pub fn trait_summary(&self, team: Team) -> Vec<TraitStatus> {
        let counts = synergy::team_counts(&self.ctx, team);
        TraitAggregator::new(&self.ctx.config.traits).statuses(&counts)
    }

    /// Name and summary of a unit's ability.
    ///
    /// Unknown units and units without an ability get the default
    /// description.
    #[must_use]
    pub fn describe_ability(&self, id: UnitId) -> AbilityDescription {
        self.ctx
            .unit(id)
            .map_or_else(AbilityDescription::default, abilities::describe_ability)
    }

    /// Deaths broadcast since the current round started.
    #[must_use]
    pub fn death_history(&self) -> &[DeathEvent] {
        self.ctx.bus.history()
    }

    /// Take notifications emitted outside [`tick`](Self::tick), such as
    /// placement and round changes.
    pub fn drain_events(&mut self) -> Vec<PresentationEvent> {
        std::mem::take(&mut self.ctx.events)
    }

    /// Calculate a hash of the current simulation state.
    ///
    /// Two simulations with identical state produce identical hashes.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.ctx.tick.hash(&mut hasher);
        self.lifecycle.phase().hash(&mut hasher);
        self.lifecycle.round().hash(&mut hasher);

        let ids = self.ctx.units.sorted_ids();
        ids.len().hash(&mut hasher);

        for id in ids {
            if let Some(unit) = self.ctx.units.get(id) {
                id.hash(&mut hasher);
                unit.team.hash(&mut hasher);
                unit.state.hash(&mut hasher);
                unit.star.hash(&mut hasher);
                unit.life.hash(&mut hasher);
                unit.is_alive.hash(&mut hasher);
                unit.is_casting.hash(&mut hasher);
                unit.target.hash(&mut hasher);
                unit.tile.hash(&mut hasher);

                unit.position.x.to_bits().hash(&mut hasher);
                unit.position.y.to_bits().hash(&mut hasher);

                unit.stats.current_health.to_bits().hash(&mut hasher);
                unit.stats.max_health().to_bits().hash(&mut hasher);
                unit.stats.current_mana.hash(&mut hasher);
                unit.attack_cooldown.to_bits().hash(&mut hasher);

                if let Some(ref ability) = unit.ability {
                    ability.kind.hash(&mut hasher);
                    ability.casts.hash(&mut hasher);
                }
                for (trait_id, modifier) in &unit.modifiers {
                    trait_id.hash(&mut hasher);
                    modifier.tier.hash(&mut hasher);
                }
            }
        }

        self.ctx.scheduler.len().hash(&mut hasher);
        hasher.finish()
    }

    /// Serialize the simulation state for replay or snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| ArenaError::InvalidState(format!("Failed to serialize simulation: {}", e)))
    }

    /// Deserialize simulation state from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| {
            ArenaError::InvalidState(format!("Failed to deserialize simulation: {}", e))
        })
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
