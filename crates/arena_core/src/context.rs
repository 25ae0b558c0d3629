//! Simulation context: the state shared by every combat system.
//!
//! One context per simulation. It owns the units, the team rosters, the death
//! bus, the continuation scheduler and the configuration, so independent
//! simulations never share state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::data::SimulationConfig;
use crate::events::{DeathEvent, DeathEventBus, PresentationEvent};
use crate::math::Fixed;
use crate::scheduler::{Continuation, Scheduler};
use crate::unit::{Team, TileId, Unit, UnitId};

/// Storage for all units in the simulation.
///
/// Uses a `HashMap` for O(1) unit lookup by ID, with deterministic
/// iteration via sorted keys when processing systems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitStorage {
    /// Map of unit ID to unit data.
    units: HashMap<UnitId, Unit>,
    /// Next unit ID to assign.
    next_id: UnitId,
}

impl UnitStorage {
    /// Create empty unit storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a unit under a fresh ID and return the ID.
    pub fn insert(&mut self, mut unit: Unit) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit by ID.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        self.units.remove(&id)
    }

    /// Get a unit by ID.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Get a mutable reference to a unit by ID.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sorted unit IDs for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all units (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &Unit)> {
        self.units.iter()
    }
}

/// Registration-ordered unit lists per team.
///
/// Targeting ties resolve in this order. Only register and unregister
/// mutate the lists; readers take a copy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rosters {
    player: Vec<UnitId>,
    enemy: Vec<UnitId>,
}

impl Rosters {
    /// Append a unit to its team's roster.
    pub fn register(&mut self, team: Team, id: UnitId) {
        let roster = self.roster_mut(team);
        if !roster.contains(&id) {
            roster.push(id);
        }
    }

    /// Remove a unit from whichever roster holds it.
    pub fn unregister(&mut self, id: UnitId) -> bool {
        let before = self.player.len() + self.enemy.len();
        self.player.retain(|&u| u != id);
        self.enemy.retain(|&u| u != id);
        before != self.player.len() + self.enemy.len()
    }

    /// Copy of a team's roster in registration order.
    #[must_use]
    pub fn ids(&self, team: Team) -> Vec<UnitId> {
        match team {
            Team::Player => self.player.clone(),
            Team::Enemy => self.enemy.clone(),
        }
    }

    /// Copy of both rosters, player first.
    #[must_use]
    pub fn all_ids(&self) -> Vec<UnitId> {
        self.player.iter().chain(&self.enemy).copied().collect()
    }

    fn roster_mut(&mut self, team: Team) -> &mut Vec<UnitId> {
        match team {
            Team::Player => &mut self.player,
            Team::Enemy => &mut self.enemy,
        }
    }
}

/// Shared state for one simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationContext {
    /// Current tick.
    pub(crate) tick: u64,
    /// Tuning.
    pub(crate) config: SimulationConfig,
    /// All units.
    pub(crate) units: UnitStorage,
    /// Team rosters.
    pub(crate) rosters: Rosters,
    /// Death broadcast.
    pub(crate) bus: DeathEventBus,
    /// Pending continuations.
    pub(crate) scheduler: Scheduler,
    /// Presentation events since the last drain.
    pub(crate) events: Vec<PresentationEvent>,
    /// Deaths since the last drain.
    pub(crate) deaths: Vec<DeathEvent>,
    /// Roster composition changed; traits are re-evaluated at the next tick.
    pub(crate) traits_dirty: bool,
    /// A combat round is running.
    pub(crate) round_active: bool,
    /// Units to remove at the end of the tick.
    pub(crate) removals: Vec<UnitId>,
    /// Tiles left by removed units, cleared on the board at round end.
    pub(crate) vacated_tiles: Vec<TileId>,
}

impl SimulationContext {
    /// Create an empty context.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            tick: 0,
            config,
            units: UnitStorage::new(),
            rosters: Rosters::default(),
            bus: DeathEventBus::new(),
            scheduler: Scheduler::new(),
            events: Vec::new(),
            deaths: Vec::new(),
            traits_dirty: false,
            round_active: false,
            removals: Vec::new(),
            vacated_tiles: Vec::new(),
        }
    }

    /// Current tick.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Tuning.
    #[must_use]
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Death broadcast.
    #[must_use]
    pub const fn bus(&self) -> &DeathEventBus {
        &self.bus
    }

    /// Seconds per tick.
    #[must_use]
    pub fn dt(&self) -> Fixed {
        self.config.tick_seconds()
    }

    /// Get a unit by ID.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id)
    }

    /// Get a mutable unit by ID.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id)
    }

    /// Insert a unit, add it to its roster and return its ID.
    pub fn insert_unit(&mut self, unit: Unit) -> UnitId {
        let team = unit.team;
        let id = self.units.insert(unit);
        self.rosters.register(team, id);
        id
    }

    /// Record a presentation event.
    pub fn emit(&mut self, event: PresentationEvent) {
        self.events.push(event);
    }

    /// Emit the current health of a unit.
    pub fn emit_health(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get(id) {
            let event = PresentationEvent::HealthChanged {
                unit: id,
                current: unit.stats.current_health,
                max: unit.stats.max_health(),
            };
            self.events.push(event);
        }
    }

    /// Emit the current mana of a unit.
    pub fn emit_mana(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get(id) {
            let event = PresentationEvent::ManaChanged {
                unit: id,
                current: unit.stats.current_mana,
                max: unit.stats.max_mana,
            };
            self.events.push(event);
        }
    }

    /// Schedule a continuation `delay` ticks from now, stamped with the
    /// owner's current life.
    pub fn schedule(&mut self, owner: UnitId, delay: u32, action: Continuation) {
        let life = self.units.get(owner).map_or(0, |u| u.life);
        let resume = self.tick + u64::from(delay.max(1));
        self.scheduler.schedule(resume, owner, life, action);
    }

    /// Request trait re-evaluation at the start of the next tick.
    pub fn mark_traits_dirty(&mut self) {
        self.traits_dirty = true;
    }

    /// Queue a unit for removal at the end of the tick.
    pub fn queue_removal(&mut self, id: UnitId) {
        if let Some(unit) = self.units.get_mut(id) {
            if !unit.pending_removal {
                unit.pending_removal = true;
                self.removals.push(id);
            }
        }
    }

    /// Remove every queued unit. Returns the removed IDs.
    pub fn flush_removals(&mut self) -> Vec<UnitId> {
        let queued = std::mem::take(&mut self.removals);
        let mut removed = Vec::with_capacity(queued.len());
        for id in queued {
            if self.destroy_unit(id).is_some() {
                removed.push(id);
            }
        }
        removed
    }

    /// Remove a unit immediately, tearing down its continuations and
    /// subscriptions.
    pub fn destroy_unit(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.units.remove(id)?;
        self.scheduler.cancel_owner(id);
        self.bus.forget(id);
        self.rosters.unregister(id);
        if let Some(tile) = unit.tile {
            self.vacated_tiles.push(tile);
        }
        if !unit.traits.is_empty() {
            self.traits_dirty = true;
        }
        Some(unit)
    }

    /// Living, non-benched members of `team` in roster order.
    #[must_use]
    pub fn targetable_ids(&self, team: Team) -> Vec<UnitId> {
        self.rosters
            .ids(team)
            .into_iter()
            .filter(|&id| self.units.get(id).is_some_and(Unit::is_targetable))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UnitTemplate;
    use crate::events::DeathReaction;
    use crate::unit::UnitState;

    fn context_with_units() -> (SimulationContext, UnitId, UnitId) {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        let template = UnitTemplate::new("grunt", 100, 10);
        let a = ctx.insert_unit(Unit::from_template(0, &template, Team::Player));
        let b = ctx.insert_unit(Unit::from_template(0, &template, Team::Enemy));
        (ctx, a, b)
    }

    #[test]
    fn test_insert_assigns_ids_and_rosters() {
        let (ctx, a, b) = context_with_units();
        assert_eq!((a, b), (1, 2));
        assert_eq!(ctx.rosters.ids(Team::Player), vec![a]);
        assert_eq!(ctx.rosters.ids(Team::Enemy), vec![b]);
        assert_eq!(ctx.units.sorted_ids(), vec![1, 2]);
    }

    #[test]
    fn test_benched_units_are_not_targetable() {
        let (mut ctx, a, _) = context_with_units();
        assert!(ctx.targetable_ids(Team::Player).is_empty());
        ctx.unit_mut(a).unwrap().state = UnitState::BoardIdle;
        assert_eq!(ctx.targetable_ids(Team::Player), vec![a]);
    }

    #[test]
    fn test_removal_is_deferred_and_tears_down() {
        let (mut ctx, a, _) = context_with_units();
        ctx.unit_mut(a).unwrap().tile = Some(3);
        ctx.schedule(a, 5, Continuation::FinishCast);
        ctx.bus.subscribe(a, DeathReaction::SoulHarvest);

        ctx.queue_removal(a);
        ctx.queue_removal(a);
        assert!(ctx.unit(a).is_some());
        assert_eq!(ctx.removals.len(), 1);

        assert_eq!(ctx.flush_removals(), vec![a]);
        assert!(ctx.unit(a).is_none());
        assert_eq!(ctx.scheduler.pending_for(a), 0);
        assert!(ctx.bus.subscriptions().is_empty());
        assert!(ctx.rosters.ids(Team::Player).is_empty());
        assert_eq!(ctx.vacated_tiles, vec![3]);
    }

    #[test]
    fn test_schedule_uses_owner_life() {
        let (mut ctx, a, _) = context_with_units();
        ctx.unit_mut(a).unwrap().life = 2;
        ctx.schedule(a, 0, Continuation::HideFallen);
        let due = ctx.scheduler.pop_due(1);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].life, 2);
    }
}
