//! Trait synergies: counting, tier resolution and per-unit modifiers.
//!
//! Counting considers only living, non-benched units and counts each unit
//! type name once per trait, so duplicates of one unit never raise a tier on
//! their own. Modifiers are attached, refreshed and detached idempotently:
//! each one remembers the stat amounts it applied and only the difference
//! to the new tier is written back.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::SimulationContext;
use crate::data::{TierParams, TraitDefinition};
use crate::events::{DeathEvent, DeathReaction, SubscriptionId};
use crate::math::{fixed_serde, pct_of, percent, Fixed};
use crate::unit::{Team, Unit, UnitId};

/// Synergy tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TraitId {
    /// Bonus armor.
    Guardian,
    /// Bonus max health.
    Titan,
    /// Attack speed ramp per attack.
    Berserker,
    /// Damage ramp per second of combat.
    Warlord,
    /// Auto-attacks execute low-health targets.
    Reaper,
    /// Survivors grow when an ally falls.
    Packbond,
}

impl TraitId {
    /// Every trait, in evaluation order.
    pub const ALL: [Self; 6] = [
        Self::Guardian,
        Self::Titan,
        Self::Berserker,
        Self::Warlord,
        Self::Reaper,
        Self::Packbond,
    ];
}

/// Active-unit count per trait.
pub type TraitCounts = BTreeMap<TraitId, u32>;

/// Per-unit trait modifier carrying the active tier's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitModifier {
    /// Trait this modifier belongs to.
    pub trait_id: TraitId,
    /// Active tier, 1-based.
    pub tier: usize,
    /// Tuned parameters of the tier.
    pub params: TierParams,
    /// Permanent bonus health currently applied by this modifier.
    #[serde(with = "fixed_serde")]
    pub applied_health: Fixed,
    /// Bonus armor currently applied by this modifier.
    #[serde(with = "fixed_serde")]
    pub applied_armor: Fixed,
    /// Current attack speed ramp as a fraction.
    #[serde(with = "fixed_serde")]
    pub attack_speed_ramp: Fixed,
    /// Current damage ramp as a fraction.
    #[serde(with = "fixed_serde")]
    pub damage_ramp: Fixed,
    /// Death bus subscription owned by this modifier.
    pub subscription: Option<SubscriptionId>,
}

impl TraitModifier {
    fn new(trait_id: TraitId) -> Self {
        Self {
            trait_id,
            tier: 0,
            params: TierParams::default(),
            applied_health: Fixed::ZERO,
            applied_armor: Fixed::ZERO,
            attack_speed_ramp: Fixed::ZERO,
            damage_ramp: Fixed::ZERO,
            subscription: None,
        }
    }
}

/// Snapshot of one trait for display and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitStatus {
    /// Trait.
    pub trait_id: TraitId,
    /// Distinct active unit types carrying it.
    pub count: u32,
    /// Active tier, 0 when inactive.
    pub tier: usize,
    /// Highest threshold met, 0 when none.
    pub met: u32,
    /// Next threshold, 0 at the top tier.
    pub next: u32,
}

/// Tier resolution over a trait catalogue.
#[derive(Debug, Clone, Copy)]
pub struct TraitAggregator<'a> {
    definitions: &'a [TraitDefinition],
}

impl<'a> TraitAggregator<'a> {
    /// Create an aggregator over a catalogue.
    #[must_use]
    pub fn new(definitions: &'a [TraitDefinition]) -> Self {
        Self { definitions }
    }

    /// Count traits across `units`.
    ///
    /// Benched and dead units are skipped; each unit type name counts once
    /// per trait.
    pub fn count<'u>(units: impl IntoIterator<Item = &'u Unit>) -> TraitCounts {
        let mut seen: BTreeSet<(TraitId, &str)> = BTreeSet::new();
        let mut counts = TraitCounts::new();
        for unit in units {
            if !unit.is_targetable() {
                continue;
            }
            for &trait_id in &unit.traits {
                if seen.insert((trait_id, unit.name.as_str())) {
                    *counts.entry(trait_id).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    fn definition(&self, trait_id: TraitId) -> Option<&'a TraitDefinition> {
        self.definitions.iter().find(|d| d.id == trait_id)
    }

    /// Number of thresholds met, 0 when inactive.
    #[must_use]
    pub fn current_tier(&self, trait_id: TraitId, count: u32) -> usize {
        self.definition(trait_id)
            .map_or(0, |d| d.thresholds.iter().take_while(|&&t| count >= t).count())
    }

    /// Whether at least the first tier is active.
    #[must_use]
    pub fn is_active(&self, trait_id: TraitId, count: u32) -> bool {
        self.current_tier(trait_id, count) > 0
    }

    /// `(highest threshold met or 0, next threshold or 0)`.
    #[must_use]
    pub fn breakpoints(&self, trait_id: TraitId, count: u32) -> (u32, u32) {
        let Some(definition) = self.definition(trait_id) else {
            return (0, 0);
        };
        let tier = self.current_tier(trait_id, count);
        let met = if tier == 0 {
            0
        } else {
            definition.thresholds[tier - 1]
        };
        let next = definition.thresholds.get(tier).copied().unwrap_or(0);
        (met, next)
    }

    /// Active tier and its parameters, if any.
    #[must_use]
    pub fn tier_params(&self, trait_id: TraitId, count: u32) -> Option<(usize, TierParams)> {
        let tier = self.current_tier(trait_id, count);
        if tier == 0 {
            return None;
        }
        let params = self.definition(trait_id)?.tiers.get(tier - 1).copied()?;
        Some((tier, params))
    }

    /// Status of every trait present in `counts`.
    #[must_use]
    pub fn statuses(&self, counts: &TraitCounts) -> Vec<TraitStatus> {
        counts
            .iter()
            .map(|(&trait_id, &count)| {
                let (met, next) = self.breakpoints(trait_id, count);
                TraitStatus {
                    trait_id,
                    count,
                    tier: self.current_tier(trait_id, count),
                    met,
                    next,
                }
            })
            .collect()
    }
}

/// Trait counts of one team.
#[must_use]
pub fn team_counts(ctx: &SimulationContext, team: Team) -> TraitCounts {
    let ids = ctx.rosters.ids(team);
    TraitAggregator::count(ids.iter().filter_map(|&id| ctx.unit(id)))
}

/// Re-evaluate traits for both teams and sync every unit's modifiers.
pub fn apply_bonuses(ctx: &mut SimulationContext) {
    let definitions = ctx.config.traits.clone();
    let aggregator = TraitAggregator::new(&definitions);

    for team in [Team::Player, Team::Enemy] {
        let counts = team_counts(ctx, team);
        for id in ctx.rosters.ids(team) {
            let Some(unit) = ctx.unit(id) else {
                continue;
            };
            let contributes = unit.is_targetable();
            let tags = unit.traits.clone();

            for trait_id in TraitId::ALL {
                let active = if contributes && tags.contains(&trait_id) {
                    let count = counts.get(&trait_id).copied().unwrap_or(0);
                    aggregator.tier_params(trait_id, count)
                } else {
                    None
                };
                match active {
                    Some((tier, params)) => attach_or_refresh(ctx, id, trait_id, tier, params),
                    None => detach(ctx, id, trait_id),
                }
            }
        }
    }
    ctx.traits_dirty = false;
}

/// Attach a modifier or bring an existing one to `tier`.
fn attach_or_refresh(
    ctx: &mut SimulationContext,
    id: UnitId,
    trait_id: TraitId,
    tier: usize,
    params: TierParams,
) {
    let Some(unit) = ctx.units.get_mut(id) else {
        return;
    };
    let base_health = unit.stats.base_max_health;
    let modifier = unit
        .modifiers
        .entry(trait_id)
        .or_insert_with(|| TraitModifier::new(trait_id));
    let previous_tier = modifier.tier;
    modifier.tier = tier;
    modifier.params = params;

    let health = pct_of(base_health, params.bonus_health_pct);
    let health_delta = health - modifier.applied_health;
    modifier.applied_health = health;

    let armor = Fixed::from_num(params.bonus_armor);
    let armor_delta = armor - modifier.applied_armor;
    modifier.applied_armor = armor;

    modifier.attack_speed_ramp = modifier
        .attack_speed_ramp
        .min(percent(params.attack_speed_cap_pct));
    modifier.damage_ramp = modifier.damage_ramp.min(percent(params.damage_cap_pct));

    let wants_subscription = params.death_share_pct > 0;
    let subscription = modifier.subscription;

    unit.stats.permanent_bonus_health += health_delta;
    unit.stats.bonus_armor += armor_delta;
    if health_delta > Fixed::ZERO {
        unit.stats.current_health += health_delta;
    } else {
        unit.stats.current_health = unit.stats.current_health.min(unit.stats.max_health());
    }

    match (wants_subscription, subscription) {
        (true, None) => {
            let handle = ctx.bus.subscribe(id, DeathReaction::DeathShare);
            if let Some(m) = ctx
                .units
                .get_mut(id)
                .and_then(|u| u.modifiers.get_mut(&trait_id))
            {
                m.subscription = Some(handle);
            }
        }
        (false, Some(handle)) => {
            ctx.bus.unsubscribe(handle);
            if let Some(m) = ctx
                .units
                .get_mut(id)
                .and_then(|u| u.modifiers.get_mut(&trait_id))
            {
                m.subscription = None;
            }
        }
        _ => {}
    }

    if previous_tier != tier {
        debug!("Unit {} {:?} tier {} -> {}", id, trait_id, previous_tier, tier);
    }
    if health_delta != Fixed::ZERO {
        ctx.emit_health(id);
    }
}

/// Remove a modifier and revert everything it applied.
fn detach(ctx: &mut SimulationContext, id: UnitId, trait_id: TraitId) {
    let Some(unit) = ctx.units.get_mut(id) else {
        return;
    };
    let Some(modifier) = unit.modifiers.remove(&trait_id) else {
        return;
    };
    unit.stats.permanent_bonus_health -= modifier.applied_health;
    unit.stats.bonus_armor -= modifier.applied_armor;
    unit.stats.current_health = unit.stats.current_health.min(unit.stats.max_health());
    if let Some(handle) = modifier.subscription {
        ctx.bus.unsubscribe(handle);
    }
    debug!("Unit {} lost {:?}", id, trait_id);
    if modifier.applied_health != Fixed::ZERO {
        ctx.emit_health(id);
    }
}

/// Advance attack speed ramps after an auto-attack.
pub fn record_attack(unit: &mut Unit) {
    for modifier in unit.modifiers.values_mut() {
        let step = percent(modifier.params.attack_speed_per_attack_pct);
        if step > Fixed::ZERO {
            let cap = percent(modifier.params.attack_speed_cap_pct);
            modifier.attack_speed_ramp = (modifier.attack_speed_ramp + step).min(cap);
        }
    }
}

/// Advance damage ramps by one tick of combat.
pub fn advance_ramps(unit: &mut Unit, dt: Fixed) {
    for modifier in unit.modifiers.values_mut() {
        let rate = percent(modifier.params.damage_per_second_pct);
        if rate > Fixed::ZERO {
            let cap = percent(modifier.params.damage_cap_pct);
            modifier.damage_ramp = (modifier.damage_ramp + rate * dt).min(cap);
        }
    }
}

/// Clear combat-only ramps.
pub fn reset_ramps(unit: &mut Unit) {
    for modifier in unit.modifiers.values_mut() {
        modifier.attack_speed_ramp = Fixed::ZERO;
        modifier.damage_ramp = Fixed::ZERO;
    }
}

/// Health fraction under which this unit's auto-attacks execute.
#[must_use]
pub fn execute_threshold(unit: &Unit) -> Fixed {
    unit.modifiers
        .values()
        .map(|m| percent(m.params.execute_threshold_pct))
        .max()
        .unwrap_or(Fixed::ZERO)
}

/// Death-share reaction: a fallen ally's strength passes to `owner`.
pub fn share_death(ctx: &mut SimulationContext, owner: UnitId, event: &DeathEvent) {
    let Some(unit) = ctx.units.get_mut(owner) else {
        return;
    };
    if owner == event.unit || unit.team != event.team || !unit.is_targetable() {
        return;
    }
    let share = unit
        .modifiers
        .values()
        .map(|m| m.params.death_share_pct)
        .max()
        .unwrap_or(0);
    if share == 0 {
        return;
    }
    let gain = pct_of(event.max_health, share);
    unit.stats.round_bonus_health += gain;
    unit.stats.current_health += gain;
    ctx.emit_health(owner);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationConfig, UnitTemplate};
    use crate::unit::UnitState;

    fn unit(name: &str, traits: &[TraitId]) -> Unit {
        let mut template = UnitTemplate::new(name, 100, 10);
        for &t in traits {
            template = template.with_trait(t);
        }
        let mut unit = Unit::from_template(0, &template, Team::Player);
        unit.state = UnitState::BoardIdle;
        unit
    }

    #[test]
    fn test_duplicates_count_once() {
        let units: Vec<Unit> = (0..5).map(|_| unit("knight", &[TraitId::Guardian])).collect();
        let counts = TraitAggregator::count(&units);
        assert_eq!(counts.get(&TraitId::Guardian), Some(&1));
    }

    #[test]
    fn test_benched_and_dead_units_do_not_count() {
        let mut benched = unit("a", &[TraitId::Titan]);
        benched.state = UnitState::Bench;
        let mut dead = unit("b", &[TraitId::Titan]);
        dead.is_alive = false;
        let alive = unit("c", &[TraitId::Titan]);

        let counts = TraitAggregator::count([&benched, &dead, &alive]);
        assert_eq!(counts.get(&TraitId::Titan), Some(&1));
    }

    #[test]
    fn test_breakpoints() {
        let config = SimulationConfig::default();
        let aggregator = TraitAggregator::new(&config.traits);
        // Guardian thresholds are 2 and 4.
        assert_eq!(aggregator.breakpoints(TraitId::Guardian, 0), (0, 2));
        assert_eq!(aggregator.breakpoints(TraitId::Guardian, 1), (0, 2));
        assert_eq!(aggregator.breakpoints(TraitId::Guardian, 3), (2, 4));
        assert_eq!(aggregator.breakpoints(TraitId::Guardian, 4), (4, 0));
        assert_eq!(aggregator.breakpoints(TraitId::Guardian, 9), (4, 0));
        assert!(!aggregator.is_active(TraitId::Guardian, 1));
        assert!(aggregator.is_active(TraitId::Guardian, 2));
        assert_eq!(aggregator.current_tier(TraitId::Guardian, 5), 2);
    }

    #[test]
    fn test_apply_bonuses_is_idempotent() {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        let a = ctx.insert_unit(unit("a", &[TraitId::Titan, TraitId::Guardian]));
        let _b = ctx.insert_unit(unit("b", &[TraitId::Titan, TraitId::Guardian]));

        apply_bonuses(&mut ctx);
        let once = ctx.unit(a).unwrap().stats.clone();
        apply_bonuses(&mut ctx);
        let twice = ctx.unit(a).unwrap().stats.clone();

        assert_eq!(once, twice);
        // Titan tier 1: +15% of 100.
        assert_eq!(once.permanent_bonus_health, Fixed::from_num(15));
        assert_eq!(once.current_health, Fixed::from_num(115));
        assert_eq!(once.bonus_armor, Fixed::from_num(20));
    }

    #[test]
    fn test_detach_reverts_stats() {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        let a = ctx.insert_unit(unit("a", &[TraitId::Guardian]));
        let b = ctx.insert_unit(unit("b", &[TraitId::Guardian]));
        apply_bonuses(&mut ctx);
        assert!(ctx.unit(a).unwrap().modifiers.contains_key(&TraitId::Guardian));

        ctx.unit_mut(b).unwrap().state = UnitState::Bench;
        apply_bonuses(&mut ctx);

        let unit_a = ctx.unit(a).unwrap();
        assert!(unit_a.modifiers.is_empty());
        assert_eq!(unit_a.stats.bonus_armor, Fixed::ZERO);
        assert!(ctx.unit(b).unwrap().modifiers.is_empty());
    }

    #[test]
    fn test_packbond_subscribes_and_unsubscribes() {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        let a = ctx.insert_unit(unit("a", &[TraitId::Packbond]));
        let b = ctx.insert_unit(unit("b", &[TraitId::Packbond]));
        apply_bonuses(&mut ctx);
        assert_eq!(ctx.bus.subscriptions().len(), 2);

        // Re-applying does not subscribe twice.
        apply_bonuses(&mut ctx);
        assert_eq!(ctx.bus.subscriptions().len(), 2);

        ctx.unit_mut(b).unwrap().state = UnitState::Bench;
        apply_bonuses(&mut ctx);
        assert!(ctx.bus.subscriptions().is_empty());
        assert!(ctx.unit(a).unwrap().modifiers.is_empty());
    }

    #[test]
    fn test_ramps_cap() {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        let a = ctx.insert_unit(unit("a", &[TraitId::Berserker, TraitId::Warlord]));
        ctx.insert_unit(unit("b", &[TraitId::Berserker, TraitId::Warlord]));
        apply_bonuses(&mut ctx);

        let unit_a = ctx.unit_mut(a).unwrap();
        for _ in 0..20 {
            record_attack(unit_a);
        }
        for _ in 0..400 {
            advance_ramps(unit_a, Fixed::ONE / Fixed::from_num(20));
        }
        let berserker = &unit_a.modifiers[&TraitId::Berserker];
        let warlord = &unit_a.modifiers[&TraitId::Warlord];
        assert_eq!(berserker.attack_speed_ramp, percent(40));
        assert_eq!(warlord.damage_ramp, percent(30));

        reset_ramps(unit_a);
        assert_eq!(unit_a.modifiers[&TraitId::Berserker].attack_speed_ramp, Fixed::ZERO);
    }
}
