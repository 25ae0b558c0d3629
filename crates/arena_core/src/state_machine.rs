//! Unit state machine: Bench → BoardIdle → Combat → (Bench | destroyed).
//!
//! Transitions carry side effects on the unit's flags, target and cooldown.
//! The per-tick combat loop lives in [`update_unit`]: revalidate the target,
//! attack when in range and off cooldown, otherwise steer toward the
//! stand-off point with local avoidance.

use tracing::{trace, warn};

use crate::abilities;
use crate::context::SimulationContext;
use crate::damage::{self, DamageOutcome};
use crate::data::CombatTuning;
use crate::error::{ArenaError, Result};
use crate::mana;
use crate::math::{pct_of, Fixed, Vec2Fixed};
use crate::synergy;
use crate::targeting;
use crate::unit::{UnitId, UnitState};

/// Whether `from → to` is a legal transition.
///
/// Re-entering `Combat` is allowed so a restored unit can resume fighting.
#[must_use]
pub fn can_transition(from: UnitState, to: UnitState) -> bool {
    matches!(
        (from, to),
        (_, UnitState::Bench)
            | (UnitState::Bench, UnitState::BoardIdle)
            | (UnitState::BoardIdle | UnitState::Combat, UnitState::Combat)
            | (UnitState::Combat, UnitState::BoardIdle)
    )
}

/// Move a unit into `state`, running the transition's side effects.
///
/// Returns the previous state.
///
/// # Errors
///
/// Returns [`ArenaError::UnitNotFound`] for an unknown unit and
/// [`ArenaError::InvalidTransition`] for an illegal transition.
pub fn enter_state(ctx: &mut SimulationContext, id: UnitId, state: UnitState) -> Result<UnitState> {
    let unit = ctx.units.get_mut(id).ok_or(ArenaError::UnitNotFound(id))?;
    let from = unit.state;
    if !can_transition(from, state) {
        warn!("Rejected transition {:?} -> {:?} for unit {}", from, state, id);
        return Err(ArenaError::InvalidTransition {
            unit: id,
            from,
            to: state,
            reason: "not a legal state change",
        });
    }

    unit.state = state;
    match state {
        UnitState::Combat => {
            unit.target = None;
            unit.attack_cooldown = Fixed::ZERO;
            unit.can_move = unit.is_alive;
            unit.can_attack = unit.is_alive;
        }
        UnitState::Bench => {
            unit.target = None;
            unit.can_move = false;
            unit.can_attack = false;
            unit.is_casting = false;
        }
        UnitState::BoardIdle => {
            unit.target = None;
            unit.can_move = true;
            unit.can_attack = true;
            unit.attack_cooldown = Fixed::ZERO;
        }
    }
    let counted_changed = (from == UnitState::Bench) != (state == UnitState::Bench);
    let has_traits = !unit.traits.is_empty();

    if state == UnitState::Bench {
        // Casts and leaps in flight never resolve for a benched unit.
        ctx.scheduler.cancel_owner(id);
    }
    if counted_changed && has_traits {
        ctx.mark_traits_dirty();
    }
    trace!("Unit {} {:?} -> {:?}", id, from, state);
    Ok(from)
}

/// Point a unit heads for when approaching `target`.
///
/// Melee units stop `stopping_distance` short of the target, ranged units
/// `ranged_standoff_pct` of their range short. Never further than the range.
#[must_use]
pub fn standoff_point(
    origin: Vec2Fixed,
    target: Vec2Fixed,
    attack_range: Fixed,
    tuning: &CombatTuning,
) -> Vec2Fixed {
    let approach = (target - origin).normalize();
    if approach.is_zero() {
        return origin;
    }
    let offset = if tuning.is_melee(attack_range) {
        tuning.stopping_distance
    } else {
        pct_of(attack_range, tuning.ranged_standoff_pct)
    };
    target - approach.scale(offset.min(attack_range))
}

/// Repulsion away from `neighbors` closer than `radius`, scaled by proximity.
#[must_use]
pub fn avoidance(origin: Vec2Fixed, neighbors: &[Vec2Fixed], radius: Fixed) -> Vec2Fixed {
    if radius <= Fixed::ZERO {
        return Vec2Fixed::ZERO;
    }
    neighbors.iter().fold(Vec2Fixed::ZERO, |push, &other| {
        let away = origin - other;
        let distance = away.length();
        if distance >= radius || distance == Fixed::ZERO {
            return push;
        }
        let weight = (radius - distance) / radius;
        push + away.normalize().scale(weight)
    })
}

/// Advance one unit by one tick.
///
/// Only living `Combat` units act. Casting units keep their bookkeeping
/// (cooldown decay, ramps, target validity) but neither move nor attack.
pub fn update_unit(ctx: &mut SimulationContext, id: UnitId) {
    let dt = ctx.dt();
    let Some(unit) = ctx.units.get_mut(id) else {
        return;
    };
    if !unit.in_combat() || !unit.is_alive || unit.pending_removal {
        return;
    }
    unit.attack_cooldown = (unit.attack_cooldown - dt).max(Fixed::ZERO);
    synergy::advance_ramps(unit, dt);
    let casting = unit.is_casting;

    let Some(target) = acquire_target(ctx, id) else {
        return;
    };
    if casting {
        return;
    }

    let Some(unit) = ctx.unit(id) else {
        return;
    };
    let Some(target_position) = ctx.unit(target).map(|t| t.position) else {
        return;
    };
    let in_range = unit.position.distance(target_position) <= unit.stats.attack_range;

    if in_range {
        if unit.can_attack && unit.attack_cooldown <= Fixed::ZERO {
            attack(ctx, id, target);
        }
    } else if unit.can_move {
        step_towards(ctx, id, target, target_position);
    }
}

/// Keep the current target if still valid, otherwise pick a new one.
fn acquire_target(ctx: &mut SimulationContext, id: UnitId) -> Option<UnitId> {
    let unit = ctx.unit(id)?;
    let team = unit.team;
    let current = unit.target;
    if let Some(target) = current.filter(|&t| targeting::is_valid_target(ctx, team, t)) {
        return Some(target);
    }

    let fresh = targeting::find_target(ctx, id);
    if fresh != current {
        trace!("Unit {} retargets {:?} -> {:?}", id, current, fresh);
    }
    if let Some(unit) = ctx.units.get_mut(id) {
        unit.target = fresh;
    }
    fresh
}

/// One auto-attack on `target`, followed by the attacker's bookkeeping.
fn attack(ctx: &mut SimulationContext, attacker: UnitId, target: UnitId) {
    if !abilities::on_auto_attack(ctx, attacker, target) {
        let amount = ctx
            .unit(attacker)
            .map_or(Fixed::ZERO, |u| u.effective_attack_damage());
        let outcome = damage::apply_damage(ctx, Some(attacker), target, amount);

        if let DamageOutcome::Damaged { .. } = outcome {
            let threshold = ctx
                .unit(attacker)
                .map_or(Fixed::ZERO, synergy::execute_threshold);
            let below = ctx
                .unit(target)
                .is_some_and(|t| t.stats.health_fraction() < threshold);
            if threshold > Fixed::ZERO && below {
                damage::execute(ctx, target, Some(attacker));
            }
        }
    }

    let Some(unit) = ctx.units.get_mut(attacker) else {
        return;
    };
    synergy::record_attack(unit);
    unit.attack_cooldown = unit.attack_interval();
    let gain = ctx.config.combat.mana_per_attack;
    mana::gain_mana(ctx, attacker, gain);
}

/// Move toward the stand-off point of `target`, avoiding other units.
fn step_towards(ctx: &mut SimulationContext, id: UnitId, target: UnitId, target_position: Vec2Fixed) {
    let tuning = &ctx.config.combat;
    let dt = ctx.config.tick_seconds();
    let Some(unit) = ctx.unit(id) else {
        return;
    };
    let origin = unit.position;
    let goal = standoff_point(origin, target_position, unit.stats.attack_range, tuning);
    let remaining = origin.distance(goal);
    let step = (unit.stats.move_speed * dt).min(remaining);
    if step <= Fixed::ZERO {
        return;
    }

    let others: Vec<Vec2Fixed> = ctx
        .rosters
        .all_ids()
        .into_iter()
        .filter(|&other| other != id)
        .filter_map(|other| ctx.unit(other))
        .filter(|u| u.is_targetable())
        .map(|u| u.position)
        .collect();
    let neighbors: Vec<Vec2Fixed> = ctx
        .rosters
        .all_ids()
        .into_iter()
        .filter(|&other| other != id && other != target)
        .filter_map(|other| ctx.unit(other))
        .filter(|u| u.is_targetable())
        .map(|u| u.position)
        .collect();

    let desired = (goal - origin).normalize();
    let push = avoidance(origin, &neighbors, tuning.avoidance_radius).scale(tuning.avoidance_weight);
    let blended = (desired + push).normalize();
    let heading = if blended.is_zero() { desired } else { blended };

    let spacing = tuning.unit_radius * Fixed::from_num(2);
    let blocked = |next: Vec2Fixed| {
        others.iter().any(|&other| {
            let gap = next.distance(other);
            gap < spacing && gap < origin.distance(other)
        })
    };

    let candidates = [
        heading,
        heading.perpendicular(),
        -heading.perpendicular(),
    ];
    let next = candidates
        .iter()
        .map(|&direction| origin + direction.scale(step))
        .find(|&next| !blocked(next));

    if let (Some(next), Some(unit)) = (next, ctx.units.get_mut(id)) {
        unit.position = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::test_support::{context, spawn};
    use crate::abilities::AbilityKind;
    use crate::data::{SimulationConfig, TierParams, TraitDefinition};
    use crate::math::ratio;
    use crate::scheduler::Continuation;
    use crate::synergy::TraitId;
    use crate::unit::Team;

    #[test]
    fn test_transition_table() {
        assert!(can_transition(UnitState::Bench, UnitState::BoardIdle));
        assert!(can_transition(UnitState::BoardIdle, UnitState::Combat));
        assert!(can_transition(UnitState::Combat, UnitState::Bench));
        assert!(can_transition(UnitState::Combat, UnitState::Combat));
        assert!(!can_transition(UnitState::Bench, UnitState::Combat));
    }

    #[test]
    fn test_bench_to_combat_is_rejected() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Team::Player, "a", 100, None, (0, 0));
        enter_state(&mut ctx, id, UnitState::Bench).unwrap();
        let err = enter_state(&mut ctx, id, UnitState::Combat).unwrap_err();
        assert!(matches!(err, ArenaError::InvalidTransition { .. }));
        assert!(ctx.unit(id).unwrap().is_benched());
    }

    #[test]
    fn test_entering_bench_clears_and_cancels() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Team::Player, "a", 100, Some(AbilityKind::Leap), (0, 0));
        {
            let unit = ctx.unit_mut(id).unwrap();
            unit.target = Some(99);
            unit.is_casting = true;
        }
        ctx.schedule(id, 5, Continuation::FinishCast);

        assert_eq!(enter_state(&mut ctx, id, UnitState::Bench).unwrap(), UnitState::Combat);
        let unit = ctx.unit(id).unwrap();
        assert_eq!(unit.target, None);
        assert!(!unit.can_move && !unit.can_attack && !unit.is_casting);
        assert_eq!(ctx.scheduler.pending_for(id), 0);
    }

    #[test]
    fn test_entering_combat_resets_cooldown_and_target() {
        let mut ctx = context();
        let id = spawn(&mut ctx, Team::Player, "a", 100, None, (0, 0));
        {
            let unit = ctx.unit_mut(id).unwrap();
            unit.state = UnitState::BoardIdle;
            unit.target = Some(7);
            unit.attack_cooldown = Fixed::from_num(3);
        }
        enter_state(&mut ctx, id, UnitState::Combat).unwrap();
        let unit = ctx.unit(id).unwrap();
        assert_eq!(unit.target, None);
        assert_eq!(unit.attack_cooldown, Fixed::ZERO);
    }

    #[test]
    fn test_melee_and_ranged_standoff() {
        let tuning = SimulationConfig::default().combat;
        let origin = Vec2Fixed::ZERO;
        let target = Vec2Fixed::from_ints(10, 0);

        let close = |a: Fixed, b: Fixed| (a - b).abs() < ratio(1, 10_000);

        let melee = standoff_point(origin, target, Fixed::ONE, &tuning);
        assert!(close(melee.x, Fixed::from_num(10) - tuning.stopping_distance));

        let ranged = standoff_point(origin, target, Fixed::from_num(5), &tuning);
        assert!(close(ranged.x, Fixed::from_num(6)));
        assert_eq!(ranged.y, Fixed::ZERO);
    }

    #[test]
    fn test_avoidance_pushes_away_from_close_units() {
        let origin = Vec2Fixed::ZERO;
        let push = avoidance(origin, &[Vec2Fixed::new(ratio(1, 2), Fixed::ZERO)], Fixed::ONE);
        assert!(push.x < Fixed::ZERO);
        assert_eq!(push.y, Fixed::ZERO);

        let far = avoidance(origin, &[Vec2Fixed::from_ints(5, 0)], Fixed::ONE);
        assert!(far.is_zero());
    }

    fn place(ctx: &mut SimulationContext, id: UnitId, x: Fixed, y: Fixed) {
        ctx.unit_mut(id).unwrap().position = Vec2Fixed::new(x, y);
    }

    #[test]
    fn test_blocked_step_sidesteps() {
        let mut ctx = context();
        let walker = spawn(&mut ctx, Team::Player, "walker", 100, None, (0, 0));
        let ally = spawn(&mut ctx, Team::Player, "ally", 100, None, (0, 0));
        spawn(&mut ctx, Team::Enemy, "foe", 100, None, (6, 0));
        place(&mut ctx, ally, ratio(7, 10), Fixed::ZERO);

        update_unit(&mut ctx, walker);
        let position = ctx.unit(walker).unwrap().position;
        assert_eq!(position.x, Fixed::ZERO);
        assert_ne!(position.y, Fixed::ZERO);
    }

    #[test]
    fn test_fully_blocked_unit_stays_put() {
        let mut ctx = context();
        let walker = spawn(&mut ctx, Team::Player, "walker", 100, None, (0, 0));
        let ahead = spawn(&mut ctx, Team::Player, "ahead", 100, None, (0, 0));
        let left = spawn(&mut ctx, Team::Player, "left", 100, None, (0, 0));
        let right = spawn(&mut ctx, Team::Player, "right", 100, None, (0, 0));
        spawn(&mut ctx, Team::Enemy, "foe", 100, None, (6, 0));
        place(&mut ctx, ahead, ratio(7, 10), Fixed::ZERO);
        place(&mut ctx, left, Fixed::ZERO, ratio(3, 5));
        place(&mut ctx, right, Fixed::ZERO, -ratio(3, 5));

        update_unit(&mut ctx, walker);
        assert_eq!(ctx.unit(walker).unwrap().position, Vec2Fixed::ZERO);
    }

    #[test]
    fn test_unit_walks_toward_enemy() {
        let mut ctx = context();
        let walker = spawn(&mut ctx, Team::Player, "walker", 100, None, (0, 0));
        let foe = spawn(&mut ctx, Team::Enemy, "foe", 100, None, (6, 0));

        update_unit(&mut ctx, walker);
        let unit = ctx.unit(walker).unwrap();
        assert_eq!(unit.target, Some(foe));
        assert!(unit.position.x > Fixed::ZERO);
        assert_eq!(ctx.unit(foe).unwrap().stats.current_health, Fixed::from_num(100));
    }

    #[test]
    fn test_attack_in_range_on_cooldown() {
        let mut ctx = context();
        let attacker = spawn(&mut ctx, Team::Player, "a", 100, None, (0, 0));
        let foe = spawn(&mut ctx, Team::Enemy, "foe", 100, None, (1, 0));

        update_unit(&mut ctx, attacker);
        assert_eq!(ctx.unit(foe).unwrap().stats.current_health, Fixed::from_num(90));
        // Cooldown blocks the next tick.
        update_unit(&mut ctx, attacker);
        assert_eq!(ctx.unit(foe).unwrap().stats.current_health, Fixed::from_num(90));
        // A damage-taken tick for the target.
        assert_eq!(ctx.unit(foe).unwrap().stats.current_mana, 0);
    }

    #[test]
    fn test_attack_feeds_mana_and_casts() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "a", 100, Some(AbilityKind::Reap), (0, 0));
        spawn(&mut ctx, Team::Enemy, "foe", 10_000, None, (1, 0));

        let mut casts = 0;
        for _ in 0..200 {
            update_unit(&mut ctx, caster);
            ctx.tick += 1;
            let now = ctx.tick;
            for entry in ctx.scheduler.pop_due(now) {
                abilities::resume(&mut ctx, &entry);
            }
            casts = ctx.unit(caster).unwrap().ability.as_ref().unwrap().casts;
            if casts > 0 {
                break;
            }
        }
        assert_eq!(casts, 1);
        assert_eq!(ctx.unit(caster).unwrap().stats.current_mana, 0);
    }

    #[test]
    fn test_casting_suspends_attacks() {
        let mut ctx = context();
        let attacker = spawn(&mut ctx, Team::Player, "a", 100, None, (0, 0));
        let foe = spawn(&mut ctx, Team::Enemy, "foe", 100, None, (1, 0));
        ctx.unit_mut(attacker).unwrap().is_casting = true;

        update_unit(&mut ctx, attacker);
        assert_eq!(ctx.unit(attacker).unwrap().target, Some(foe));
        assert_eq!(ctx.unit(foe).unwrap().stats.current_health, Fixed::from_num(100));
    }

    #[test]
    fn test_reaper_attacks_execute() {
        let mut config = SimulationConfig::default();
        config.traits = vec![TraitDefinition::new(
            TraitId::Reaper,
            &[(
                1,
                TierParams {
                    execute_threshold_pct: 50,
                    ..TierParams::default()
                },
            )],
        )];
        let mut ctx = SimulationContext::new(config);
        ctx.round_active = true;
        let attacker = spawn(&mut ctx, Team::Player, "a", 100, None, (0, 0));
        ctx.unit_mut(attacker).unwrap().traits.push(TraitId::Reaper);
        let foe = spawn(&mut ctx, Team::Enemy, "foe", 100, None, (1, 0));
        ctx.unit_mut(foe).unwrap().stats.current_health = Fixed::from_num(55);
        synergy::apply_bonuses(&mut ctx);

        update_unit(&mut ctx, attacker);
        assert!(!ctx.unit(foe).unwrap().is_alive);
        assert_eq!(ctx.bus.deaths_of(foe), 1);
    }

    #[test]
    fn test_benched_and_dead_units_do_nothing() {
        let mut ctx = context();
        let idle = spawn(&mut ctx, Team::Player, "a", 100, None, (0, 0));
        let foe = spawn(&mut ctx, Team::Enemy, "foe", 100, None, (1, 0));
        ctx.unit_mut(idle).unwrap().state = UnitState::BoardIdle;
        update_unit(&mut ctx, idle);
        damage::kill(&mut ctx, foe, None);
        ctx.unit_mut(idle).unwrap().state = UnitState::Combat;
        update_unit(&mut ctx, idle);
        assert_eq!(ctx.unit(idle).unwrap().target, None);
    }
}
