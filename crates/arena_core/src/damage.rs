//! Damage resolution: armor mitigation, health updates and the death pathway.
//!
//! Armor reduces damage by a fixed fraction per point:
//!
//! ```text
//! factor    = max(0, 1 - armor × armor_factor)
//! mitigated = raw × factor
//! ```
//!
//! The factor is clamped so very high armor blocks all damage instead of
//! turning hits into heals.

use tracing::debug;

use crate::abilities;
use crate::context::SimulationContext;
use crate::events::{DeathEvent, DeathReaction, PresentationEvent};
use crate::mana;
use crate::math::Fixed;
use crate::scheduler::Continuation;
use crate::synergy;
use crate::unit::{Team, UnitId};

/// Result of one damage instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was benched, dead or missing. Nothing changed.
    Ignored,
    /// Damage landed and the target survived.
    Damaged {
        /// Health removed.
        amount: Fixed,
    },
    /// Damage landed and killed the target.
    Killed {
        /// Health removed.
        amount: Fixed,
    },
}

impl DamageOutcome {
    /// Health removed, zero when ignored.
    #[must_use]
    pub fn amount(self) -> Fixed {
        match self {
            Self::Ignored => Fixed::ZERO,
            Self::Damaged { amount } | Self::Killed { amount } => amount,
        }
    }

    /// Whether the target died from this instance.
    #[must_use]
    pub fn is_kill(self) -> bool {
        matches!(self, Self::Killed { .. })
    }
}

/// Fraction of raw damage that gets through `armor`.
#[must_use]
pub fn mitigation_factor(armor: Fixed, armor_factor: Fixed) -> Fixed {
    let factor = Fixed::ONE - armor * armor_factor;
    factor.max(Fixed::ZERO)
}

/// Damage left after armor.
#[must_use]
pub fn mitigate(raw: Fixed, armor: Fixed, armor_factor: Fixed) -> Fixed {
    if raw <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    raw * mitigation_factor(armor, armor_factor)
}

/// Apply `raw` damage from `source` to `target`.
///
/// Benched, dead and missing targets ignore damage. A surviving target gains
/// the damage-taken mana tick; a depleted one goes down the death pathway.
pub fn apply_damage(
    ctx: &mut SimulationContext,
    source: Option<UnitId>,
    target: UnitId,
    raw: Fixed,
) -> DamageOutcome {
    let armor_factor = ctx.config.combat.armor_factor;
    let Some(unit) = ctx.units.get_mut(target) else {
        return DamageOutcome::Ignored;
    };
    if !unit.is_targetable() {
        return DamageOutcome::Ignored;
    }

    let amount = mitigate(raw, unit.stats.total_armor(), armor_factor);
    unit.stats.current_health -= amount;
    let depleted = unit.stats.is_depleted();

    ctx.emit(PresentationEvent::DamageDealt {
        source,
        target,
        amount,
    });
    ctx.emit_health(target);

    if depleted {
        kill(ctx, target, source);
        return DamageOutcome::Killed { amount };
    }

    let mana_per_hit = ctx.config.combat.mana_per_hit;
    mana::gain_mana(ctx, target, mana_per_hit);
    DamageOutcome::Damaged { amount }
}

/// Kill a living target outright, bypassing armor.
pub fn execute(ctx: &mut SimulationContext, target: UnitId, killer: Option<UnitId>) -> bool {
    let Some(unit) = ctx.units.get_mut(target) else {
        return false;
    };
    if !unit.is_targetable() {
        return false;
    }
    let amount = unit.stats.current_health.max(Fixed::ZERO);
    unit.stats.current_health = Fixed::ZERO;
    ctx.emit(PresentationEvent::DamageDealt {
        source: killer,
        target,
        amount,
    });
    ctx.emit_health(target);
    kill(ctx, target, killer)
}

/// Restore health to a living, non-benched unit. Overheal is allowed.
///
/// Returns the amount healed.
pub fn heal(ctx: &mut SimulationContext, target: UnitId, amount: Fixed) -> Fixed {
    let Some(unit) = ctx.units.get_mut(target) else {
        return Fixed::ZERO;
    };
    if !unit.is_targetable() || amount <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    unit.stats.current_health += amount;
    ctx.emit_health(target);
    amount
}

/// Death pathway. Runs at most once per life.
///
/// The `is_alive` check-and-set makes later calls for the same life no-ops;
/// the bus additionally refuses a second event for the same `(unit, life)`.
/// Returns whether this call performed the death.
pub fn kill(ctx: &mut SimulationContext, target: UnitId, killer: Option<UnitId>) -> bool {
    let tick = ctx.tick;
    let round_active = ctx.round_active;
    let Some(unit) = ctx.units.get_mut(target) else {
        return false;
    };
    if !unit.is_alive {
        return false;
    }

    unit.is_alive = false;
    unit.stats.current_health = Fixed::ZERO;
    unit.can_move = false;
    unit.can_attack = false;
    unit.is_casting = false;
    unit.target = None;

    let event = DeathEvent {
        unit: target,
        life: unit.life,
        tick,
        team: unit.team,
        max_health: unit.stats.max_health(),
        killer,
    };
    let soft_death = round_active && unit.team == Team::Player && !unit.is_summon();
    let has_traits = !unit.traits.is_empty();

    // Pending casts and leaps die with the unit.
    ctx.scheduler.cancel_owner(target);

    let hold = ctx.config.combat.death_hold_ticks;
    if soft_death {
        ctx.schedule(target, hold, Continuation::HideFallen);
    } else {
        ctx.schedule(target, hold, Continuation::Despawn);
    }
    if has_traits {
        ctx.mark_traits_dirty();
    }

    let Some(subscribers) = ctx.bus.publish(event.clone()) else {
        return false;
    };
    debug!(
        "Unit {} died (life {}, tick {}, killer {:?})",
        target, event.life, tick, killer
    );
    ctx.emit(PresentationEvent::Death {
        unit: target,
        life: event.life,
    });
    ctx.deaths.push(event.clone());

    for subscription in subscribers {
        match subscription.reaction {
            DeathReaction::SoulHarvest => {
                abilities::soul_binder::harvest_soul(ctx, subscription.owner, &event);
            }
            DeathReaction::DeathShare => {
                synergy::share_death(ctx, subscription.owner, &event);
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SimulationConfig, UnitTemplate};
    use crate::math::ratio;
    use crate::unit::{Unit, UnitState};

    fn context_with_target(armor: u32) -> (SimulationContext, UnitId) {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        let mut unit = Unit::from_template(
            0,
            &UnitTemplate::new("dummy", 100, 10).with_armor(armor),
            Team::Enemy,
        );
        unit.state = UnitState::Combat;
        let id = ctx.insert_unit(unit);
        (ctx, id)
    }

    #[test]
    fn test_mitigation_formula() {
        let factor = ratio(1, 200);
        assert_eq!(mitigation_factor(Fixed::ZERO, factor), Fixed::ONE);
        // 100 armor halves damage.
        let halved = mitigate(Fixed::from_num(40), Fixed::from_num(100), factor);
        assert!((halved - Fixed::from_num(20)).abs() < ratio(1, 10_000));
    }

    #[test]
    fn test_high_armor_never_heals() {
        let factor = ratio(1, 200);
        assert_eq!(mitigation_factor(Fixed::from_num(300), factor), Fixed::ZERO);

        let (mut ctx, id) = context_with_target(300);
        let outcome = apply_damage(&mut ctx, None, id, Fixed::from_num(50));
        assert_eq!(outcome, DamageOutcome::Damaged { amount: Fixed::ZERO });
        assert_eq!(ctx.unit(id).unwrap().stats.current_health, Fixed::from_num(100));
    }

    #[test]
    fn test_benched_target_ignores_damage() {
        let (mut ctx, id) = context_with_target(0);
        ctx.unit_mut(id).unwrap().state = UnitState::Bench;
        assert_eq!(
            apply_damage(&mut ctx, None, id, Fixed::from_num(50)),
            DamageOutcome::Ignored
        );
        assert_eq!(ctx.unit(id).unwrap().stats.current_health, Fixed::from_num(100));
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_lethal_damage_kills_once() {
        let (mut ctx, id) = context_with_target(0);
        let outcome = apply_damage(&mut ctx, Some(9), id, Fixed::from_num(150));
        assert!(outcome.is_kill());

        let unit = ctx.unit(id).unwrap();
        assert!(!unit.is_alive);
        assert_eq!(unit.stats.current_health, Fixed::ZERO);
        assert!(!unit.is_targetable());

        // Further damage and kills are no-ops.
        assert_eq!(
            apply_damage(&mut ctx, None, id, Fixed::from_num(10)),
            DamageOutcome::Ignored
        );
        assert!(!kill(&mut ctx, id, None));
        assert_eq!(ctx.bus.deaths_of(id), 1);
        assert_eq!(ctx.deaths.len(), 1);
        assert_eq!(ctx.deaths[0].killer, Some(9));
    }

    #[test]
    fn test_enemy_death_schedules_despawn() {
        let (mut ctx, id) = context_with_target(0);
        ctx.round_active = true;
        kill(&mut ctx, id, None);
        assert!(ctx
            .scheduler
            .has_pending(id, |a| *a == Continuation::Despawn));
    }

    #[test]
    fn test_heal_allows_overheal() {
        let (mut ctx, id) = context_with_target(0);
        assert_eq!(heal(&mut ctx, id, Fixed::from_num(30)), Fixed::from_num(30));
        assert_eq!(ctx.unit(id).unwrap().stats.current_health, Fixed::from_num(130));
    }

    #[test]
    fn test_execute_bypasses_armor() {
        let (mut ctx, id) = context_with_target(250);
        assert!(execute(&mut ctx, id, Some(4)));
        assert!(!ctx.unit(id).unwrap().is_alive);
        assert!(!execute(&mut ctx, id, Some(4)));
    }
}
