//! Alternating passive: every second auto-attack becomes a cone or a heal.

use crate::context::SimulationContext;
use crate::damage;
use crate::math::Fixed;
use crate::targeting;
use crate::unit::UnitId;

use super::{per_star, AbilityState, SecondaryEffect};

/// Count an auto-attack and fire the secondary effect on every second one.
///
/// Returns `true` when the secondary replaced the default attack.
pub(crate) fn on_attack(ctx: &mut SimulationContext, attacker: UnitId, target: UnitId) -> bool {
    let Some(unit) = ctx.unit_mut(attacker) else {
        return false;
    };
    let star = unit.star;
    let origin = unit.position;
    let enemy_team = unit.team.opponent();
    let Some(AbilityState::AlternatingStrike { attacks, next }) =
        unit.ability.as_mut().map(|a| &mut a.state)
    else {
        return false;
    };

    *attacks += 1;
    if *attacks % 2 == 1 {
        return false;
    }
    let effect = *next;
    *next = effect.toggled();

    let Some(target_position) = ctx.unit(target).map(|t| t.position) else {
        return false;
    };
    let tuning = ctx.config.abilities.alternating_strike.clone();

    match effect {
        SecondaryEffect::Cone => {
            let amount = Fixed::from_num(per_star(&tuning.cone_damage, star));
            let victims = targeting::within_cone(
                ctx,
                enemy_team,
                origin,
                target_position - origin,
                tuning.cone_range,
                tuning.cone_min_alignment_pct,
            );
            for victim in victims {
                damage::apply_damage(ctx, Some(attacker), victim, amount);
            }
        }
        SecondaryEffect::Heal => {
            let amount = Fixed::from_num(per_star(&tuning.heal, star));
            damage::heal(ctx, attacker, amount);
        }
    }
    true
}
