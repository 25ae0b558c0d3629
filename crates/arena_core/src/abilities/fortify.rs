//! Fortify: permanent max health gain, then a strike scaled by max health.

use crate::context::SimulationContext;
use crate::damage;
use crate::math::{pct_of, Fixed};
use crate::targeting;
use crate::unit::UnitId;

use super::{per_star, AbilityState, CastPlan};

pub(crate) fn cast(
    ctx: &mut SimulationContext,
    caster: UnitId,
    star: u8,
    target: Option<UnitId>,
) -> CastPlan {
    let tuning = ctx.config.abilities.fortify.clone();
    let Some(unit) = ctx.unit_mut(caster) else {
        return CastPlan::Finished;
    };

    let gain = pct_of(unit.stats.max_health(), per_star(&tuning.health_gain_pct, star)).round();
    unit.stats.permanent_bonus_health += gain;
    unit.stats.current_health += gain;
    if let Some(AbilityState::Fortify { gained }) = unit.ability.as_mut().map(|a| &mut a.state) {
        *gained = gained.saturating_add(gain.to_num::<u32>());
    }
    let team = unit.team;
    let strike = pct_of(unit.stats.max_health(), tuning.strike_health_pct)
        + Fixed::from_num(per_star(&tuning.strike_flat, star));
    ctx.emit_health(caster);

    if let Some(target) = target.filter(|&t| targeting::is_valid_target(ctx, team, t)) {
        damage::apply_damage(ctx, Some(caster), target, strike);
    }
    CastPlan::Finished
}
