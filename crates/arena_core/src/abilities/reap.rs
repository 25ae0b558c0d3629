//! Reap: a strike that executes targets left below a health threshold.

use crate::context::SimulationContext;
use crate::damage::{self, DamageOutcome};
use crate::math::{percent, Fixed};
use crate::targeting;
use crate::unit::UnitId;

use super::{per_star, AbilityState, CastPlan};

pub(crate) fn cast(
    ctx: &mut SimulationContext,
    caster: UnitId,
    star: u8,
    target: Option<UnitId>,
) -> CastPlan {
    let tuning = ctx.config.abilities.reap.clone();
    let Some(team) = ctx.unit(caster).map(|u| u.team) else {
        return CastPlan::Finished;
    };
    let Some(target) = target.filter(|&t| targeting::is_valid_target(ctx, team, t)) else {
        return CastPlan::Finished;
    };

    let strike = Fixed::from_num(per_star(&tuning.strike_damage, star));
    if let DamageOutcome::Damaged { .. } = damage::apply_damage(ctx, Some(caster), target, strike) {
        let threshold = percent(per_star(&tuning.execute_threshold_pct, star));
        let below = ctx
            .unit(target)
            .is_some_and(|t| t.is_targetable() && t.stats.health_fraction() < threshold);
        if below && damage::execute(ctx, target, Some(caster)) {
            if let Some(AbilityState::Reap { executions }) = ctx
                .unit_mut(caster)
                .and_then(|u| u.ability.as_mut())
                .map(|a| &mut a.state)
            {
                *executions += 1;
            }
        }
    }
    CastPlan::Finished
}
