//! Needle volley: one needle at each of the nearest enemies.
//!
//! Every cast that throws permanently adds a needle, up to the cap. The
//! bonus survives round end.

use crate::context::SimulationContext;
use crate::damage;
use crate::math::Fixed;
use crate::targeting;
use crate::unit::UnitId;

use super::{per_star, AbilityState, CastPlan};

/// Needles the next cast throws.
#[must_use]
pub fn needle_count(ctx: &SimulationContext, caster: UnitId) -> u32 {
    let tuning = &ctx.config.abilities.needle_volley;
    let bonus = match ctx.unit(caster).and_then(|u| u.ability.as_ref()).map(|a| &a.state) {
        Some(AbilityState::NeedleVolley { bonus_needles, .. }) => *bonus_needles,
        _ => 0,
    };
    (tuning.base_needles + bonus).min(tuning.max_needles)
}

pub(crate) fn cast(ctx: &mut SimulationContext, caster: UnitId, star: u8) -> CastPlan {
    let tuning = ctx.config.abilities.needle_volley.clone();
    let Some((origin, enemy_team)) = ctx.unit(caster).map(|u| (u.position, u.team.opponent()))
    else {
        return CastPlan::Finished;
    };
    let count = needle_count(ctx, caster);
    let targets = targeting::nearest(ctx, enemy_team, origin, count as usize);
    if targets.is_empty() {
        return CastPlan::Finished;
    }

    let damage = Fixed::from_num(per_star(&tuning.needle_damage, star));
    for &target in &targets {
        damage::apply_damage(ctx, Some(caster), target, damage);
    }

    if let Some(AbilityState::NeedleVolley {
        bonus_needles,
        thrown,
    }) = ctx
        .unit_mut(caster)
        .and_then(|u| u.ability.as_mut())
        .map(|a| &mut a.state)
    {
        *thrown += targets.len() as u64;
        if tuning.base_needles + *bonus_needles < tuning.max_needles {
            *bonus_needles += 1;
        }
    }
    CastPlan::Finished
}
