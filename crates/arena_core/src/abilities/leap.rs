//! Leap: fly to the densest enemy cluster, then slam on landing.
//!
//! The landing is a scheduled continuation. Death, benching and a forced
//! round end all cancel it through the owner's continuations.

use crate::context::SimulationContext;
use crate::damage;
use crate::math::{Fixed, Vec2Fixed};
use crate::scheduler::Continuation;
use crate::targeting;
use crate::unit::UnitId;

use super::{finish_cast, per_star, AbilityState, CastPlan};

pub(crate) fn cast(ctx: &mut SimulationContext, caster: UnitId, star: u8) -> CastPlan {
    let tuning = ctx.config.abilities.leap.clone();
    let spacing = ctx.config.combat.unit_radius * Fixed::from_num(2);
    let Some((origin, enemy_team)) = ctx.unit(caster).map(|u| (u.position, u.team.opponent()))
    else {
        return CastPlan::Finished;
    };
    let Some(cluster) = targeting::densest_cluster(ctx, enemy_team, tuning.slam_radius) else {
        return CastPlan::Finished;
    };

    // Land just short of the cluster center, on the caster's side.
    let approach = (cluster - origin).normalize();
    let destination = cluster - approach.scale(spacing);

    if let Some(AbilityState::Leap { airborne }) = ctx
        .unit_mut(caster)
        .and_then(|u| u.ability.as_mut())
        .map(|a| &mut a.state)
    {
        *airborne = true;
    }
    let damage = Fixed::from_num(per_star(&tuning.slam_damage, star));
    ctx.schedule(
        caster,
        tuning.leap_ticks,
        Continuation::LeapLand {
            destination,
            damage,
        },
    );
    CastPlan::Continues
}

pub(crate) fn land(ctx: &mut SimulationContext, caster: UnitId, destination: Vec2Fixed, damage: Fixed) {
    let radius = ctx.config.abilities.leap.slam_radius;
    let Some(enemy_team) = ctx.unit_mut(caster).map(|u| {
        u.position = destination;
        u.team.opponent()
    }) else {
        return;
    };
    for victim in targeting::within_radius(ctx, enemy_team, destination, radius) {
        damage::apply_damage(ctx, Some(caster), victim, damage);
    }
    finish_cast(ctx, caster);
}
