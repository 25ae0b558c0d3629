//! Twin shot: two hits on the healthiest enemy, then an area blast.
//!
//! Each hit is a separate resolution point one interval apart, so the
//! healthiest enemy is picked again for the second hit. The blast lands on
//! the densest enemy cluster and ends the cast.

use crate::context::SimulationContext;
use crate::damage;
use crate::math::Fixed;
use crate::scheduler::Continuation;
use crate::targeting;
use crate::unit::UnitId;

use super::{finish_cast, per_star, CastPlan};

pub(crate) fn cast(ctx: &mut SimulationContext, caster: UnitId, star: u8) -> CastPlan {
    let tuning = ctx.config.abilities.twin_shot.clone();
    let damage = Fixed::from_num(per_star(&tuning.hit_damage, star));
    if !shoot_healthiest(ctx, caster, damage) {
        return CastPlan::Finished;
    }
    ctx.schedule(
        caster,
        tuning.hit_interval_ticks,
        Continuation::TwinShotHit { damage },
    );
    CastPlan::Continues
}

pub(crate) fn second_hit(ctx: &mut SimulationContext, caster: UnitId, star: u8, damage: Fixed) {
    let tuning = ctx.config.abilities.twin_shot.clone();
    shoot_healthiest(ctx, caster, damage);
    let blast = Fixed::from_num(per_star(&tuning.blast_damage, star));
    ctx.schedule(
        caster,
        tuning.hit_interval_ticks,
        Continuation::AreaBlast { damage: blast },
    );
}

pub(crate) fn blast(ctx: &mut SimulationContext, caster: UnitId, damage: Fixed) {
    let radius = ctx.config.abilities.twin_shot.blast_radius;
    if let Some(enemy_team) = ctx.unit(caster).map(|u| u.team.opponent()) {
        if let Some(center) = targeting::densest_cluster(ctx, enemy_team, radius) {
            for victim in targeting::within_radius(ctx, enemy_team, center, radius) {
                damage::apply_damage(ctx, Some(caster), victim, damage);
            }
        }
    }
    finish_cast(ctx, caster);
}

fn shoot_healthiest(ctx: &mut SimulationContext, caster: UnitId, damage: Fixed) -> bool {
    let Some(enemy_team) = ctx.unit(caster).map(|u| u.team.opponent()) else {
        return false;
    };
    let Some(target) = targeting::highest_health(ctx, enemy_team) else {
        return false;
    };
    damage::apply_damage(ctx, Some(caster), target, damage);
    true
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, spawn};
    use super::super::{cast as cast_ability, resume, AbilityKind};
    use super::*;
    use crate::unit::Team;

    fn run_until(ctx: &mut SimulationContext, tick: u64) {
        for now in 0..=tick {
            ctx.tick = now;
            for entry in ctx.scheduler.pop_due(now) {
                resume(ctx, &entry);
            }
        }
    }

    #[test]
    fn test_two_hits_then_blast() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "gunner", 100, Some(AbilityKind::TwinShot), (0, 0));
        let big = spawn(&mut ctx, Team::Enemy, "big", 1000, None, (5, 5));
        let small = spawn(&mut ctx, Team::Enemy, "small", 300, None, (5, 6));

        assert!(cast_ability(&mut ctx, caster));
        // First hit: 50 on the healthiest.
        assert_eq!(ctx.unit(big).unwrap().stats.current_health, Fixed::from_num(950));
        assert!(ctx.unit(caster).unwrap().is_casting);

        let interval = u64::from(ctx.config.abilities.twin_shot.hit_interval_ticks);
        run_until(&mut ctx, interval);
        assert_eq!(ctx.unit(big).unwrap().stats.current_health, Fixed::from_num(900));
        assert_eq!(ctx.unit(small).unwrap().stats.current_health, Fixed::from_num(300));

        run_until(&mut ctx, interval * 2);
        // Blast of 60 hits both clustered enemies and ends the cast.
        assert_eq!(ctx.unit(big).unwrap().stats.current_health, Fixed::from_num(840));
        assert_eq!(ctx.unit(small).unwrap().stats.current_health, Fixed::from_num(240));
        assert!(!ctx.unit(caster).unwrap().is_casting);
    }

    #[test]
    fn test_no_enemies_finishes_immediately() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "gunner", 100, Some(AbilityKind::TwinShot), (0, 0));
        assert!(cast_ability(&mut ctx, caster));
        assert!(ctx
            .scheduler
            .has_pending(caster, |a| *a == Continuation::FinishCast));
    }

    #[test]
    fn test_caster_death_cancels_sequence() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "gunner", 100, Some(AbilityKind::TwinShot), (0, 0));
        let big = spawn(&mut ctx, Team::Enemy, "big", 1000, None, (5, 5));
        cast_ability(&mut ctx, caster);

        damage::kill(&mut ctx, caster, None);
        run_until(&mut ctx, 20);
        assert_eq!(ctx.unit(big).unwrap().stats.current_health, Fixed::from_num(950));
    }
}
