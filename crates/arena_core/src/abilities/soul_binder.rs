//! Soul binder: a companion summon that grows with harvested souls.
//!
//! The caster subscribes to the death bus when registered and harvests a soul
//! from every other unit's death, whether or not it is fighting. Every
//! `souls_per_stack` souls the living companion permanently gains
//! `stack_bonus_pct` of its base health and attack, and companions summoned
//! later start with all stacks earned so far.

use tracing::debug;

use crate::context::SimulationContext;
use crate::data::UnitTemplate;
use crate::events::{DeathEvent, DeathReaction, PresentationEvent};
use crate::math::{pct_of, Fixed, Vec2Fixed};
use crate::unit::{Unit, UnitId, UnitState};

use super::{per_star, AbilityState, CastPlan};

/// Register the caster's soul harvest subscription.
pub(crate) fn subscribe(ctx: &mut SimulationContext, caster: UnitId) {
    let already = ctx
        .unit(caster)
        .and_then(|u| u.ability.as_ref())
        .is_some_and(|a| matches!(a.state, AbilityState::SoulBinder { subscription: Some(_), .. }));
    if already {
        return;
    }
    let handle = ctx.bus.subscribe(caster, DeathReaction::SoulHarvest);
    if let Some(AbilityState::SoulBinder { subscription, .. }) = ctx
        .unit_mut(caster)
        .and_then(|u| u.ability.as_mut())
        .map(|a| &mut a.state)
    {
        *subscription = Some(handle);
    }
}

fn companion_of(ctx: &SimulationContext, caster: UnitId) -> (u32, Option<UnitId>) {
    match ctx
        .unit(caster)
        .and_then(|u| u.ability.as_ref())
        .map(|a| &a.state)
    {
        Some(AbilityState::SoulBinder {
            souls, companion, ..
        }) => (*souls, *companion),
        _ => (0, None),
    }
}

pub(crate) fn cast(ctx: &mut SimulationContext, caster: UnitId, star: u8) -> CastPlan {
    let (souls, companion) = companion_of(ctx, caster);

    if let Some(existing) = companion.filter(|&c| ctx.unit(c).is_some_and(Unit::is_targetable)) {
        // Recast with a living companion refills it instead of summoning again.
        if let Some(unit) = ctx.unit_mut(existing) {
            unit.stats.refill_health();
        }
        ctx.emit_health(existing);
        return CastPlan::Finished;
    }

    let tuning = ctx.config.abilities.soul_binder.clone();
    let spacing = ctx.config.combat.unit_radius * Fixed::from_num(2);
    let round_active = ctx.round_active;
    let Some(owner) = ctx.unit(caster) else {
        return CastPlan::Finished;
    };

    let share = per_star(&tuning.companion_stat_pct, star);
    let stacks = souls / tuning.souls_per_stack.max(1);
    let growth_pct = 100 + stacks * tuning.stack_bonus_pct;
    let health = pct_of(pct_of(owner.stats.max_health(), share), growth_pct);
    let attack = pct_of(pct_of(owner.stats.attack_damage, share), growth_pct);

    let template = UnitTemplate::new(
        format!("{} companion", owner.name),
        health.to_num::<u32>().max(1),
        attack.to_num::<u32>(),
    )
    .with_attack_speed(owner.stats.attack_speed)
    .with_range(owner.stats.attack_range)
    .with_move_speed(owner.stats.move_speed);

    let mut summon = Unit::from_template(0, &template, owner.team);
    summon.summoner = Some(caster);
    summon.star = owner.star;
    summon.position = owner.position + Vec2Fixed::new(spacing, Fixed::ZERO);
    summon.state = if round_active {
        UnitState::Combat
    } else {
        UnitState::BoardIdle
    };
    summon.can_move = true;
    summon.can_attack = true;

    let id = ctx.insert_unit(summon);
    if let Some(AbilityState::SoulBinder { companion, .. }) = ctx
        .unit_mut(caster)
        .and_then(|u| u.ability.as_mut())
        .map(|a| &mut a.state)
    {
        *companion = Some(id);
    }
    debug!("Unit {} summoned companion {} with {} stacks", caster, id, stacks);
    ctx.emit(PresentationEvent::Spawned {
        unit: id,
        summoner: Some(caster),
    });
    CastPlan::Finished
}

/// Death bus reaction: harvest a soul from any other unit's death.
pub(crate) fn harvest_soul(ctx: &mut SimulationContext, caster: UnitId, event: &DeathEvent) {
    if event.unit == caster {
        return;
    }
    let tuning = ctx.config.abilities.soul_binder.clone();
    let Some(AbilityState::SoulBinder {
        souls, companion, ..
    }) = ctx
        .unit_mut(caster)
        .and_then(|u| u.ability.as_mut())
        .map(|a| &mut a.state)
    else {
        return;
    };
    *souls += 1;
    let stack_reached = *souls % tuning.souls_per_stack.max(1) == 0;
    let companion = *companion;

    if !stack_reached {
        return;
    }
    let Some(companion) = companion else {
        return;
    };
    let Some(unit) = ctx.unit_mut(companion) else {
        return;
    };
    if !unit.is_targetable() {
        return;
    }
    let health = pct_of(unit.stats.base_max_health, tuning.stack_bonus_pct);
    let attack = pct_of(unit.stats.attack_damage, tuning.stack_bonus_pct);
    unit.stats.permanent_bonus_health += health;
    unit.stats.current_health += health;
    unit.stats.attack_damage += attack;
    ctx.emit_health(companion);
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{context, spawn};
    use super::super::{cast as cast_ability, AbilityKind};
    use super::*;
    use crate::damage;
    use crate::unit::Team;

    fn souls(ctx: &SimulationContext, caster: UnitId) -> u32 {
        companion_of(ctx, caster).0
    }

    #[test]
    fn test_summons_companion_with_stat_share() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "binder", 200, Some(AbilityKind::SoulBinder), (0, 0));

        assert!(cast_ability(&mut ctx, caster));
        let (_, companion) = companion_of(&ctx, caster);
        let companion = ctx.unit(companion.unwrap()).unwrap();

        // 40% at one star.
        assert_eq!(companion.stats.max_health(), Fixed::from_num(80));
        assert_eq!(companion.stats.attack_damage, Fixed::from_num(4));
        assert_eq!(companion.summoner, Some(caster));
        assert_eq!(companion.team, Team::Player);
        assert!(companion.in_combat());
        assert!(ctx.rosters.ids(Team::Player).contains(&companion.id));
    }

    #[test]
    fn test_souls_from_any_death_grow_companion() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "binder", 200, Some(AbilityKind::SoulBinder), (0, 0));
        cast_ability(&mut ctx, caster);
        let companion = companion_of(&ctx, caster).1.unwrap();
        let before = ctx.unit(companion).unwrap().stats.max_health();

        for i in 0..3 {
            let victim = spawn(&mut ctx, Team::Enemy, "fodder", 10, None, (5, i));
            damage::kill(&mut ctx, victim, None);
        }

        assert_eq!(souls(&ctx, caster), 3);
        let after = ctx.unit(companion).unwrap().stats.max_health();
        // One stack: +2% of base.
        assert_eq!(after - before, pct_of(Fixed::from_num(80), 2));
    }

    #[test]
    fn test_own_death_is_not_a_soul() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "binder", 200, Some(AbilityKind::SoulBinder), (0, 0));
        damage::kill(&mut ctx, caster, None);
        assert_eq!(souls(&ctx, caster), 0);
    }

    #[test]
    fn test_recast_refills_living_companion() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "binder", 200, Some(AbilityKind::SoulBinder), (0, 0));
        cast_ability(&mut ctx, caster);
        let companion = companion_of(&ctx, caster).1.unwrap();
        ctx.unit_mut(companion).unwrap().stats.current_health = Fixed::from_num(5);
        ctx.unit_mut(caster).unwrap().is_casting = false;

        cast_ability(&mut ctx, caster);
        assert_eq!(ctx.rosters.ids(Team::Player).len(), 2);
        assert_eq!(
            ctx.unit(companion).unwrap().stats.current_health,
            Fixed::from_num(80)
        );
    }
}
