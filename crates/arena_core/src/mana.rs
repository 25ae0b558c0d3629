//! Mana gate: mana accrual and the cast trigger.

use tracing::trace;

use crate::abilities;
use crate::context::SimulationContext;
use crate::unit::UnitId;

/// Result of a mana gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManaOutcome {
    /// The unit cannot gather mana right now.
    Ignored,
    /// Mana rose but stayed below the threshold.
    Gained,
    /// The threshold was reached: mana reset to zero and a cast fired.
    Cast,
}

/// Add `amount` mana to a unit, casting at the threshold.
///
/// Units without a mana pool, and units that are benched, dead or already
/// casting, gather nothing. On reaching `max_mana` the pool resets to zero
/// before the ability runs, so a gain during the cast cannot trigger a second
/// cast.
pub fn gain_mana(ctx: &mut SimulationContext, id: UnitId, amount: u32) -> ManaOutcome {
    let Some(unit) = ctx.units.get_mut(id) else {
        return ManaOutcome::Ignored;
    };
    if amount == 0
        || unit.stats.max_mana == 0
        || !unit.is_targetable()
        || unit.is_casting
    {
        return ManaOutcome::Ignored;
    }

    unit.stats.current_mana = unit.stats.current_mana.saturating_add(amount);
    if unit.stats.current_mana < unit.stats.max_mana {
        ctx.emit_mana(id);
        return ManaOutcome::Gained;
    }

    unit.stats.current_mana = 0;
    trace!("Unit {} reached full mana", id);
    ctx.emit_mana(id);
    abilities::cast(ctx, id);
    ManaOutcome::Cast
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abilities::AbilityKind;
    use crate::data::{SimulationConfig, UnitTemplate};
    use crate::unit::{Team, Unit, UnitState};

    fn caster(max_mana: u32) -> (SimulationContext, UnitId) {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        let template = UnitTemplate::new("sage", 100, 10).with_ability(AbilityKind::Fortify, max_mana);
        let mut unit = Unit::from_template(0, &template, Team::Player);
        unit.state = UnitState::Combat;
        let id = ctx.insert_unit(unit);
        (ctx, id)
    }

    #[test]
    fn test_mana_accumulates_until_threshold() {
        let (mut ctx, id) = caster(30);
        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Gained);
        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Gained);
        assert_eq!(ctx.unit(id).unwrap().stats.current_mana, 20);

        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Cast);
        let unit = ctx.unit(id).unwrap();
        assert_eq!(unit.stats.current_mana, 0);
        assert!(unit.is_casting);
    }

    #[test]
    fn test_no_gain_while_casting() {
        let (mut ctx, id) = caster(10);
        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Cast);
        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Ignored);
        assert_eq!(ctx.unit(id).unwrap().stats.current_mana, 0);
    }

    #[test]
    fn test_benched_and_manaless_units_ignore_mana() {
        let (mut ctx, id) = caster(50);
        ctx.unit_mut(id).unwrap().state = UnitState::Bench;
        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Ignored);

        let (mut ctx, id) = caster(0);
        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Ignored);
        assert_eq!(ctx.unit(id).unwrap().stats.current_mana, 0);
    }

    #[test]
    fn test_overshoot_still_casts_once() {
        let (mut ctx, id) = caster(25);
        gain_mana(&mut ctx, id, 20);
        assert_eq!(gain_mana(&mut ctx, id, 10), ManaOutcome::Cast);
        assert_eq!(ctx.unit(id).unwrap().stats.current_mana, 0);
    }
}
