//! Ability registry.
//!
//! Each unit owns at most one ability, held as an [`AbilityInstance`]: the
//! variant's kind plus its mutable state. Casting goes through [`cast`],
//! which snapshots the target, marks the caster as casting and dispatches to
//! the variant. Variants that finish in one step let the registry schedule
//! the end of the cast; multi-step variants schedule their own continuations
//! and end the cast from the last one.
//!
//! Every variant clamps its star-indexed tables, does nothing without a valid
//! target and never acts on benched or dead units.

pub mod alternating_strike;
pub mod fortify;
pub mod leap;
pub mod needle_volley;
pub mod reap;
pub mod soul_binder;
pub mod twin_shot;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::context::SimulationContext;
use crate::events::{PresentationEvent, SubscriptionId};
use crate::scheduler::{Continuation, Scheduled};
use crate::targeting;
use crate::unit::{Unit, UnitId};

/// Ability variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    /// Every other auto-attack alternates between a cone and a self-heal.
    AlternatingStrike,
    /// Two hits on the healthiest enemy, then an area blast.
    TwinShot,
    /// Permanent max health gain, then a strike scaled by max health.
    Fortify,
    /// Summons a companion that grows with harvested souls.
    SoulBinder,
    /// Needles at the nearest enemies; each cast adds a needle.
    NeedleVolley,
    /// Strike that executes targets left below a threshold.
    Reap,
    /// Leap to the densest enemy cluster and slam.
    Leap,
}

impl AbilityKind {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AlternatingStrike => "Alternating Strike",
            Self::TwinShot => "Twin Shot",
            Self::Fortify => "Fortify",
            Self::SoulBinder => "Soul Binder",
            Self::NeedleVolley => "Needle Volley",
            Self::Reap => "Reap",
            Self::Leap => "Leap",
        }
    }

    /// One-line description.
    #[must_use]
    pub const fn summary(self) -> &'static str {
        match self {
            Self::AlternatingStrike => {
                "Every other attack either cleaves a cone of enemies or heals this unit."
            }
            Self::TwinShot => {
                "Shoots the healthiest enemy twice, then blasts the densest enemy cluster."
            }
            Self::Fortify => "Permanently gains max health, then strikes for a share of it.",
            Self::SoulBinder => {
                "Summons a companion that grows stronger as souls are harvested from deaths."
            }
            Self::NeedleVolley => {
                "Throws needles at the nearest enemies. Each cast adds a needle for good."
            }
            Self::Reap => "Strikes the target and executes it if left below a health threshold.",
            Self::Leap => "Leaps onto the densest enemy cluster and slams the area.",
        }
    }

    /// Passive abilities trigger from attacks and never cast from mana.
    #[must_use]
    pub const fn is_passive(self) -> bool {
        matches!(self, Self::AlternatingStrike)
    }
}

/// Secondary effect of the alternating passive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecondaryEffect {
    /// Cone of area damage.
    Cone,
    /// Self-heal.
    Heal,
}

impl SecondaryEffect {
    /// The other effect.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Cone => Self::Heal,
            Self::Heal => Self::Cone,
        }
    }
}

/// Per-variant mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbilityState {
    /// Alternating passive.
    AlternatingStrike {
        /// Auto-attacks made this round.
        attacks: u32,
        /// Effect of the next secondary trigger.
        next: SecondaryEffect,
    },
    /// Twin shot keeps no state between casts.
    TwinShot,
    /// Fortify.
    Fortify {
        /// Total max health gained from casts.
        gained: u32,
    },
    /// Soul binder.
    SoulBinder {
        /// Souls harvested. Persists across rounds.
        souls: u32,
        /// Current companion, if summoned this round.
        companion: Option<UnitId>,
        /// Death bus subscription.
        subscription: Option<SubscriptionId>,
    },
    /// Needle volley.
    NeedleVolley {
        /// Needles added by casts. Persists across rounds.
        bonus_needles: u32,
        /// Needles thrown in total.
        thrown: u64,
    },
    /// Reap.
    Reap {
        /// Targets executed in total.
        executions: u32,
    },
    /// Leap.
    Leap {
        /// Mid-flight.
        airborne: bool,
    },
}

/// A unit's ability: kind, state and cast snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityInstance {
    /// Variant.
    pub kind: AbilityKind,
    /// Variant state.
    pub state: AbilityState,
    /// Target captured when the current cast began.
    pub cast_target: Option<UnitId>,
    /// Number of casts.
    pub casts: u32,
}

impl AbilityInstance {
    /// Fresh state for `kind`.
    #[must_use]
    pub fn new(kind: AbilityKind) -> Self {
        let state = match kind {
            AbilityKind::AlternatingStrike => AbilityState::AlternatingStrike {
                attacks: 0,
                next: SecondaryEffect::Cone,
            },
            AbilityKind::TwinShot => AbilityState::TwinShot,
            AbilityKind::Fortify => AbilityState::Fortify { gained: 0 },
            AbilityKind::SoulBinder => AbilityState::SoulBinder {
                souls: 0,
                companion: None,
                subscription: None,
            },
            AbilityKind::NeedleVolley => AbilityState::NeedleVolley {
                bonus_needles: 0,
                thrown: 0,
            },
            AbilityKind::Reap => AbilityState::Reap { executions: 0 },
            AbilityKind::Leap => AbilityState::Leap { airborne: false },
        };
        Self {
            kind,
            state,
            cast_target: None,
            casts: 0,
        }
    }

    /// Clear round-only state. Permanent upgrades are kept.
    pub fn on_round_end(&mut self) {
        self.cast_target = None;
        match &mut self.state {
            AbilityState::AlternatingStrike { attacks, next } => {
                *attacks = 0;
                *next = SecondaryEffect::Cone;
            }
            AbilityState::SoulBinder { companion, .. } => *companion = None,
            AbilityState::Leap { airborne } => *airborne = false,
            AbilityState::TwinShot
            | AbilityState::Fortify { .. }
            | AbilityState::NeedleVolley { .. }
            | AbilityState::Reap { .. } => {}
        }
    }
}

/// Name and summary of a unit's ability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbilityDescription {
    /// Display name.
    pub name: String,
    /// One-line description.
    pub summary: String,
}

impl Default for AbilityDescription {
    fn default() -> Self {
        Self {
            name: "No ability".to_string(),
            summary: "This unit only uses basic attacks.".to_string(),
        }
    }
}

/// Describe a unit's ability. Units without one get the default description.
#[must_use]
pub fn describe_ability(unit: &Unit) -> AbilityDescription {
    unit.ability
        .as_ref()
        .map_or_else(AbilityDescription::default, |ability| AbilityDescription {
            name: ability.kind.name().to_string(),
            summary: ability.kind.summary().to_string(),
        })
}

/// Look up a star-indexed value, clamping to the table bounds.
#[must_use]
pub fn per_star(table: &[u32], star: u8) -> u32 {
    if table.is_empty() {
        return 0;
    }
    let index = usize::from(star.saturating_sub(1)).min(table.len() - 1);
    table[index]
}

/// How a variant's cast continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CastPlan {
    /// Done; the registry schedules the end of the cast.
    Finished,
    /// The variant scheduled its own continuation, which ends the cast.
    Continues,
}

/// Wire up anything an ability needs once its unit exists.
pub(crate) fn on_registered(ctx: &mut SimulationContext, id: UnitId) {
    let kind = ctx
        .unit(id)
        .and_then(|u| u.ability.as_ref())
        .map(|a| a.kind);
    if kind == Some(AbilityKind::SoulBinder) {
        soul_binder::subscribe(ctx, id);
    }
}

/// Cast the unit's ability. Returns whether a cast began.
pub fn cast(ctx: &mut SimulationContext, caster: UnitId) -> bool {
    let Some(unit) = ctx.unit(caster) else {
        return false;
    };
    if !unit.is_targetable() || unit.is_casting {
        return false;
    }
    let Some(kind) = unit.ability.as_ref().map(|a| a.kind) else {
        return false;
    };
    if kind.is_passive() {
        return false;
    }
    let team = unit.team;
    let star = unit.star;
    let current = unit.target;

    let target = current
        .filter(|&t| targeting::is_valid_target(ctx, team, t))
        .or_else(|| targeting::find_target(ctx, caster));

    if let Some(unit) = ctx.unit_mut(caster) {
        unit.is_casting = true;
        if let Some(ability) = unit.ability.as_mut() {
            ability.cast_target = target;
            ability.casts += 1;
        }
    }
    debug!("Unit {} casts {} at {:?}", caster, kind.name(), target);
    ctx.emit(PresentationEvent::AbilityCast {
        unit: caster,
        ability: kind.name().to_string(),
        target,
    });

    let plan = match kind {
        AbilityKind::AlternatingStrike => CastPlan::Finished,
        AbilityKind::TwinShot => twin_shot::cast(ctx, caster, star),
        AbilityKind::Fortify => fortify::cast(ctx, caster, star, target),
        AbilityKind::SoulBinder => soul_binder::cast(ctx, caster, star),
        AbilityKind::NeedleVolley => needle_volley::cast(ctx, caster, star),
        AbilityKind::Reap => reap::cast(ctx, caster, star, target),
        AbilityKind::Leap => leap::cast(ctx, caster, star),
    };

    if plan == CastPlan::Finished {
        let cast_ticks = ctx.config.combat.cast_ticks;
        if cast_ticks == 0 {
            finish_cast(ctx, caster);
        } else {
            ctx.schedule(caster, cast_ticks, Continuation::FinishCast);
        }
    }
    true
}

/// End the current cast.
pub fn finish_cast(ctx: &mut SimulationContext, caster: UnitId) {
    if let Some(unit) = ctx.unit_mut(caster) {
        unit.is_casting = false;
        if let Some(ability) = unit.ability.as_mut() {
            ability.cast_target = None;
            if let AbilityState::Leap { airborne } = &mut ability.state {
                *airborne = false;
            }
        }
        trace!("Unit {} finished casting", caster);
    }
}

/// Resume an ability continuation.
///
/// Entries whose owner is gone, dead, benched or on a later life are dropped.
pub fn resume(ctx: &mut SimulationContext, entry: &Scheduled) {
    let valid = ctx
        .unit(entry.owner)
        .is_some_and(|u| u.life == entry.life && u.is_targetable() && u.is_casting);
    if !valid {
        trace!("Dropping stale continuation {:?} for {}", entry.action, entry.owner);
        return;
    }
    let star = ctx.unit(entry.owner).map_or(1, |u| u.star);
    match &entry.action {
        Continuation::FinishCast => finish_cast(ctx, entry.owner),
        Continuation::TwinShotHit { damage } => {
            twin_shot::second_hit(ctx, entry.owner, star, *damage);
        }
        Continuation::AreaBlast { damage } => twin_shot::blast(ctx, entry.owner, *damage),
        Continuation::LeapLand {
            destination,
            damage,
        } => leap::land(ctx, entry.owner, *destination, *damage),
        Continuation::HideFallen | Continuation::Despawn => {}
    }
}

/// Let a passive react to an auto-attack on `target`.
///
/// Returns `true` when the passive replaced the default attack.
pub fn on_auto_attack(ctx: &mut SimulationContext, attacker: UnitId, target: UnitId) -> bool {
    let kind = ctx
        .unit(attacker)
        .and_then(|u| u.ability.as_ref())
        .map(|a| a.kind);
    match kind {
        Some(AbilityKind::AlternatingStrike) => {
            alternating_strike::on_attack(ctx, attacker, target)
        }
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::SimulationContext;
    use crate::data::{SimulationConfig, UnitTemplate};
    use crate::math::Vec2Fixed;
    use crate::unit::{Team, Unit, UnitId, UnitState};

    use super::{on_registered, AbilityKind};

    pub fn context() -> SimulationContext {
        let mut ctx = SimulationContext::new(SimulationConfig::default());
        ctx.round_active = true;
        ctx
    }

    pub fn spawn(
        ctx: &mut SimulationContext,
        team: Team,
        name: &str,
        health: u32,
        ability: Option<AbilityKind>,
        position: (i32, i32),
    ) -> UnitId {
        let mut template = UnitTemplate::new(name, health, 10);
        if let Some(kind) = ability {
            template = template.with_ability(kind, 50);
        }
        let mut unit = Unit::from_template(0, &template, team);
        unit.state = UnitState::Combat;
        unit.can_move = true;
        unit.can_attack = true;
        unit.position = Vec2Fixed::from_ints(position.0, position.1);
        let id = ctx.insert_unit(unit);
        on_registered(ctx, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{context, spawn};
    use super::*;
    use crate::data::UnitTemplate;
    use crate::unit::Team;

    #[test]
    fn test_per_star_clamps() {
        let table = [10, 20, 30];
        assert_eq!(per_star(&table, 0), 10);
        assert_eq!(per_star(&table, 1), 10);
        assert_eq!(per_star(&table, 3), 30);
        assert_eq!(per_star(&table, 7), 30);
        assert_eq!(per_star(&[], 2), 0);
    }

    #[test]
    fn test_describe_without_ability_is_default() {
        let unit = Unit::from_template(1, &UnitTemplate::new("plain", 100, 10), Team::Player);
        let description = describe_ability(&unit);
        assert_eq!(description, AbilityDescription::default());
        assert_eq!(description.name, "No ability");
    }

    #[test]
    fn test_describe_with_ability() {
        let unit = Unit::from_template(
            1,
            &UnitTemplate::new("sage", 100, 10).with_ability(AbilityKind::Reap, 40),
            Team::Player,
        );
        assert_eq!(describe_ability(&unit).name, "Reap");
    }

    #[test]
    fn test_cast_sets_casting_and_finishes_later() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "sage", 100, Some(AbilityKind::Fortify), (0, 0));
        spawn(&mut ctx, Team::Enemy, "foe", 500, None, (1, 0));

        assert!(cast(&mut ctx, caster));
        assert!(ctx.unit(caster).unwrap().is_casting);
        // Already casting.
        assert!(!cast(&mut ctx, caster));

        let cast_ticks = u64::from(ctx.config.combat.cast_ticks);
        for entry in ctx.scheduler.pop_due(cast_ticks) {
            resume(&mut ctx, &entry);
        }
        assert!(!ctx.unit(caster).unwrap().is_casting);
    }

    #[test]
    fn test_passive_never_casts() {
        let mut ctx = context();
        let caster = spawn(
            &mut ctx,
            Team::Player,
            "duelist",
            100,
            Some(AbilityKind::AlternatingStrike),
            (0, 0),
        );
        assert!(!cast(&mut ctx, caster));
        assert!(!ctx.unit(caster).unwrap().is_casting);
    }

    #[test]
    fn test_stale_continuation_is_dropped() {
        let mut ctx = context();
        let caster = spawn(&mut ctx, Team::Player, "sage", 100, Some(AbilityKind::Reap), (0, 0));
        let entry = Scheduled {
            resume_tick: 1,
            seq: 0,
            owner: caster,
            life: 7,
            action: Continuation::FinishCast,
        };
        ctx.unit_mut(caster).unwrap().is_casting = true;
        resume(&mut ctx, &entry);
        assert!(ctx.unit(caster).unwrap().is_casting);
    }

    #[test]
    fn test_round_end_keeps_permanent_state() {
        let mut instance = AbilityInstance::new(AbilityKind::NeedleVolley);
        if let AbilityState::NeedleVolley { bonus_needles, .. } = &mut instance.state {
            *bonus_needles = 3;
        }
        instance.on_round_end();
        assert_eq!(
            instance.state,
            AbilityState::NeedleVolley {
                bonus_needles: 3,
                thrown: 0
            }
        );

        let mut alternating = AbilityInstance::new(AbilityKind::AlternatingStrike);
        alternating.state = AbilityState::AlternatingStrike {
            attacks: 5,
            next: SecondaryEffect::Heal,
        };
        alternating.on_round_end();
        assert_eq!(alternating.state, AbilityInstance::new(AbilityKind::AlternatingStrike).state);
    }
}
