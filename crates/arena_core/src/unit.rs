//! Unit and stat block definitions.
//!
//! A [`Unit`] is pure data: identity, a [`StatBlock`], behavior flags, its
//! state machine state and the per-unit ability and trait modifier state.
//! Behavior lives in the systems that operate on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityInstance;
use crate::data::UnitTemplate;
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::synergy::{TraitId, TraitModifier};

/// Unique identifier for units.
pub type UnitId = u64;

/// Board tile identifier.
pub type TileId = u32;

// ============================================================================
// Identity
// ============================================================================

/// Side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    /// The player's roster. Survives rounds through soft death.
    Player,
    /// The opposing roster. Destroyed at round end.
    Enemy,
}

impl Team {
    /// The opposing team.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }
}

/// Behavior state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitState {
    /// Off the board. Inert: no movement, no targeting, no damage in or out.
    Bench,
    /// On the board outside combat.
    BoardIdle,
    /// Fighting.
    Combat,
}

// ============================================================================
// Stats
// ============================================================================

/// Per-unit numeric state.
///
/// Max health is never stored: it is always `base + permanent + round`.
/// Current health may exceed it (overheal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    /// Max health before bonuses. Scaled by star upgrades.
    #[serde(with = "fixed_serde")]
    pub base_max_health: Fixed,
    /// Bonus max health that survives round end (traits, ability upgrades).
    #[serde(with = "fixed_serde")]
    pub permanent_bonus_health: Fixed,
    /// Bonus max health cleared at round end.
    #[serde(with = "fixed_serde")]
    pub round_bonus_health: Fixed,
    /// Current health.
    #[serde(with = "fixed_serde")]
    pub current_health: Fixed,
    /// Damage per auto-attack before bonuses. Scaled by star upgrades.
    #[serde(with = "fixed_serde")]
    pub attack_damage: Fixed,
    /// Attack damage bonus cleared at round end.
    #[serde(with = "fixed_serde")]
    pub round_bonus_attack: Fixed,
    /// Auto-attacks per second before bonuses.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,
    /// Base armor.
    #[serde(with = "fixed_serde")]
    pub armor: Fixed,
    /// Armor granted by traits.
    #[serde(with = "fixed_serde")]
    pub bonus_armor: Fixed,
    /// Attack range in tiles.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Movement speed in tiles per second.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,
    /// Current mana.
    pub current_mana: u32,
    /// Mana needed to cast.
    pub max_mana: u32,
    /// Mana at the start of each round.
    pub starting_mana: u32,
}

impl StatBlock {
    /// Build a stat block from a template at full health.
    #[must_use]
    pub fn from_template(template: &UnitTemplate) -> Self {
        let health = Fixed::from_num(template.health);
        Self {
            base_max_health: health,
            permanent_bonus_health: Fixed::ZERO,
            round_bonus_health: Fixed::ZERO,
            current_health: health,
            attack_damage: Fixed::from_num(template.attack_damage),
            round_bonus_attack: Fixed::ZERO,
            attack_speed: template.attack_speed,
            armor: Fixed::from_num(template.armor),
            bonus_armor: Fixed::ZERO,
            attack_range: template.attack_range,
            move_speed: template.move_speed,
            current_mana: template.starting_mana,
            max_mana: template.max_mana,
            starting_mana: template.starting_mana,
        }
    }

    /// Effective max health.
    #[must_use]
    pub fn max_health(&self) -> Fixed {
        self.base_max_health + self.permanent_bonus_health + self.round_bonus_health
    }

    /// Armor after trait bonuses.
    #[must_use]
    pub fn total_armor(&self) -> Fixed {
        self.armor + self.bonus_armor
    }

    /// Health as a fraction of max health (may exceed one while overhealed).
    #[must_use]
    pub fn health_fraction(&self) -> Fixed {
        let max = self.max_health();
        if max <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        self.current_health / max
    }

    /// Whether health has reached the death threshold.
    #[must_use]
    pub fn is_depleted(&self) -> bool {
        self.current_health <= Fixed::ZERO
    }

    /// Drop round-only bonuses.
    pub fn clear_round_bonuses(&mut self) {
        self.round_bonus_health = Fixed::ZERO;
        self.round_bonus_attack = Fixed::ZERO;
    }

    /// Refill health to max. Overheal is discarded.
    pub fn refill_health(&mut self) {
        self.current_health = self.max_health();
    }

    /// Scale base health and attack damage for a star upgrade.
    ///
    /// Both are rounded to whole numbers and current health is set to the new
    /// max.
    pub fn scale_for_star(&mut self, multiplier: Fixed) {
        self.base_max_health = (self.base_max_health * multiplier).round();
        self.attack_damage = (self.attack_damage * multiplier).round();
        self.refill_health();
    }
}

// ============================================================================
// Unit
// ============================================================================

/// A combatant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    /// Unique identifier.
    pub id: UnitId,
    /// Unit type name.
    pub name: String,
    /// Side.
    pub team: Team,
    /// Star level, 1 upward. Never decreases.
    pub star: u8,
    /// Numeric state.
    pub stats: StatBlock,
    /// Behavior state.
    pub state: UnitState,
    /// Occupied tile, mirrored by the board.
    pub tile: Option<TileId>,
    /// World position in tile units.
    pub position: Vec2Fixed,
    /// Synergy tags.
    pub traits: Vec<TraitId>,
    /// May move this tick.
    pub can_move: bool,
    /// May auto-attack this tick.
    pub can_attack: bool,
    /// Alive for the current life.
    pub is_alive: bool,
    /// Mid-cast. Movement and attacks are suspended.
    pub is_casting: bool,
    /// Removed from presentation after a soft death.
    pub hidden: bool,
    /// Restored this tick; in-flight hide continuations must abort.
    pub being_restored: bool,
    /// Incremented on each restore. Death events and continuations are
    /// stamped with it.
    pub life: u32,
    /// Current attack target.
    pub target: Option<UnitId>,
    /// Seconds until the next auto-attack.
    #[serde(with = "fixed_serde")]
    pub attack_cooldown: Fixed,
    /// Ability state, if the unit has one.
    pub ability: Option<AbilityInstance>,
    /// Active trait modifiers keyed by trait.
    pub modifiers: BTreeMap<TraitId, TraitModifier>,
    /// Unit that summoned this one.
    pub summoner: Option<UnitId>,
    /// Queued for removal at the end of the tick.
    pub pending_removal: bool,
}

impl Unit {
    /// Create a benched one-star unit from a template.
    #[must_use]
    pub fn from_template(id: UnitId, template: &UnitTemplate, team: Team) -> Self {
        Self {
            id,
            name: template.name.clone(),
            team,
            star: 1,
            stats: StatBlock::from_template(template),
            state: UnitState::Bench,
            tile: None,
            position: Vec2Fixed::ZERO,
            traits: template.traits.clone(),
            can_move: false,
            can_attack: false,
            is_alive: true,
            is_casting: false,
            hidden: false,
            being_restored: false,
            life: 0,
            target: None,
            attack_cooldown: Fixed::ZERO,
            ability: template.ability.map(AbilityInstance::new),
            modifiers: BTreeMap::new(),
            summoner: None,
            pending_removal: false,
        }
    }

    /// Whether the unit sits on the bench.
    #[must_use]
    pub fn is_benched(&self) -> bool {
        self.state == UnitState::Bench
    }

    /// Whether the unit is fighting.
    #[must_use]
    pub fn in_combat(&self) -> bool {
        self.state == UnitState::Combat
    }

    /// Whether other units may target or damage this unit.
    #[must_use]
    pub fn is_targetable(&self) -> bool {
        self.is_alive && !self.is_benched() && !self.pending_removal
    }

    /// Whether this unit was summoned by another.
    #[must_use]
    pub fn is_summon(&self) -> bool {
        self.summoner.is_some()
    }

    /// Whether the unit carries a trait tag.
    #[must_use]
    pub fn has_trait(&self, trait_id: TraitId) -> bool {
        self.traits.contains(&trait_id)
    }

    /// Auto-attack damage including round bonuses and damage ramps.
    #[must_use]
    pub fn effective_attack_damage(&self) -> Fixed {
        let ramp: Fixed = self.modifiers.values().map(|m| m.damage_ramp).sum();
        (self.stats.attack_damage + self.stats.round_bonus_attack) * (Fixed::ONE + ramp)
    }

    /// Attacks per second including attack speed ramps.
    #[must_use]
    pub fn effective_attack_speed(&self) -> Fixed {
        let ramp: Fixed = self.modifiers.values().map(|m| m.attack_speed_ramp).sum();
        self.stats.attack_speed * (Fixed::ONE + ramp)
    }

    /// Seconds between auto-attacks.
    #[must_use]
    pub fn attack_interval(&self) -> Fixed {
        let speed = self.effective_attack_speed();
        if speed <= Fixed::ZERO {
            return Fixed::MAX;
        }
        Fixed::ONE / speed
    }

    /// Raise the star level by one, scaling stats.
    ///
    /// Returns `false` (and changes nothing) at `max_star`.
    pub fn upgrade_star(&mut self, multiplier: Fixed, max_star: u8) -> bool {
        if self.star >= max_star {
            return false;
        }
        self.star += 1;
        // Trait health follows the new base when modifiers refresh; only the
        // ability-earned part of the permanent bonus scales here.
        let trait_health: Fixed = self.modifiers.values().map(|m| m.applied_health).sum();
        let earned = self.stats.permanent_bonus_health - trait_health;
        self.stats.permanent_bonus_health = trait_health + (earned * multiplier).round();
        self.stats.scale_for_star(multiplier);
        true
    }
}
