//! Unit templates for data-driven unit definitions.

use serde::{Deserialize, Serialize};

use crate::abilities::AbilityKind;
use crate::math::{fixed_serde, Fixed};
use crate::synergy::TraitId;

/// Data-driven definition of a unit type at one star.
///
/// Registering a template creates a fresh benched [`crate::unit::Unit`].
///
/// # Example RON
///
/// ```ron
/// UnitTemplate(
///     name: "ironclad",
///     health: 650,
///     attack_damage: 55,
///     attack_speed: 3435973837,   // Fixed-point for 0.8
///     armor: 40,
///     attack_range: 4294967296,   // Fixed-point for 1.0
///     move_speed: 8589934592,     // Fixed-point for 2.0
///     max_mana: 80,
///     traits: [Guardian, Titan],
///     ability: Some(Fortify),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Unit type name. Trait counting de-duplicates on this.
    pub name: String,

    /// Base max health.
    pub health: u32,

    /// Damage per auto-attack.
    pub attack_damage: u32,

    /// Auto-attacks per second.
    #[serde(with = "fixed_serde")]
    pub attack_speed: Fixed,

    /// Armor value that reduces incoming damage.
    #[serde(default)]
    pub armor: u32,

    /// Attack range in tiles.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,

    /// Movement speed in tiles per second.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,

    /// Mana needed to cast. Zero means the unit never gathers mana.
    #[serde(default)]
    pub max_mana: u32,

    /// Mana at the start of each round.
    #[serde(default)]
    pub starting_mana: u32,

    /// Synergy tags.
    #[serde(default)]
    pub traits: Vec<TraitId>,

    /// Ability variant, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ability: Option<AbilityKind>,
}

impl UnitTemplate {
    /// Create a template with the given name and combat stats.
    ///
    /// Attack speed defaults to one attack per second, range to one tile and
    /// move speed to two tiles per second.
    #[must_use]
    pub fn new(name: impl Into<String>, health: u32, attack_damage: u32) -> Self {
        Self {
            name: name.into(),
            health,
            attack_damage,
            attack_speed: Fixed::ONE,
            armor: 0,
            attack_range: Fixed::ONE,
            move_speed: Fixed::from_num(2),
            max_mana: 0,
            starting_mana: 0,
            traits: Vec::new(),
            ability: None,
        }
    }

    /// Set armor.
    #[must_use]
    pub fn with_armor(mut self, armor: u32) -> Self {
        self.armor = armor;
        self
    }

    /// Set attack range.
    #[must_use]
    pub fn with_range(mut self, attack_range: Fixed) -> Self {
        self.attack_range = attack_range;
        self
    }

    /// Set attacks per second.
    #[must_use]
    pub fn with_attack_speed(mut self, attack_speed: Fixed) -> Self {
        self.attack_speed = attack_speed;
        self
    }

    /// Set movement speed.
    #[must_use]
    pub fn with_move_speed(mut self, move_speed: Fixed) -> Self {
        self.move_speed = move_speed;
        self
    }

    /// Add a synergy tag.
    #[must_use]
    pub fn with_trait(mut self, trait_id: TraitId) -> Self {
        if !self.traits.contains(&trait_id) {
            self.traits.push(trait_id);
        }
        self
    }

    /// Attach an ability and the mana needed to cast it.
    #[must_use]
    pub fn with_ability(mut self, ability: AbilityKind, max_mana: u32) -> Self {
        self.ability = Some(ability);
        self.max_mana = max_mana;
        self
    }

    /// Check if this unit carries the specified trait.
    #[must_use]
    pub fn has_trait(&self, trait_id: TraitId) -> bool {
        self.traits.contains(&trait_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_sets_fields() {
        let template = UnitTemplate::new("ironclad", 650, 55)
            .with_armor(40)
            .with_trait(TraitId::Guardian)
            .with_trait(TraitId::Guardian)
            .with_ability(AbilityKind::Fortify, 80);

        assert_eq!(template.armor, 40);
        assert_eq!(template.traits, vec![TraitId::Guardian]);
        assert!(template.has_trait(TraitId::Guardian));
        assert!(!template.has_trait(TraitId::Reaper));
        assert_eq!(template.ability, Some(AbilityKind::Fortify));
        assert_eq!(template.max_mana, 80);
    }

    #[test]
    fn test_template_from_ron() {
        let source = r#"(
            name: "ironclad",
            health: 650,
            attack_damage: 55,
            attack_speed: 4294967296,
            attack_range: 4294967296,
            move_speed: 8589934592,
            traits: [Guardian],
            ability: Some(Fortify),
        )"#;
        let template: UnitTemplate = ron::from_str(source).unwrap();
        assert_eq!(template.health, 650);
        assert_eq!(template.attack_speed, Fixed::ONE);
        assert_eq!(template.move_speed, Fixed::from_num(2));
        assert_eq!(template.armor, 0);
        assert_eq!(template.max_mana, 0);
        assert_eq!(template.traits, vec![TraitId::Guardian]);
    }
}
