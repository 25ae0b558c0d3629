//! Simulation configuration: combat tuning, trait catalogue and ability tables.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::math::{fixed_serde, ratio, Fixed};
use crate::synergy::TraitId;

/// Complete configuration for one simulation.
///
/// Every field has a tuned default, so a RON file only needs to list the
/// values it overrides.
///
/// # Example RON
///
/// ```ron
/// SimulationConfig(
///     tick_rate: 20,
///     combat: CombatTuning(
///         mana_per_attack: 10,
///         death_hold_ticks: 30,
///     ),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Combat constants shared by every unit.
    pub combat: CombatTuning,
    /// Trait catalogue, one entry per trait.
    pub traits: Vec<TraitDefinition>,
    /// Per-ability tuning tables.
    pub abilities: AbilityTuning,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            combat: CombatTuning::default(),
            traits: default_traits(),
            abilities: AbilityTuning::default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a configuration from a RON string and validate it.
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)
            .map_err(|e| ConfigError::new(vec![format!("RON parse error: {e}")]))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration as pretty RON.
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::new(vec![format!("RON serialize error: {e}")]))
    }

    /// Length of one tick in seconds.
    #[must_use]
    pub fn tick_seconds(&self) -> Fixed {
        Fixed::ONE / Fixed::from_num(self.tick_rate.max(1))
    }

    /// Look up a trait definition.
    #[must_use]
    pub fn trait_definition(&self, id: TraitId) -> Option<&TraitDefinition> {
        self.traits.iter().find(|t| t.id == id)
    }

    /// Check every tuning value, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.tick_rate == 0 {
            problems.push("tick_rate must be greater than zero".to_string());
        }
        self.combat.collect_problems(&mut problems);

        let mut seen = Vec::new();
        for definition in &self.traits {
            if seen.contains(&definition.id) {
                problems.push(format!("trait {:?} is defined more than once", definition.id));
            }
            seen.push(definition.id);
            definition.collect_problems(&mut problems);
        }

        self.abilities.collect_problems(&mut problems);

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::new(problems))
        }
    }
}

/// Combat constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatTuning {
    /// Damage reduction per point of armor.
    #[serde(with = "fixed_serde")]
    pub armor_factor: Fixed,
    /// Mana gained per auto-attack.
    pub mana_per_attack: u32,
    /// Mana gained per damage instance taken.
    pub mana_per_hit: u32,
    /// Ranged units stand off at this percentage of their attack range.
    pub ranged_standoff_pct: u32,
    /// Units with an attack range at or below this are melee.
    #[serde(with = "fixed_serde")]
    pub melee_range: Fixed,
    /// Melee units stop this far from their target.
    #[serde(with = "fixed_serde")]
    pub stopping_distance: Fixed,
    /// Body radius used for collision checks.
    #[serde(with = "fixed_serde")]
    pub unit_radius: Fixed,
    /// Units closer than this push each other apart while moving.
    #[serde(with = "fixed_serde")]
    pub avoidance_radius: Fixed,
    /// Weight of the repulsion vector relative to the desired direction.
    #[serde(with = "fixed_serde")]
    pub avoidance_weight: Fixed,
    /// Ticks a fallen player unit stays visible before it is hidden.
    pub death_hold_ticks: u32,
    /// Default cast duration in ticks.
    pub cast_ticks: u32,
    /// Stat multiplier applied per star upgrade.
    #[serde(with = "fixed_serde")]
    pub star_multiplier: Fixed,
    /// Highest reachable star level.
    pub max_star: u8,
    /// Distance subtracted from preferred targets during target search.
    #[serde(with = "fixed_serde")]
    pub priority_bias: Fixed,
    /// Unit type names that receive the priority bias.
    pub priority_types: Vec<String>,
}

impl Default for CombatTuning {
    fn default() -> Self {
        Self {
            armor_factor: ratio(1, 200),
            mana_per_attack: 10,
            mana_per_hit: 1,
            ranged_standoff_pct: 80,
            melee_range: ratio(3, 2),
            stopping_distance: ratio(9, 10),
            unit_radius: ratio(2, 5),
            avoidance_radius: ratio(6, 5),
            avoidance_weight: ratio(1, 2),
            death_hold_ticks: 30,
            cast_ticks: 10,
            star_multiplier: ratio(9, 5),
            max_star: 3,
            priority_bias: Fixed::ONE,
            priority_types: Vec::new(),
        }
    }
}

impl CombatTuning {
    fn collect_problems(&self, problems: &mut Vec<String>) {
        if self.armor_factor < Fixed::ZERO {
            problems.push("combat.armor_factor must not be negative".to_string());
        }
        if self.ranged_standoff_pct == 0 || self.ranged_standoff_pct > 100 {
            problems.push("combat.ranged_standoff_pct must be within 1..=100".to_string());
        }
        if self.stopping_distance <= Fixed::ZERO {
            problems.push("combat.stopping_distance must be positive".to_string());
        }
        if self.stopping_distance > self.melee_range {
            problems.push("combat.stopping_distance must not exceed combat.melee_range".to_string());
        }
        if self.unit_radius <= Fixed::ZERO {
            problems.push("combat.unit_radius must be positive".to_string());
        }
        if self.avoidance_radius < Fixed::ZERO || self.avoidance_weight < Fixed::ZERO {
            problems.push("combat avoidance radius and weight must not be negative".to_string());
        }
        if self.max_star == 0 {
            problems.push("combat.max_star must be at least 1".to_string());
        }
        if self.star_multiplier < Fixed::ONE {
            problems.push("combat.star_multiplier must be at least 1".to_string());
        }
        if self.priority_bias < Fixed::ZERO {
            problems.push("combat.priority_bias must not be negative".to_string());
        }
    }

    /// Whether a unit with this attack range fights in melee.
    #[must_use]
    pub fn is_melee(&self, attack_range: Fixed) -> bool {
        attack_range <= self.melee_range
    }
}

/// Tuned parameters of one trait tier.
///
/// Each trait reads only the fields relevant to it; the rest stay zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierParams {
    /// Flat armor bonus.
    pub bonus_armor: u32,
    /// Max health bonus as a percentage of base max health.
    pub bonus_health_pct: u32,
    /// Attack speed gained per attack, in percent.
    pub attack_speed_per_attack_pct: u32,
    /// Cap on the attack speed ramp, in percent.
    pub attack_speed_cap_pct: u32,
    /// Damage gained per second of combat, in percent.
    pub damage_per_second_pct: u32,
    /// Cap on the damage ramp, in percent.
    pub damage_cap_pct: u32,
    /// Auto-attacks execute targets left below this health percentage.
    pub execute_threshold_pct: u32,
    /// Share of a fallen ally's max health granted to survivors, in percent.
    pub death_share_pct: u32,
}

/// One trait: its count thresholds and the parameters of each tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraitDefinition {
    /// Trait being defined.
    pub id: TraitId,
    /// Ascending unit counts at which each tier activates.
    pub thresholds: Vec<u32>,
    /// Parameters per tier, parallel to `thresholds`.
    pub tiers: Vec<TierParams>,
}

impl TraitDefinition {
    /// Create a definition from `(threshold, params)` pairs.
    #[must_use]
    pub fn new(id: TraitId, tiers: &[(u32, TierParams)]) -> Self {
        Self {
            id,
            thresholds: tiers.iter().map(|(threshold, _)| *threshold).collect(),
            tiers: tiers.iter().map(|(_, params)| *params).collect(),
        }
    }

    fn collect_problems(&self, problems: &mut Vec<String>) {
        if self.thresholds.is_empty() {
            problems.push(format!("trait {:?} has no thresholds", self.id));
        }
        if self.thresholds.first() == Some(&0) {
            problems.push(format!("trait {:?} has a zero threshold", self.id));
        }
        if self.thresholds.windows(2).any(|pair| pair[0] >= pair[1]) {
            problems.push(format!("trait {:?} thresholds are not strictly ascending", self.id));
        }
        if self.tiers.len() != self.thresholds.len() {
            problems.push(format!(
                "trait {:?} has {} thresholds but {} tiers",
                self.id,
                self.thresholds.len(),
                self.tiers.len()
            ));
        }
    }
}

fn default_traits() -> Vec<TraitDefinition> {
    let params = TierParams::default();
    vec![
        TraitDefinition::new(
            TraitId::Guardian,
            &[
                (2, TierParams { bonus_armor: 20, ..params }),
                (4, TierParams { bonus_armor: 50, ..params }),
            ],
        ),
        TraitDefinition::new(
            TraitId::Titan,
            &[
                (2, TierParams { bonus_health_pct: 15, ..params }),
                (4, TierParams { bonus_health_pct: 35, ..params }),
            ],
        ),
        TraitDefinition::new(
            TraitId::Berserker,
            &[
                (
                    2,
                    TierParams {
                        attack_speed_per_attack_pct: 5,
                        attack_speed_cap_pct: 40,
                        ..params
                    },
                ),
                (
                    4,
                    TierParams {
                        attack_speed_per_attack_pct: 10,
                        attack_speed_cap_pct: 80,
                        ..params
                    },
                ),
            ],
        ),
        TraitDefinition::new(
            TraitId::Warlord,
            &[
                (
                    2,
                    TierParams {
                        damage_per_second_pct: 4,
                        damage_cap_pct: 30,
                        ..params
                    },
                ),
                (
                    3,
                    TierParams {
                        damage_per_second_pct: 8,
                        damage_cap_pct: 60,
                        ..params
                    },
                ),
            ],
        ),
        TraitDefinition::new(
            TraitId::Reaper,
            &[
                (2, TierParams { execute_threshold_pct: 10, ..params }),
                (4, TierParams { execute_threshold_pct: 20, ..params }),
            ],
        ),
        TraitDefinition::new(
            TraitId::Packbond,
            &[
                (2, TierParams { death_share_pct: 10, ..params }),
                (3, TierParams { death_share_pct: 20, ..params }),
            ],
        ),
    ]
}

/// Tuning tables for every ability variant.
///
/// Tables indexed by star level hold one entry per star; lookups clamp to the
/// last entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityTuning {
    /// Alternating cone / self-heal passive.
    pub alternating_strike: AlternatingStrikeTuning,
    /// Two hits then an area blast.
    pub twin_shot: TwinShotTuning,
    /// Permanent health gain then a strike.
    pub fortify: FortifyTuning,
    /// Companion summon scaling with souls.
    pub soul_binder: SoulBinderTuning,
    /// Multi-target needles.
    pub needle_volley: NeedleVolleyTuning,
    /// Strike with execute threshold.
    pub reap: ReapTuning,
    /// Leap to a cluster then slam.
    pub leap: LeapTuning,
}

impl AbilityTuning {
    fn collect_problems(&self, problems: &mut Vec<String>) {
        let tables: [(&str, &[u32]); 11] = [
            ("alternating_strike.cone_damage", &self.alternating_strike.cone_damage),
            ("alternating_strike.heal", &self.alternating_strike.heal),
            ("twin_shot.hit_damage", &self.twin_shot.hit_damage),
            ("twin_shot.blast_damage", &self.twin_shot.blast_damage),
            ("fortify.health_gain_pct", &self.fortify.health_gain_pct),
            ("fortify.strike_flat", &self.fortify.strike_flat),
            ("soul_binder.companion_stat_pct", &self.soul_binder.companion_stat_pct),
            ("needle_volley.needle_damage", &self.needle_volley.needle_damage),
            ("reap.strike_damage", &self.reap.strike_damage),
            ("reap.execute_threshold_pct", &self.reap.execute_threshold_pct),
            ("leap.slam_damage", &self.leap.slam_damage),
        ];
        for (name, table) in tables {
            if table.is_empty() {
                problems.push(format!("ability table {name} is empty"));
            }
        }
        if self.alternating_strike.cone_min_alignment_pct > 100 {
            problems.push("alternating_strike.cone_min_alignment_pct must not exceed 100".into());
        }
        if self.soul_binder.souls_per_stack == 0 {
            problems.push("soul_binder.souls_per_stack must be greater than zero".into());
        }
        if self.needle_volley.base_needles == 0
            || self.needle_volley.base_needles > self.needle_volley.max_needles
        {
            problems.push("needle_volley needles must satisfy 0 < base_needles <= max_needles".into());
        }
        if self.twin_shot.hit_interval_ticks == 0 || self.leap.leap_ticks == 0 {
            problems.push("twin_shot.hit_interval_ticks and leap.leap_ticks must be positive".into());
        }
    }
}

/// Alternating passive tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternatingStrikeTuning {
    /// Cone damage per star.
    pub cone_damage: Vec<u32>,
    /// Self-heal per star.
    pub heal: Vec<u32>,
    /// Reach of the cone.
    #[serde(with = "fixed_serde")]
    pub cone_range: Fixed,
    /// Minimum alignment (cosine, in percent) between the attack direction and
    /// an enemy for it to be inside the cone.
    pub cone_min_alignment_pct: u32,
}

impl Default for AlternatingStrikeTuning {
    fn default() -> Self {
        Self {
            cone_damage: vec![40, 60, 90],
            heal: vec![30, 45, 70],
            cone_range: ratio(5, 2),
            cone_min_alignment_pct: 70,
        }
    }
}

/// Twin shot tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwinShotTuning {
    /// Damage of each of the two hits, per star.
    pub hit_damage: Vec<u32>,
    /// Area blast damage per star.
    pub blast_damage: Vec<u32>,
    /// Radius of the blast and of the cluster search.
    #[serde(with = "fixed_serde")]
    pub blast_radius: Fixed,
    /// Ticks between the hits and the blast.
    pub hit_interval_ticks: u32,
}

impl Default for TwinShotTuning {
    fn default() -> Self {
        Self {
            hit_damage: vec![50, 75, 110],
            blast_damage: vec![60, 90, 135],
            blast_radius: ratio(3, 2),
            hit_interval_ticks: 4,
        }
    }
}

/// Fortify tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FortifyTuning {
    /// Permanent max health gain per cast, percent per star.
    pub health_gain_pct: Vec<u32>,
    /// Strike damage as a percentage of max health.
    pub strike_health_pct: u32,
    /// Flat strike damage per star.
    pub strike_flat: Vec<u32>,
}

impl Default for FortifyTuning {
    fn default() -> Self {
        Self {
            health_gain_pct: vec![10, 15, 20],
            strike_health_pct: 20,
            strike_flat: vec![20, 40, 80],
        }
    }
}

/// Soul binder tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoulBinderTuning {
    /// Companion stats as a percentage of the caster's, per star.
    pub companion_stat_pct: Vec<u32>,
    /// Souls needed for one growth stack.
    pub souls_per_stack: u32,
    /// Stat growth per stack, in percent.
    pub stack_bonus_pct: u32,
}

impl Default for SoulBinderTuning {
    fn default() -> Self {
        Self {
            companion_stat_pct: vec![40, 50, 65],
            souls_per_stack: 3,
            stack_bonus_pct: 2,
        }
    }
}

/// Needle volley tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedleVolleyTuning {
    /// Damage per needle, per star.
    pub needle_damage: Vec<u32>,
    /// Needles thrown by the first cast.
    pub base_needles: u32,
    /// Upper bound on the needle count.
    pub max_needles: u32,
}

impl Default for NeedleVolleyTuning {
    fn default() -> Self {
        Self {
            needle_damage: vec![25, 35, 50],
            base_needles: 3,
            max_needles: 8,
        }
    }
}

/// Reap tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReapTuning {
    /// Strike damage per star.
    pub strike_damage: Vec<u32>,
    /// Health percentage under which the target is executed, per star.
    pub execute_threshold_pct: Vec<u32>,
}

impl Default for ReapTuning {
    fn default() -> Self {
        Self {
            strike_damage: vec![60, 90, 130],
            execute_threshold_pct: vec![15, 20, 30],
        }
    }
}

/// Leap tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeapTuning {
    /// Slam damage per star.
    pub slam_damage: Vec<u32>,
    /// Radius of the slam and of the cluster search.
    #[serde(with = "fixed_serde")]
    pub slam_radius: Fixed,
    /// Flight time in ticks.
    pub leap_ticks: u32,
}

impl Default for LeapTuning {
    fn default() -> Self {
        Self {
            slam_damage: vec![70, 100, 150],
            slam_radius: ratio(3, 2),
            leap_ticks: 8,
        }
    }
}
