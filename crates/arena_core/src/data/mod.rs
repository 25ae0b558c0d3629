//! Data structures for simulation configuration.
//!
//! This module contains pure data structures that define combat tuning, the
//! trait catalogue, ability tables and unit templates. All structs are
//! designed to be deserialized from RON files.
//!
//! **Note:** This module contains no file IO - it only defines data types and
//! parses strings. Reading files is handled by `arena_headless`.

mod config;
mod unit_data;

pub use config::{
    AbilityTuning, AlternatingStrikeTuning, CombatTuning, FortifyTuning, LeapTuning,
    NeedleVolleyTuning, ReapTuning, SimulationConfig, SoulBinderTuning, TierParams,
    TraitDefinition, TwinShotTuning,
};
pub use unit_data::UnitTemplate;
